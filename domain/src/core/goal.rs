//! Goal value object

use super::error::DomainError;
use serde::{Deserialize, Serialize};

/// Longest accepted goal, in characters.
pub const MAX_GOAL_CHARS: usize = 4_096;

/// A natural-language goal submitted by a caller (Value Object).
///
/// Always non-blank and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Goal {
    text: String,
}

impl Goal {
    pub fn parse(text: impl Into<String>) -> Result<Self, DomainError> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptyGoal);
        }
        let chars = trimmed.chars().count();
        if chars > MAX_GOAL_CHARS {
            return Err(DomainError::GoalTooLong {
                chars,
                max: MAX_GOAL_CHARS,
            });
        }
        Ok(Self {
            text: trimmed.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl TryFrom<String> for Goal {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Goal::parse(value)
    }
}

impl From<Goal> for String {
    fn from(goal: Goal) -> Self {
        goal.text
    }
}

impl std::fmt::Display for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_is_trimmed() {
        let goal = Goal::parse("  Summarize billing for c-42 \n").unwrap();
        assert_eq!(goal.as_str(), "Summarize billing for c-42");
    }

    #[test]
    fn test_blank_goal_rejected() {
        assert!(matches!(Goal::parse("   "), Err(DomainError::EmptyGoal)));
    }

    #[test]
    fn test_overlong_goal_rejected() {
        assert!(Goal::parse("x".repeat(MAX_GOAL_CHARS + 1)).is_err());
        assert!(Goal::parse("x".repeat(MAX_GOAL_CHARS)).is_ok());
    }

    #[test]
    fn test_goal_serde() {
        let goal: Goal = serde_json::from_str("\"find churn risk\"").unwrap();
        assert_eq!(goal.to_string(), "find churn risk");
        assert!(serde_json::from_str::<Goal>("\"\"").is_err());
    }
}
