//! Plan value objects - identifiers and the reasoning tier.

use serde::{Deserialize, Serialize};

/// Unique identifier of a plan.
///
/// Every generated plan gets a fresh id; re-planning never reuses one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanId(String);

impl PlanId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new random (UUID v4) id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::generate()
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a step, unique within its plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for StepId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reasoning tier that produced a plan.
///
/// `Low` is the fast/cheap tier tried first; `High` is the slower, more
/// capable tier used for escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlanTier {
    #[default]
    #[serde(rename = "low-tier")]
    Low,
    #[serde(rename = "high-tier")]
    High,
}

impl PlanTier {
    pub fn as_str(&self) -> &str {
        match self {
            PlanTier::Low => "low-tier",
            PlanTier::High => "high-tier",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" | "low-tier" | "slm" => Ok(PlanTier::Low),
            "high" | "high-tier" | "llm" => Ok(PlanTier::High),
            other => Err(format!("unknown tier '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_ids_are_unique() {
        assert_ne!(PlanId::generate(), PlanId::generate());
        assert_eq!(PlanId::new("p-1").as_str(), "p-1");
    }

    #[test]
    fn test_tier_serde_names() {
        assert_eq!(serde_json::to_string(&PlanTier::Low).unwrap(), "\"low-tier\"");
        assert_eq!(
            serde_json::from_str::<PlanTier>("\"high-tier\"").unwrap(),
            PlanTier::High
        );
        assert_eq!("LLM".parse::<PlanTier>().unwrap(), PlanTier::High);
        assert!("medium".parse::<PlanTier>().is_err());
    }
}
