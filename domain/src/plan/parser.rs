//! Plan parsing from oracle responses and plan files.
//!
//! Accepts the plan DSL as raw JSON or inside a ` ```plan ` (or ` ```json `)
//! fenced block of a text response. A step's `tool` may carry its version
//! inline (`"CustomerProfileTool@1.0.0"`); it is split into `tool` and
//! `tool_version` before deserialization.

use super::entities::Plan;
use crate::tool::ToolKey;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanParseError {
    #[error("no plan found in response")]
    NoPlanFound,

    #[error("invalid plan: {0}")]
    InvalidPlan(String),
}

/// Parse a plan from response text.
///
/// Fenced blocks are tried first; otherwise the whole text must be JSON.
pub fn parse_plan(response: &str) -> Result<Plan, PlanParseError> {
    let mut in_block = false;
    let mut current = String::new();

    for line in response.lines() {
        let trimmed = line.trim();
        if !in_block && (trimmed == "```plan" || trimmed == "```json") {
            in_block = true;
            current.clear();
        } else if in_block && trimmed == "```" {
            in_block = false;
            if let Ok(parsed) = serde_json::from_str::<Value>(&current) {
                return parse_plan_json(&parsed);
            }
        } else if in_block {
            current.push_str(line);
            current.push('\n');
        }
    }

    match serde_json::from_str::<Value>(response.trim()) {
        Ok(parsed) => parse_plan_json(&parsed),
        Err(_) => Err(PlanParseError::NoPlanFound),
    }
}

/// Parse a plan from a JSON value.
pub fn parse_plan_json(json: &Value) -> Result<Plan, PlanParseError> {
    let mut json = json.clone();

    let steps = json
        .get_mut("steps")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| PlanParseError::InvalidPlan("missing 'steps' array".to_string()))?;

    for step in steps.iter_mut() {
        let Some(object) = step.as_object_mut() else {
            return Err(PlanParseError::InvalidPlan("step is not an object".to_string()));
        };
        let inline = object
            .get("tool")
            .and_then(Value::as_str)
            .filter(|tool| tool.contains('@'))
            .map(str::to_string);
        if let Some(inline) = inline {
            let key: ToolKey = inline.parse().map_err(PlanParseError::InvalidPlan)?;
            object.insert("tool".to_string(), Value::String(key.name));
            object
                .entry("tool_version")
                .or_insert_with(|| Value::String(key.version.to_string()));
        }
    }

    serde_json::from_value(json).map_err(|e| PlanParseError::InvalidPlan(e.to_string()))
}
