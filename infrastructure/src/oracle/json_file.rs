//! File-backed plan oracle.
//!
//! Reads a plan document (raw JSON or a fenced ` ```plan ` block) from disk
//! on every call. Used for dry runs and for replaying plans captured from a
//! model.

use async_trait::async_trait;
use conductor_application::ports::plan_oracle::{OracleError, PlanOracle, PlanRequest};
use conductor_domain::{Plan, parse_plan};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct JsonPlanOracle {
    name: String,
    path: PathBuf,
}

impl JsonPlanOracle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        Self { name, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PlanOracle for JsonPlanOracle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn propose(&self, request: &PlanRequest) -> Result<Plan, OracleError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| OracleError::Unavailable(format!("{}: {}", self.path.display(), e)))?;
        let plan = parse_plan(&text).map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        debug!(
            oracle = %self.name,
            tier = request.tier.as_str(),
            steps = plan.steps.len(),
            "Loaded plan from file"
        );
        Ok(plan)
    }
}
