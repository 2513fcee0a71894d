//! Fixture-backed tool invoker for dry runs.
//!
//! The fixtures file is a JSON object keyed by `name@version` or bare tool
//! name (the pinned key wins):
//!
//! ```json
//! {
//!   "CustomerProfileTool": { "output": { "account_id": "a-1" }, "latency_ms": 40 },
//!   "LedgerTool@2.1.0":    { "error": { "code": "UNAVAILABLE", "message": "down" } },
//!   "EchoTool":            { "echo_input": true, "fail_attempts": 1 }
//! }
//! ```

use async_trait::async_trait;
use conductor_application::ports::tool_invoker::{ToolInvocation, ToolInvokerPort};
use conductor_domain::ToolError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid fixtures {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Canned behaviour for one tool.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolFixture {
    pub output: Map<String, Value>,
    pub error: Option<ToolError>,
    /// Merge the resolved input into the output
    pub echo_input: bool,
    /// Fail this many attempts with `UNAVAILABLE` before succeeding
    pub fail_attempts: u32,
    pub latency_ms: u64,
}

pub struct StaticToolInvoker {
    fixtures: HashMap<String, ToolFixture>,
}

impl StaticToolInvoker {
    pub fn new(fixtures: HashMap<String, ToolFixture>) -> Self {
        Self { fixtures }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let fixtures = serde_json::from_str(&content).map_err(|source| FixtureError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(fixtures))
    }

    fn fixture(&self, invocation: &ToolInvocation) -> Option<&ToolFixture> {
        self.fixtures
            .get(&invocation.tool.to_string())
            .or_else(|| self.fixtures.get(&invocation.tool.name))
    }
}

#[async_trait]
impl ToolInvokerPort for StaticToolInvoker {
    async fn invoke(&self, invocation: &ToolInvocation) -> Result<Value, ToolError> {
        let fixture = self
            .fixture(invocation)
            .ok_or_else(|| ToolError::not_found(&invocation.tool))?;

        if fixture.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(fixture.latency_ms)).await;
        }
        debug!(
            tool = %invocation.tool,
            step = %invocation.step_id,
            attempt = invocation.attempt,
            "Serving fixture"
        );

        if invocation.attempt <= fixture.fail_attempts {
            return Err(ToolError::unavailable(format!(
                "fixture failure {} of {}",
                invocation.attempt, fixture.fail_attempts
            )));
        }
        if let Some(error) = &fixture.error {
            return Err(error.clone());
        }

        let mut output = fixture.output.clone();
        if fixture.echo_input {
            for (key, value) in &invocation.input {
                output.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        Ok(Value::Object(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::{PlanId, StepId, ToolErrorCode, ToolKey, ToolVersion};
    use serde_json::json;

    fn invocation(tool: &str, attempt: u32) -> ToolInvocation {
        let mut input = Map::new();
        input.insert("customer_id".to_string(), json!("c-42"));
        ToolInvocation {
            plan_id: PlanId::generate(),
            step_id: StepId::from("s1"),
            tool: ToolKey::new(tool, ToolVersion::new(1, 0, 0)),
            endpoint: None,
            input,
            credential: "token".to_string(),
            attempt,
        }
    }

    fn invoker() -> StaticToolInvoker {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixtures.json");
        std::fs::write(
            &path,
            r#"{
                "Profile": {"output": {"account_id": "a-1"}},
                "Profile@1.0.0": {"output": {"account_id": "pinned"}},
                "Echo": {"echo_input": true, "fail_attempts": 1},
                "Broken": {"error": {"code": "EXECUTION_FAILED", "message": "boom"}}
            }"#,
        )
        .unwrap();
        StaticToolInvoker::load(&path).unwrap()
    }

    #[tokio::test]
    async fn test_pinned_fixture_wins() {
        let output = invoker().invoke(&invocation("Profile", 1)).await.unwrap();
        assert_eq!(output, json!({"account_id": "pinned"}));
    }

    #[tokio::test]
    async fn test_fail_attempts_then_echo() {
        let invoker = invoker();
        let first = invoker.invoke(&invocation("Echo", 1)).await.unwrap_err();
        assert_eq!(first.code, ToolErrorCode::Unavailable);

        let second = invoker.invoke(&invocation("Echo", 2)).await.unwrap();
        assert_eq!(second, json!({"customer_id": "c-42"}));
    }

    #[tokio::test]
    async fn test_errors_and_unknown_tools() {
        let invoker = invoker();
        assert_eq!(invoker.invoke(&invocation("Broken", 1)).await.unwrap_err().code, ToolErrorCode::ExecutionFailed);
        assert_eq!(invoker.invoke(&invocation("Ghost", 1)).await.unwrap_err().code, ToolErrorCode::NotFound);
    }

    #[test]
    fn test_invalid_fixture_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(StaticToolInvoker::load(&path), Err(FixtureError::Parse { .. })));
    }
}
