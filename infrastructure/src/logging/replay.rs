//! Rebuild tool usage statistics from an audit trail.
//!
//! The registry is in-memory, so `tools sweep` replays `step_finished`
//! events to learn how often each pinned tool version was actually invoked.
//! A step with `n` attempts counts as `n` invocations; only the last one can
//! be a success.

use conductor_application::ToolRegistryPort;
use conductor_domain::{ToolKey, ToolVersion};
use serde::Deserialize;
use std::io::BufRead;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize)]
struct StepFinished {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    tool_version: Option<ToolVersion>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    attempts: u32,
    #[serde(default)]
    duration_ms: u64,
}

/// Replay invocations into `registry`, returning how many were recorded.
pub fn replay_invocations(path: impl AsRef<Path>, registry: &dyn ToolRegistryPort) -> std::io::Result<u64> {
    let file = std::fs::File::open(path.as_ref())?;
    let mut recorded = 0;

    for line in std::io::BufReader::new(file).lines() {
        let line = line?;
        let Ok(event) = serde_json::from_str::<StepFinished>(&line) else {
            debug!("Skipping unreadable audit line");
            continue;
        };
        if event.event_type != "step_finished" || event.attempts == 0 {
            continue;
        }
        let (Some(tool), Some(version)) = (event.tool, event.tool_version) else {
            continue;
        };

        let key = ToolKey::new(tool, version);
        let latency = event.duration_ms / u64::from(event.attempts);
        for attempt in 1..=event.attempts {
            let success = attempt == event.attempts && event.status == "succeeded";
            registry.record_invocation(&key, latency, success);
            recorded += 1;
        }
    }

    Ok(recorded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryToolRegistry;
    use conductor_domain::{Embedding, Tool};

    #[test]
    fn test_replay_counts_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        std::fs::write(
            &path,
            [
                r#"{"type":"plan_generated","plan_id":"p"}"#,
                r#"{"type":"step_finished","tool":"A","tool_version":"1.0.0","status":"succeeded","attempts":3,"duration_ms":30}"#,
                r#"{"type":"step_finished","tool":"A","tool_version":"1.0.0","status":"skipped","attempts":0}"#,
                r#"{"type":"step_finished","tool":"B","tool_version":"1.0.0","status":"failed","attempts":1,"duration_ms":5}"#,
                "not json",
            ]
            .join("\n"),
        )
        .unwrap();

        let registry = InMemoryToolRegistry::new(1);
        for name in ["A", "B"] {
            registry
                .register(Tool::new(name, ToolVersion::new(1, 0, 0), Embedding::new(vec![1.0])).with_scope("crm"))
                .unwrap();
        }

        assert_eq!(replay_invocations(&path, &registry).unwrap(), 4);
        let catalog = registry.snapshot();
        let a = catalog.get_version("A", ToolVersion::new(1, 0, 0)).unwrap();
        assert_eq!(a.stats.invocations, 3);
        assert_eq!(a.stats.success_rate(), Some(1.0 / 3.0));
        let b = catalog.get_version("B", ToolVersion::new(1, 0, 0)).unwrap();
        assert_eq!(b.stats.success_rate(), Some(0.0));
    }
}
