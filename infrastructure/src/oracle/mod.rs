//! Plan oracle adapters

#[cfg(feature = "http")]
mod http;
mod json_file;

#[cfg(feature = "http")]
pub use http::HttpPlanOracle;
pub use json_file::JsonPlanOracle;

use conductor_application::ports::plan_oracle::PlanRequest;
use serde_json::{Value, json};

/// Request body sent to remote oracles.
///
/// Candidates carry name, pinned version, scopes and schemas; embeddings and
/// usage statistics stay private to the registry.
pub fn oracle_payload(request: &PlanRequest) -> Value {
    let candidates: Vec<Value> = request
        .candidates
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "version": tool.version,
                "description": tool.description,
                "scopes": tool.scopes,
                "input_schema": tool.input_schema,
                "output_schema": tool.output_schema,
            })
        })
        .collect();

    let mut payload = json!({
        "goal": request.goal,
        "tier": request.tier,
        "candidate_tools": candidates,
        "context": {
            "tenant": request.context.tenant,
            "authorized_domains": request.context.authorized_domains,
            "limits": request.context.limits,
        },
    });
    if let Some(draft) = &request.previous_draft {
        payload["previous_draft"] = json!(draft);
    }
    payload
}
