//! Plan attestation.
//!
//! A plan is sealed with `sha256:<hex>` over the canonical JSON of its body
//! (with the attestation field cleared) followed by one
//! `name@version:fingerprint` line per referenced tool, sorted. The
//! fingerprint is the SHA-256 of the tool's input and output schemas, so
//! changing a schema after sealing invalidates the plan.

use super::entities::Plan;
use crate::tool::{Tool, ToolCatalog};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use thiserror::Error;

const PREFIX: &str = "sha256:";

#[derive(Error, Debug)]
pub enum AttestationError {
    #[error("failed to canonicalize plan: {0}")]
    Canonicalize(#[from] serde_json::Error),
}

/// Outcome of checking a plan's stored attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationCheck {
    Valid,
    Missing,
    Mismatch { expected: String, found: String },
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// SHA-256 of a tool's input and output schemas.
pub fn schema_fingerprint(tool: &Tool) -> Result<String, AttestationError> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(&tool.input_schema)?);
    hasher.update(b"\n");
    hasher.update(serde_json::to_vec(&tool.output_schema)?);
    Ok(to_hex(&hasher.finalize()))
}

/// Recompute the attestation of `plan` against the current catalog.
pub fn compute_attestation(plan: &Plan, catalog: &ToolCatalog) -> Result<String, AttestationError> {
    let mut body = plan.clone();
    body.attestation = None;
    let canonical = serde_json::to_value(&body)?;

    let mut lines = BTreeSet::new();
    for step in &plan.steps {
        let line = match step.tool_key() {
            Some(key) => match catalog.get(&key) {
                Some(tool) => format!("{}:{}", key, schema_fingerprint(tool)?),
                None => format!("{}:unknown", key),
            },
            None => format!("{}@*:unpinned", step.tool),
        };
        lines.insert(line);
    }

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    for line in &lines {
        hasher.update(b"\n");
        hasher.update(line.as_bytes());
    }
    Ok(format!("{}{}", PREFIX, to_hex(&hasher.finalize())))
}

/// Store the attestation on the plan.
pub fn seal(plan: &mut Plan, catalog: &ToolCatalog) -> Result<(), AttestationError> {
    plan.attestation = Some(compute_attestation(plan, catalog)?);
    Ok(())
}

pub fn verify(plan: &Plan, catalog: &ToolCatalog) -> Result<AttestationCheck, AttestationError> {
    let Some(found) = &plan.attestation else {
        return Ok(AttestationCheck::Missing);
    };
    let expected = compute_attestation(plan, catalog)?;
    if &expected == found {
        Ok(AttestationCheck::Valid)
    } else {
        Ok(AttestationCheck::Mismatch {
            expected,
            found: found.clone(),
        })
    }
}
