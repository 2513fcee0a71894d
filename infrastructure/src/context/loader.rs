//! Execution context file loader
//!
//! The CLI stands in for the authentication collaborator: it reads the
//! caller's context from a TOML file.
//!
//! ```toml
//! subject = "alice"
//! tenant = "acme"
//! roles = ["analyst"]
//! authorized_domains = ["crm"]
//! authorized_tools = ["CustomerProfileTool"]   # optional allow-list
//! allow_escalation = true
//!
//! [limits]
//! max_tools = 10
//! max_runtime_ms = 60000
//! retention = "session"
//! ```

use conductor_domain::ExecutionContext;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ContextFileError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid context {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid context {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

pub fn load_context(path: impl AsRef<Path>) -> Result<ExecutionContext, ContextFileError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ContextFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let context: ExecutionContext = toml::from_str(&content).map_err(|source| ContextFileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let invalid = |reason: &str| ContextFileError::Invalid {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    if context.subject.trim().is_empty() {
        return Err(invalid("subject must not be empty"));
    }
    if context.tenant.trim().is_empty() {
        return Err(invalid("tenant must not be empty"));
    }

    debug!(
        path = %path.display(),
        tenant = %context.tenant,
        domains = context.authorized_domains.len(),
        "Loaded execution context"
    );
    Ok(context)
}
