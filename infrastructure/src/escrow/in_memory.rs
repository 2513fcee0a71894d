//! In-process credential escrow.
//!
//! Issues opaque random tokens with a TTL and tracks outstanding grants so a
//! run can be checked for leaked credentials. Tools can be denied outright
//! to exercise the `CredentialDenied` path.

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use conductor_application::ports::credential_escrow::{
    CredentialEscrow, CredentialGrant, CredentialRequest, EscrowError,
};
use conductor_domain::ToolKey;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Outstanding {
    tool: ToolKey,
    tenant: String,
    expires_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialEscrow {
    grants: Mutex<HashMap<String, Outstanding>>,
    denied: HashSet<String>,
}

impl InMemoryCredentialEscrow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse credentials for every version of `tool`.
    pub fn with_denied(mut self, tool: impl Into<String>) -> Self {
        self.denied.insert(tool.into());
        self
    }

    /// Grants that are neither revoked nor expired.
    pub fn outstanding(&self) -> usize {
        let now = Utc::now();
        self.grants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|g| g.expires_at > now)
            .count()
    }

    /// Drop expired grants, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
        let before = grants.len();
        grants.retain(|_, g| g.expires_at > now);
        before - grants.len()
    }
}

#[async_trait]
impl CredentialEscrow for InMemoryCredentialEscrow {
    async fn acquire(&self, request: &CredentialRequest) -> Result<CredentialGrant, EscrowError> {
        if self.denied.contains(&request.tool.name) {
            warn!(tool = %request.tool, tenant = %request.tenant, "Credential denied");
            return Err(EscrowError::Denied(format!(
                "{} is not permitted for {}",
                request.tool, request.subject
            )));
        }
        if request.scope.is_empty() {
            return Err(EscrowError::Denied(format!("{} has no scope", request.tool)));
        }

        let expires_at = TimeDelta::from_std(request.ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| EscrowError::Denied(format!("ttl {:?} out of range", request.ttl)))?;
        let grant = CredentialGrant {
            id: Uuid::new_v4().to_string(),
            token: Uuid::new_v4().simple().to_string(),
            expires_at,
        };

        self.grants.lock().unwrap_or_else(PoisonError::into_inner).insert(
            grant.id.clone(),
            Outstanding {
                tool: request.tool.clone(),
                tenant: request.tenant.clone(),
                expires_at: grant.expires_at,
            },
        );
        debug!(grant = %grant.id, tool = %request.tool, "Issued credential");
        Ok(grant)
    }

    async fn revoke(&self, grant_id: &str) -> Result<(), EscrowError> {
        let removed = self
            .grants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(grant_id);
        if let Some(grant) = removed {
            debug!(grant = grant_id, tool = %grant.tool, tenant = %grant.tenant, "Revoked credential");
        }
        Ok(())
    }
}
