//! Credential Escrow port
//!
//! Grants short-lived, tool-scoped credentials for a single invocation
//! attempt. [`ScopedGrant`] ties a grant to a scope: it must be released
//! explicitly, and if it is dropped first (the attempt future was dropped)
//! revocation is spawned onto the current runtime.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conductor_domain::ToolKey;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EscrowError {
    #[error("Credential denied: {0}")]
    Denied(String),

    #[error("Escrow unavailable: {0}")]
    Unavailable(String),
}

/// What a credential is requested for.
#[derive(Debug, Clone)]
pub struct CredentialRequest {
    pub tool: ToolKey,
    /// Data domains the credential may touch (the tool's scopes).
    pub scope: Vec<String>,
    pub ttl: Duration,
    pub subject: String,
    pub tenant: String,
}

/// A granted credential.
#[derive(Clone)]
pub struct CredentialGrant {
    pub id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl CredentialGrant {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for CredentialGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialGrant")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Port for credential escrow
#[async_trait]
pub trait CredentialEscrow: Send + Sync {
    async fn acquire(&self, request: &CredentialRequest) -> Result<CredentialGrant, EscrowError>;

    /// Revoke a grant. Revoking an unknown or already revoked grant is a no-op.
    async fn revoke(&self, grant_id: &str) -> Result<(), EscrowError>;
}

/// A grant that is revoked when its scope ends.
pub struct ScopedGrant {
    escrow: Arc<dyn CredentialEscrow>,
    grant: Option<CredentialGrant>,
}

impl ScopedGrant {
    pub fn new(escrow: Arc<dyn CredentialEscrow>, grant: CredentialGrant) -> Self {
        Self {
            escrow,
            grant: Some(grant),
        }
    }

    pub fn token(&self) -> &str {
        self.grant.as_ref().map(|g| g.token.as_str()).unwrap_or_default()
    }

    /// Revoke now and wait for the escrow to confirm.
    pub async fn release(mut self) {
        if let Some(grant) = self.grant.take()
            && let Err(e) = self.escrow.revoke(&grant.id).await
        {
            tracing::warn!(grant = %grant.id, error = %e, "Failed to revoke credential");
        }
    }
}

impl Drop for ScopedGrant {
    fn drop(&mut self) {
        let Some(grant) = self.grant.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let escrow = self.escrow.clone();
                handle.spawn(async move {
                    if let Err(e) = escrow.revoke(&grant.id).await {
                        tracing::warn!(grant = %grant.id, error = %e, "Failed to revoke dropped credential");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(grant = %grant.id, "Credential dropped outside a runtime, left to expire");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEscrow {
        revoked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CredentialEscrow for RecordingEscrow {
        async fn acquire(&self, _request: &CredentialRequest) -> Result<CredentialGrant, EscrowError> {
            unreachable!()
        }

        async fn revoke(&self, grant_id: &str) -> Result<(), EscrowError> {
            self.revoked.lock().unwrap().push(grant_id.to_string());
            Ok(())
        }
    }

    fn grant(id: &str) -> CredentialGrant {
        CredentialGrant {
            id: id.to_string(),
            token: "secret".to_string(),
            expires_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_release_revokes_once() {
        let escrow = Arc::new(RecordingEscrow::default());
        let scoped = ScopedGrant::new(escrow.clone(), grant("g1"));
        assert_eq!(scoped.token(), "secret");
        scoped.release().await;
        tokio::task::yield_now().await;

        assert_eq!(*escrow.revoked.lock().unwrap(), vec!["g1".to_string()]);
    }

    #[tokio::test]
    async fn test_drop_spawns_revocation() {
        let escrow = Arc::new(RecordingEscrow::default());
        drop(ScopedGrant::new(escrow.clone(), grant("g2")));
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        assert_eq!(*escrow.revoked.lock().unwrap(), vec!["g2".to_string()]);
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", grant("g3"));
        assert!(rendered.contains("g3"));
        assert!(!rendered.contains("secret"));
    }
}
