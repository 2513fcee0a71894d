//! Execution context entities

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How long step outputs may be persisted beyond the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Outputs are returned to the caller but never written to the audit log
    Ephemeral,
    /// Outputs may be kept for the lifetime of the session
    #[default]
    Session,
    /// Outputs may be archived with the audit trail
    Persistent,
}

impl RetentionPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            RetentionPolicy::Ephemeral => "ephemeral",
            RetentionPolicy::Session => "session",
            RetentionPolicy::Persistent => "persistent",
        }
    }

    pub fn allows_output_persistence(&self) -> bool {
        !matches!(self, RetentionPolicy::Ephemeral)
    }
}

/// Per-session resource limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionLimits {
    /// Maximum number of steps a single plan may contain
    pub max_tools: usize,
    /// Upper bound for a plan's `max_execution_time_ms`
    pub max_runtime_ms: u64,
    pub retention: RetentionPolicy,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_tools: 10,
            max_runtime_ms: 60_000,
            retention: RetentionPolicy::Session,
        }
    }
}

/// The authorization/tenant envelope of one request.
///
/// Created once per inbound request by the authentication collaborator and
/// never modified afterwards; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub subject: String,
    pub tenant: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Explicit tool allow-list. `None` permits any tool inside the
    /// authorized domains.
    #[serde(default)]
    pub authorized_tools: Option<BTreeSet<String>>,
    #[serde(default)]
    pub authorized_domains: BTreeSet<String>,
    #[serde(default)]
    pub limits: SessionLimits,
    #[serde(default = "default_allow_escalation")]
    pub allow_escalation: bool,
}

fn default_allow_escalation() -> bool {
    true
}

impl ExecutionContext {
    pub fn new(subject: impl Into<String>, tenant: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            tenant: tenant.into(),
            roles: BTreeSet::new(),
            authorized_tools: None,
            authorized_domains: BTreeSet::new(),
            limits: SessionLimits::default(),
            allow_escalation: true,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.authorized_domains.insert(domain.into());
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.authorized_tools
            .get_or_insert_with(BTreeSet::new)
            .insert(tool.into());
        self
    }

    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn without_escalation(mut self) -> Self {
        self.allow_escalation = false;
        self
    }

    pub fn is_tool_authorized(&self, name: &str) -> bool {
        self.authorized_tools
            .as_ref()
            .is_none_or(|tools| tools.contains(name))
    }

    pub fn is_any_domain_authorized<'a>(&self, scopes: impl IntoIterator<Item = &'a String>) -> bool {
        scopes
            .into_iter()
            .any(|scope| self.authorized_domains.contains(scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_allow_list() {
        let open = ExecutionContext::new("alice", "acme");
        assert!(open.is_tool_authorized("Anything"));

        let restricted = ExecutionContext::new("alice", "acme").with_tool("CustomerProfileTool");
        assert!(restricted.is_tool_authorized("CustomerProfileTool"));
        assert!(!restricted.is_tool_authorized("BillingAnalyticsTool"));
    }

    #[test]
    fn test_domain_check() {
        let ctx = ExecutionContext::new("alice", "acme").with_domain("crm");
        let crm = vec!["crm".to_string(), "sales".to_string()];
        let finance = vec!["finance".to_string()];
        assert!(ctx.is_any_domain_authorized(&crm));
        assert!(!ctx.is_any_domain_authorized(&finance));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let ctx: ExecutionContext = serde_json::from_str(
            r#"{"subject": "svc", "tenant": "acme", "authorized_domains": ["crm"]}"#,
        )
        .unwrap();
        assert!(ctx.allow_escalation);
        assert!(ctx.authorized_tools.is_none());
        assert_eq!(ctx.limits, SessionLimits::default());
        assert!(ctx.limits.retention.allows_output_persistence());
        assert!(!RetentionPolicy::Ephemeral.allows_output_persistence());
    }
}
