//! Configuration issues.
//!
//! Loaded configuration is checked as a whole; problems are reported as
//! structured [`ConfigIssue`]s so the caller decides whether to abort
//! (any [`Severity::Error`]) or just warn.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A threshold outside [0, 1].
    ThresholdOutOfRange,
    /// A count or duration that must be positive is zero.
    ZeroLimit,
    /// A duration above its allowed maximum.
    LimitTooLarge,
    /// Complexity saturation is not positive.
    InvalidSaturation,
    /// A boost weight that is negative or not finite.
    InvalidWeight,
    /// No planning oracle is configured for a tier.
    MissingOracle,
    /// A configured file does not exist.
    MissingFile,
    /// The high tier falls back to the low tier's source.
    SharedOracle,
}

/// A detected issue in the configuration.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", label, self.message)
    }
}
