//! Shared utilities for use cases.
//!
//! Cancellation helpers used by GeneratePlan, Escalate, ExecutePlan and
//! RunGoal.

use tokio_util::sync::CancellationToken;

/// Whether cancellation has been requested on an optional token.
pub(crate) fn is_cancelled(token: &Option<CancellationToken>) -> bool {
    token.as_ref().is_some_and(CancellationToken::is_cancelled)
}

/// Resolves when the token is cancelled; pends forever without a token.
pub(crate) async fn cancelled(token: &Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_is_cancelled() {
        assert!(!is_cancelled(&None));
        let token = CancellationToken::new();
        let some = Some(token.clone());
        assert!(!is_cancelled(&some));
        token.cancel();
        assert!(is_cancelled(&some));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_without_token_never_resolves() {
        let waited = tokio::time::timeout(Duration::from_secs(60), cancelled(&None)).await;
        assert!(waited.is_err());

        let token = CancellationToken::new();
        token.cancel();
        cancelled(&Some(token)).await;
    }
}
