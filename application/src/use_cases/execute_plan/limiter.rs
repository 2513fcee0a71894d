//! Per-tenant concurrency limiting.
//!
//! One [`Semaphore`] per tenant, created on first use and shared by every
//! request of that tenant, so one tenant's burst cannot starve the others.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub struct TenantLimiter {
    per_tenant: usize,
    semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl TenantLimiter {
    pub fn new(per_tenant: usize) -> Self {
        Self {
            per_tenant: per_tenant.max(1),
            semaphores: Mutex::new(HashMap::new()),
        }
    }

    fn semaphore(&self, tenant: &str) -> Arc<Semaphore> {
        let mut semaphores = self.semaphores.lock().unwrap_or_else(PoisonError::into_inner);
        semaphores
            .entry(tenant.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_tenant)))
            .clone()
    }

    /// Wait for a slot of `tenant`. The slot is held until the permit drops.
    pub async fn acquire(&self, tenant: &str) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.semaphore(tenant).acquire_owned().await
    }

    /// Free slots of `tenant` right now.
    pub fn available(&self, tenant: &str) -> usize {
        self.semaphore(tenant).available_permits()
    }

    pub fn per_tenant(&self) -> usize {
        self.per_tenant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let limiter = TenantLimiter::new(1);

        let held = limiter.acquire("acme").await.unwrap();
        assert_eq!(limiter.available("acme"), 0);
        assert_eq!(limiter.available("globex"), 1);

        let other = limiter.acquire("globex").await.unwrap();
        drop(other);
        drop(held);
        assert_eq!(limiter.available("acme"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_free_slot() {
        let limiter = Arc::new(TenantLimiter::new(1));
        let held = limiter.acquire("acme").await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(100), limiter.acquire("acme")).await;
        assert!(blocked.is_err());

        drop(held);
        assert!(limiter.acquire("acme").await.is_ok());
    }

    #[test]
    fn test_zero_is_raised_to_one() {
        assert_eq!(TenantLimiter::new(0).per_tenant(), 1);
    }
}
