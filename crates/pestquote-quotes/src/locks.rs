use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-lead critical sections so two requests for the same lead never
/// interleave their read-then-write sequences.
#[derive(Default, Clone)]
pub struct LeadLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl LeadLocks {
    pub async fn acquire(&self, lead_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop entries nobody is waiting on.
            locks.retain(|id, lock| *id == lead_id || Arc::strong_count(lock) > 1);
            locks.entry(lead_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_lead_waits_for_holder() {
        let locks = LeadLocks::default();
        let lead_id = Uuid::new_v4();

        let guard = locks.acquire(lead_id).await;
        let contender = tokio::time::timeout(Duration::from_millis(50), locks.acquire(lead_id)).await;
        assert!(contender.is_err());

        drop(guard);
        let reacquired = tokio::time::timeout(Duration::from_millis(50), locks.acquire(lead_id)).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn different_leads_do_not_block() {
        let locks = LeadLocks::default();

        let _first = locks.acquire(Uuid::new_v4()).await;
        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire(Uuid::new_v4())).await;
        assert!(second.is_ok());
    }
}
