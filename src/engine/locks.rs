use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-offer mutual exclusion. Every mutating booking operation holds the
/// offer's guard for its whole duration.
#[derive(Default, Clone)]
pub struct OfferLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

pub struct OfferLockGuard {
    offer_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl OfferLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, offer_id: Uuid) -> OfferLockGuard {
        let lock = self.locks.entry(offer_id).or_default().clone();
        let guard = lock.lock_owned().await;

        OfferLockGuard {
            offer_id,
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    pub fn held(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for OfferLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map's own handle left means nobody holds or awaits it.
        self.locks
            .remove_if(&self.offer_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex as AsyncMutex;
    use uuid::Uuid;

    use super::OfferLocks;

    #[tokio::test]
    async fn same_offer_is_serialized() {
        let locks = OfferLocks::new();
        let offer_id = Uuid::new_v4();
        let trace = Arc::new(AsyncMutex::new(Vec::new()));

        let first = {
            let locks = locks.clone();
            let trace = trace.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(offer_id).await;
                trace.lock().await.push("first-start");
                tokio::time::sleep(Duration::from_millis(50)).await;
                trace.lock().await.push("first-end");
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = {
            let locks = locks.clone();
            let trace = trace.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(offer_id).await;
                trace.lock().await.push("second");
            })
        };

        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(*trace.lock().await, vec!["first-start", "first-end", "second"]);
        assert_eq!(locks.held(), 0);
    }

    #[tokio::test]
    async fn different_offers_do_not_block() {
        let locks = OfferLocks::new();
        let _a = locks.acquire(Uuid::new_v4()).await;
        let _b = locks.acquire(Uuid::new_v4()).await;
        assert_eq!(locks.held(), 2);
    }
}
