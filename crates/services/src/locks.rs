//! Per-user serialization of mastery read-modify-write cycles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use lexi_core::model::UserId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Hands out one async lock per user.
///
/// Holders of a user's guard are the only writers of that user's mastery
/// records; readers that need a consistent snapshot take the same guard.
#[derive(Debug, Clone, Default)]
pub struct UserLocks {
    inner: Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>,
}

impl UserLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock of `user`.
    ///
    /// Entries nobody holds or waits on are dropped first.
    pub async fn lock(&self, user: &UserId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(map.entry(user.clone()).or_default())
        };
        slot.lock_owned().await
    }

    /// Number of users with a tracked lock, including idle ones not yet pruned.
    #[must_use]
    pub fn tracked_users(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn user(raw: &str) -> UserId {
        UserId::new(raw).unwrap()
    }

    #[tokio::test]
    async fn same_user_waits_for_the_holder() {
        let locks = UserLocks::new();
        let guard = locks.lock(&user("ada")).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&user("ada")).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_users_do_not_contend() {
        let locks = UserLocks::new();
        let _ada = locks.lock(&user("ada")).await;
        let _bob = tokio::time::timeout(Duration::from_millis(100), locks.lock(&user("bob")))
            .await
            .expect("independent lock");
        assert_eq!(locks.tracked_users(), 2);
    }

    #[tokio::test]
    async fn idle_entries_are_pruned_on_next_lock() {
        let locks = UserLocks::new();
        drop(locks.lock(&user("ada")).await);
        let held = locks.lock(&user("bob")).await;
        assert_eq!(locks.tracked_users(), 1);

        // A held lock survives pruning.
        drop(locks.lock(&user("cem")).await);
        assert_eq!(locks.tracked_users(), 2);
        drop(held);
    }
}
