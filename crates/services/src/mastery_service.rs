use std::sync::Arc;

use chrono::{DateTime, Utc};
use lexi_core::{
    mastery::{LevelChange, MasteryPolicy, MasteryUpdate},
    model::{ReviewResult, UserId, WordMastery},
    time::Clock,
};
use storage::repository::{MasteryPersistence, MasteryRepository};
use tracing::{error, info};

use crate::error::MasteryServiceError;
use crate::locks::UserLocks;

/// Applies review results to a user's mastery records.
///
/// Each call loads, updates and commits under the user's lock, so concurrent
/// sessions of the same user never lose an update.
#[derive(Clone)]
pub struct MasteryService {
    clock: Clock,
    policy: MasteryPolicy,
    locks: UserLocks,
    masteries: Arc<dyn MasteryRepository>,
    persistence: Arc<dyn MasteryPersistence>,
}

impl MasteryService {
    #[must_use]
    pub fn new(
        clock: Clock,
        policy: MasteryPolicy,
        locks: UserLocks,
        masteries: Arc<dyn MasteryRepository>,
        persistence: Arc<dyn MasteryPersistence>,
    ) -> Self {
        Self {
            clock,
            policy,
            locks,
            masteries,
            persistence,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &MasteryPolicy {
        &self.policy
    }

    /// Current records for `user`, read under the user's lock.
    ///
    /// # Errors
    ///
    /// Returns `MasteryServiceError::Storage` if loading fails.
    pub async fn snapshot(&self, user: &UserId) -> Result<Vec<WordMastery>, MasteryServiceError> {
        let _guard = self.locks.lock(user).await;
        Ok(self.masteries.load_word_masteries(user).await?)
    }

    /// Fold `results` into the user's records and persist both atomically.
    ///
    /// Returns one update per touched word. Nothing is written for an empty
    /// batch.
    ///
    /// # Errors
    ///
    /// Returns `MasteryServiceError::Storage` if loading or committing fails;
    /// the stored records are then unchanged.
    pub async fn apply_results(
        &self,
        user: &UserId,
        results: &[ReviewResult],
    ) -> Result<Vec<MasteryUpdate>, MasteryServiceError> {
        if results.is_empty() {
            return Ok(Vec::new());
        }
        let _guard = self.locks.lock(user).await;
        let now = self.clock.now();

        let current = self.masteries.load_word_masteries(user).await?;
        let updates = self.policy.apply_results(&current, results, now);
        let records: Vec<WordMastery> = updates.iter().map(|u| u.mastery.clone()).collect();

        if let Err(err) = self.persistence.commit_review(user, &records, results).await {
            error!(user = %user, words = records.len(), error = %err, "mastery commit failed");
            return Err(err.into());
        }

        log_updates(user, &updates, now);
        Ok(updates)
    }
}

fn log_updates(user: &UserId, updates: &[MasteryUpdate], now: DateTime<Utc>) {
    for update in updates {
        let word = update.mastery.word_id();
        match update.change {
            Some(LevelChange::Promoted { from, to }) => {
                info!(user = %user, word = %word, %from, %to, at = %now, "word promoted");
            }
            Some(LevelChange::Demoted { from, to }) => {
                info!(user = %user, word = %word, %from, %to, at = %now, "word demoted");
            }
            None => {}
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use lexi_core::model::{MasteryLevel, WordId};
    use lexi_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, ReviewHistoryRepository, StorageError};

    fn service(repo: &InMemoryRepository) -> MasteryService {
        MasteryService::new(
            Clock::fixed(fixed_now()),
            MasteryPolicy::default(),
            UserLocks::new(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    fn correct(word: &str) -> ReviewResult {
        ReviewResult::new(WordId::new(word).unwrap(), 1.0, fixed_now()).unwrap()
    }

    #[tokio::test]
    async fn third_correct_batch_promotes_and_persists() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::new("ada").unwrap();

        for round in 1..=3 {
            let updates = svc.apply_results(&user, &[correct("hund")]).await.unwrap();
            assert_eq!(updates.len(), 1);
            assert_eq!(updates[0].created, round == 1);
            if round == 3 {
                assert_eq!(
                    updates[0].change,
                    Some(LevelChange::Promoted {
                        from: MasteryLevel::Learning,
                        to: MasteryLevel::Practicing,
                    })
                );
            } else {
                assert_eq!(updates[0].change, None);
            }
        }

        let stored = svc.snapshot(&user).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].level(), MasteryLevel::Practicing);
        assert_eq!(stored[0].review_count(), 3);
        assert_eq!(repo.load_review_history(&user).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn empty_batch_writes_nothing() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::new("ada").unwrap();

        assert!(svc.apply_results(&user, &[]).await.unwrap().is_empty());
        assert!(svc.snapshot(&user).await.unwrap().is_empty());
    }

    struct FailingCommit;

    #[async_trait::async_trait]
    impl MasteryPersistence for FailingCommit {
        async fn commit_review(
            &self,
            _user: &UserId,
            _masteries: &[WordMastery],
            _results: &[ReviewResult],
        ) -> Result<(), StorageError> {
            Err(StorageError::Connection("disk full".into()))
        }
    }

    #[tokio::test]
    async fn failed_commit_leaves_records_untouched() {
        let repo = InMemoryRepository::new();
        let svc = MasteryService::new(
            Clock::fixed(fixed_now()),
            MasteryPolicy::default(),
            UserLocks::new(),
            Arc::new(repo.clone()),
            Arc::new(FailingCommit),
        );
        let user = UserId::new("ada").unwrap();

        let err = svc
            .apply_results(&user, &[correct("katze")])
            .await
            .unwrap_err();
        assert!(matches!(err, MasteryServiceError::Storage(_)));
        assert!(svc.snapshot(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_batches_for_one_user_are_all_counted() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::new("ada").unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let svc = svc.clone();
            let user = user.clone();
            handles.push(tokio::spawn(async move {
                svc.apply_results(&user, &[correct("maus")]).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = svc.snapshot(&user).await.unwrap();
        assert_eq!(stored[0].review_count(), 8);
    }
}
