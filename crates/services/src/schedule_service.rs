use std::sync::Arc;

use lexi_core::{
    model::UserId,
    scheduler::{CategoryScheduleEntry, ReviewSchedule, Scheduler, category_schedule},
    time::Clock,
};
use storage::repository::{
    MasteryRepository, ReviewHistoryRepository, ScheduleRepository, WordRepository,
};
use tracing::{debug, warn};

use crate::error::ScheduleServiceError;
use crate::locks::UserLocks;

/// Computes and stores review schedules from a consistent per-user snapshot.
#[derive(Clone)]
pub struct ScheduleService {
    clock: Clock,
    scheduler: Scheduler,
    locks: UserLocks,
    words: Arc<dyn WordRepository>,
    masteries: Arc<dyn MasteryRepository>,
    history: Arc<dyn ReviewHistoryRepository>,
    schedules: Arc<dyn ScheduleRepository>,
}

impl ScheduleService {
    #[must_use]
    pub fn new(
        clock: Clock,
        scheduler: Scheduler,
        locks: UserLocks,
        words: Arc<dyn WordRepository>,
        masteries: Arc<dyn MasteryRepository>,
        history: Arc<dyn ReviewHistoryRepository>,
        schedules: Arc<dyn ScheduleRepository>,
    ) -> Self {
        Self {
            clock,
            scheduler,
            locks,
            words,
            masteries,
            history,
            schedules,
        }
    }

    /// Recompute the schedule for `user` as of now and store it.
    ///
    /// The snapshot is read under the user's lock, so a concurrent mastery
    /// commit is either fully visible or not at all.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleServiceError::Storage` if reading or saving fails.
    pub async fn refresh(&self, user: &UserId) -> Result<ReviewSchedule, ScheduleServiceError> {
        let now = self.clock.now();
        let report = {
            let _guard = self.locks.lock(user).await;
            let masteries = self.masteries.load_word_masteries(user).await?;
            let history = self.history.load_review_history(user).await?;
            self.scheduler.compute_schedule(&masteries, &history, now)
        };

        for word in &report.clamped {
            warn!(user = %user, word = %word, "last review is in the future; clamped to now");
        }
        debug!(
            user = %user,
            entries = report.schedule.entries.len(),
            batch = report.schedule.batch.as_ref().map_or(0, |b| b.words.len()),
            "schedule computed"
        );

        self.schedules.save_schedule(user, &report.schedule).await?;
        Ok(report.schedule)
    }

    /// Category rollup of a schedule recomputed as of now.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleServiceError::Storage` if reading or saving fails.
    pub async fn by_category(
        &self,
        user: &UserId,
    ) -> Result<Vec<CategoryScheduleEntry>, ScheduleServiceError> {
        let schedule = self.refresh(user).await?;
        let words = self.words.list_words().await?;
        Ok(category_schedule(&schedule, &words))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
