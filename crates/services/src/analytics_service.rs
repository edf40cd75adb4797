use std::sync::Arc;

use lexi_core::{
    analytics::{AnalyticsReport, MAX_TREND_DAYS, build_report},
    model::UserId,
    settings::SchedulerSettings,
    time::Clock,
    weak_areas::{WeakArea, weak_areas},
};
use storage::repository::{MasteryRepository, ReviewHistoryRepository, WordRepository};
use tracing::debug;

use crate::error::AnalyticsServiceError;
use crate::locks::UserLocks;

/// Default trend window, in days.
pub const DEFAULT_TREND_DAYS: u32 = 7;

/// Read-only rollups over a user's mastery records and review history.
#[derive(Clone)]
pub struct AnalyticsService {
    clock: Clock,
    settings: SchedulerSettings,
    locks: UserLocks,
    words: Arc<dyn WordRepository>,
    masteries: Arc<dyn MasteryRepository>,
    history: Arc<dyn ReviewHistoryRepository>,
}

impl AnalyticsService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: SchedulerSettings,
        locks: UserLocks,
        words: Arc<dyn WordRepository>,
        masteries: Arc<dyn MasteryRepository>,
        history: Arc<dyn ReviewHistoryRepository>,
    ) -> Self {
        Self {
            clock,
            settings,
            locks,
            words,
            masteries,
            history,
        }
    }

    /// Weak categories for `user`, weakest first.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsServiceError::Storage` if loading fails.
    pub async fn weak_areas(&self, user: &UserId) -> Result<Vec<WeakArea>, AnalyticsServiceError> {
        let words = self.words.list_words().await?;
        let (masteries, history) = {
            let _guard = self.locks.lock(user).await;
            (
                self.masteries.load_word_masteries(user).await?,
                self.history.load_review_history(user).await?,
            )
        };
        let areas = weak_areas(&words, &masteries, &history, &self.settings);
        debug!(user = %user, weak = areas.len(), "weak areas computed");
        Ok(areas)
    }

    /// Full analytics report over the last `trend_days` days, capped at
    /// `MAX_TREND_DAYS`.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsServiceError::Storage` if loading fails.
    pub async fn report(
        &self,
        user: &UserId,
        trend_days: u32,
    ) -> Result<AnalyticsReport, AnalyticsServiceError> {
        if trend_days > MAX_TREND_DAYS {
            debug!(user = %user, requested = trend_days, "trend window capped");
        }
        let trend_days = trend_days.min(MAX_TREND_DAYS);
        let words = self.words.list_words().await?;
        let (masteries, history) = {
            let _guard = self.locks.lock(user).await;
            (
                self.masteries.load_word_masteries(user).await?,
                self.history.load_review_history(user).await?,
            )
        };
        Ok(build_report(
            &words,
            &masteries,
            &history,
            &self.settings,
            self.clock.now(),
            trend_days,
        ))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
