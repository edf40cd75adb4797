use std::sync::Arc;

use lexi_core::{EngineSettings, mastery::MasteryPolicy, scheduler::Scheduler};
use storage::repository::Storage;

use crate::Clock;
use crate::analytics_service::AnalyticsService;
use crate::error::AppServicesError;
use crate::locks::UserLocks;
use crate::mastery_service::MasteryService;
use crate::schedule_service::ScheduleService;
use crate::sessions::SessionLoopService;

/// Assembles the engine's services over one storage bundle.
///
/// All services share a single `UserLocks`, so mastery commits, schedule
/// snapshots and analytics reads of the same user are serialized.
#[derive(Clone)]
pub struct EngineServices {
    storage: Storage,
    mastery: Arc<MasteryService>,
    schedule: Arc<ScheduleService>,
    analytics: Arc<AnalyticsService>,
    session_loop: Arc<SessionLoopService>,
}

impl EngineServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` for invalid settings or if storage
    /// initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: EngineSettings,
    ) -> Result<Self, AppServicesError> {
        settings.validate()?;
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, settings))
    }

    /// Build services over an existing storage bundle.
    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, settings: EngineSettings) -> Self {
        let locks = UserLocks::new();

        let mastery = MasteryService::new(
            clock,
            MasteryPolicy::new(settings.mastery.clone()),
            locks.clone(),
            Arc::clone(&storage.masteries),
            Arc::clone(&storage.persistence),
        );
        let schedule = ScheduleService::new(
            clock,
            Scheduler::new(settings.scheduler.clone()),
            locks.clone(),
            Arc::clone(&storage.words),
            Arc::clone(&storage.masteries),
            Arc::clone(&storage.history),
            Arc::clone(&storage.schedules),
        );
        let analytics = AnalyticsService::new(
            clock,
            settings.scheduler.clone(),
            locks,
            Arc::clone(&storage.words),
            Arc::clone(&storage.masteries),
            Arc::clone(&storage.history),
        );
        let session_loop = SessionLoopService::new(
            clock,
            settings.session.clone(),
            Arc::clone(&storage.lessons),
            mastery.clone(),
        )
        .with_schedule(schedule.clone());

        Self {
            storage,
            mastery: Arc::new(mastery),
            schedule: Arc::new(schedule),
            analytics: Arc::new(analytics),
            session_loop: Arc::new(session_loop),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn mastery(&self) -> Arc<MasteryService> {
        Arc::clone(&self.mastery)
    }

    #[must_use]
    pub fn schedule(&self) -> Arc<ScheduleService> {
        Arc::clone(&self.schedule)
    }

    #[must_use]
    pub fn analytics(&self) -> Arc<AnalyticsService> {
        Arc::clone(&self.analytics)
    }

    #[must_use]
    pub fn session_loop(&self) -> Arc<SessionLoopService> {
        Arc::clone(&self.session_loop)
    }
}
