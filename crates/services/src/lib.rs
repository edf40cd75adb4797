#![forbid(unsafe_code)]

pub mod analytics_service;
pub mod app_services;
pub mod error;
pub mod locks;
pub mod mastery_service;
pub mod schedule_service;
pub mod sessions;

pub use lexi_core::Clock;
pub use sessions as session;

pub use analytics_service::{AnalyticsService, DEFAULT_TREND_DAYS};
pub use app_services::EngineServices;
pub use error::{
    AnalyticsServiceError, AppServicesError, MasteryServiceError, ScheduleServiceError,
    SessionError,
};
pub use locks::UserLocks;
pub use mastery_service::MasteryService;
pub use schedule_service::ScheduleService;
pub use sessions::{ActiveSession, FinishedSession, SessionAnswerResult, SessionLoopService};
