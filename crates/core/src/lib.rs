#![forbid(unsafe_code)]

pub mod analytics;
pub mod error;
pub mod evaluation;
pub mod mastery;
pub mod model;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod time;
pub mod weak_areas;

pub use error::Error;
pub use settings::{EngineSettings, MasterySettings, SchedulerSettings, SessionSettings};
pub use time::Clock;
