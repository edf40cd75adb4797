//! Tunable engine parameters.
//!
//! Defaults carry the domain values (4 lives, α = 0.3, 1/4/14 day base
//! intervals, 20-word batches, 0.6 weak-area threshold). Every struct
//! deserializes with `#[serde(default)]`, so a config file only needs the keys
//! it overrides; call `EngineSettings::validate` after loading.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::MasteryLevel;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("initial lives must be > 0")]
    InvalidLives,

    #[error("smoothing factor must be in (0, 1], got {0}")]
    InvalidAlpha(f64),

    #[error("{field} must be in [0, 1], got {value}")]
    InvalidRatio { field: &'static str, value: f64 },

    #[error("{field} must be a positive number of days up to 36500, got {value}")]
    InvalidInterval { field: &'static str, value: f64 },

    #[error("review batch cap must be > 0")]
    InvalidBatchCap,

    #[error("mastered promotion needs at least as many reviews as practicing promotion")]
    InvalidReviewCounts,

    #[error("{field} must be finite and >= 0, got {value}")]
    InvalidFactor { field: &'static str, value: f64 },

    #[error("streak_bonus must be in [0, 10], got {0}")]
    InvalidStreakBonus(f64),
}

/// Longest base interval a config may set (about a century).
pub const MAX_INTERVAL_DAYS: f64 = 36_500.0;
/// Largest per-step streak bonus a config may set.
pub const MAX_STREAK_BONUS: f64 = 10.0;

fn check_ratio(field: &'static str, value: f64) -> Result<(), SettingsError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::InvalidRatio { field, value })
    }
}

fn check_interval(field: &'static str, value: f64) -> Result<(), SettingsError> {
    if value > 0.0 && value <= MAX_INTERVAL_DAYS {
        Ok(())
    } else {
        Err(SettingsError::InvalidInterval { field, value })
    }
}

fn check_factor(field: &'static str, value: f64) -> Result<(), SettingsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SettingsError::InvalidFactor { field, value })
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Lives and reward schedule for exercise sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    initial_lives: u32,
    base_xp: u32,
    base_gems: u32,
    reinforcement_threshold: f64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            initial_lives: 4,
            base_xp: 10,
            base_gems: 5,
            reinforcement_threshold: 1.0,
        }
    }
}

impl SessionSettings {
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidLives` when `lives` is zero.
    pub fn with_lives(self, lives: u32) -> Result<Self, SettingsError> {
        if lives == 0 {
            return Err(SettingsError::InvalidLives);
        }
        Ok(self.with_lives_unchecked(lives))
    }

    pub(crate) fn with_lives_unchecked(mut self, lives: u32) -> Self {
        self.initial_lives = lives;
        self
    }

    #[must_use]
    pub fn with_rewards(mut self, xp: u32, gems: u32) -> Self {
        self.base_xp = xp;
        self.base_gems = gems;
        self
    }

    /// Words whose session accuracy falls below `threshold` are flagged for
    /// reinforcement. The default of `1.0` flags any miss.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidRatio` outside `[0, 1]`.
    pub fn with_reinforcement_threshold(mut self, threshold: f64) -> Result<Self, SettingsError> {
        check_ratio("reinforcement_threshold", threshold)?;
        self.reinforcement_threshold = threshold;
        Ok(self)
    }

    #[must_use]
    pub fn initial_lives(&self) -> u32 {
        self.initial_lives
    }

    #[must_use]
    pub fn base_xp(&self) -> u32 {
        self.base_xp
    }

    #[must_use]
    pub fn base_gems(&self) -> u32 {
        self.base_gems
    }

    #[must_use]
    pub fn reinforcement_threshold(&self) -> f64 {
        self.reinforcement_threshold
    }

    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.initial_lives == 0 {
            return Err(SettingsError::InvalidLives);
        }
        check_ratio("reinforcement_threshold", self.reinforcement_threshold)
    }
}

//
// ─── MASTERY ───────────────────────────────────────────────────────────────────
//

/// EWMA smoothing and level transition thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterySettings {
    alpha: f64,
    initial_accuracy: f64,
    practicing_min_reviews: u32,
    practicing_min_accuracy: f64,
    mastered_min_reviews: u32,
    mastered_min_accuracy: f64,
    demotion_floor: f64,
}

impl Default for MasterySettings {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            initial_accuracy: 0.5,
            practicing_min_reviews: 3,
            practicing_min_accuracy: 0.7,
            mastered_min_reviews: 8,
            mastered_min_accuracy: 0.9,
            demotion_floor: 0.5,
        }
    }
}

impl MasterySettings {
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidAlpha` outside `(0, 1]`.
    pub fn with_alpha(mut self, alpha: f64) -> Result<Self, SettingsError> {
        if !alpha.is_finite() || alpha <= 0.0 || alpha > 1.0 {
            return Err(SettingsError::InvalidAlpha(alpha));
        }
        self.alpha = alpha;
        Ok(self)
    }

    /// Starting EWMA for a word seen for the first time.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidRatio` outside `[0, 1]`.
    pub fn with_initial_accuracy(mut self, value: f64) -> Result<Self, SettingsError> {
        check_ratio("initial_accuracy", value)?;
        self.initial_accuracy = value;
        Ok(self)
    }

    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[must_use]
    pub fn initial_accuracy(&self) -> f64 {
        self.initial_accuracy
    }

    #[must_use]
    pub fn demotion_floor(&self) -> f64 {
        self.demotion_floor
    }

    /// Minimum `(review_count, accuracy)` to be promoted out of `from`.
    /// `None` for the top level.
    #[must_use]
    pub fn promotion_gate(&self, from: MasteryLevel) -> Option<(u32, f64)> {
        match from {
            MasteryLevel::Learning => {
                Some((self.practicing_min_reviews, self.practicing_min_accuracy))
            }
            MasteryLevel::Practicing => {
                Some((self.mastered_min_reviews, self.mastered_min_accuracy))
            }
            MasteryLevel::Mastered => None,
        }
    }

    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 || self.alpha > 1.0 {
            return Err(SettingsError::InvalidAlpha(self.alpha));
        }
        check_ratio("initial_accuracy", self.initial_accuracy)?;
        check_ratio("practicing_min_accuracy", self.practicing_min_accuracy)?;
        check_ratio("mastered_min_accuracy", self.mastered_min_accuracy)?;
        check_ratio("demotion_floor", self.demotion_floor)?;
        if self.mastered_min_reviews < self.practicing_min_reviews {
            return Err(SettingsError::InvalidReviewCounts);
        }
        Ok(())
    }
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Interval, batching and diagnostic parameters for the review scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    learning_interval_days: f64,
    practicing_interval_days: f64,
    mastered_interval_days: f64,
    streak_bonus: f64,
    streak_cap: u32,
    reinforcement_factor: f64,
    batch_cap: usize,
    weak_area_threshold: f64,
    max_recommendations: usize,
    intensive_min_batch: usize,
    intensive_min_severity: f64,
    quick_max_batch: usize,
    quick_max_severity: f64,
    high_priority_severity: f64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            learning_interval_days: 1.0,
            practicing_interval_days: 4.0,
            mastered_interval_days: 14.0,
            streak_bonus: 0.5,
            streak_cap: 4,
            reinforcement_factor: 0.5,
            batch_cap: 20,
            weak_area_threshold: 0.6,
            max_recommendations: 3,
            intensive_min_batch: 10,
            intensive_min_severity: 1.0,
            quick_max_batch: 5,
            quick_max_severity: 0.5,
            high_priority_severity: 1.0,
        }
    }
}

impl SchedulerSettings {
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidBatchCap` when `cap` is zero.
    pub fn with_batch_cap(mut self, cap: usize) -> Result<Self, SettingsError> {
        if cap == 0 {
            return Err(SettingsError::InvalidBatchCap);
        }
        self.batch_cap = cap;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns `SettingsError::InvalidRatio` outside `[0, 1]`.
    pub fn with_weak_area_threshold(mut self, threshold: f64) -> Result<Self, SettingsError> {
        check_ratio("weak_area_threshold", threshold)?;
        self.weak_area_threshold = threshold;
        Ok(self)
    }

    /// Base interval in days before streak and reinforcement scaling.
    #[must_use]
    pub fn base_interval_days(&self, level: MasteryLevel) -> f64 {
        match level {
            MasteryLevel::Learning => self.learning_interval_days,
            MasteryLevel::Practicing => self.practicing_interval_days,
            MasteryLevel::Mastered => self.mastered_interval_days,
        }
    }

    #[must_use]
    pub fn streak_bonus(&self) -> f64 {
        self.streak_bonus
    }

    #[must_use]
    pub fn streak_cap(&self) -> u32 {
        self.streak_cap
    }

    #[must_use]
    pub fn reinforcement_factor(&self) -> f64 {
        self.reinforcement_factor
    }

    #[must_use]
    pub fn batch_cap(&self) -> usize {
        self.batch_cap
    }

    #[must_use]
    pub fn weak_area_threshold(&self) -> f64 {
        self.weak_area_threshold
    }

    #[must_use]
    pub fn max_recommendations(&self) -> usize {
        self.max_recommendations
    }

    #[must_use]
    pub fn intensive_min_batch(&self) -> usize {
        self.intensive_min_batch
    }

    #[must_use]
    pub fn intensive_min_severity(&self) -> f64 {
        self.intensive_min_severity
    }

    #[must_use]
    pub fn quick_max_batch(&self) -> usize {
        self.quick_max_batch
    }

    #[must_use]
    pub fn quick_max_severity(&self) -> f64 {
        self.quick_max_severity
    }

    #[must_use]
    pub fn high_priority_severity(&self) -> f64 {
        self.high_priority_severity
    }

    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_interval("learning_interval_days", self.learning_interval_days)?;
        check_interval("practicing_interval_days", self.practicing_interval_days)?;
        check_interval("mastered_interval_days", self.mastered_interval_days)?;
        if !(0.0..=MAX_STREAK_BONUS).contains(&self.streak_bonus) {
            return Err(SettingsError::InvalidStreakBonus(self.streak_bonus));
        }
        check_ratio("reinforcement_factor", self.reinforcement_factor)?;
        check_ratio("weak_area_threshold", self.weak_area_threshold)?;
        check_factor("intensive_min_severity", self.intensive_min_severity)?;
        check_factor("quick_max_severity", self.quick_max_severity)?;
        check_factor("high_priority_severity", self.high_priority_severity)?;
        if self.batch_cap == 0 {
            return Err(SettingsError::InvalidBatchCap);
        }
        Ok(())
    }
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// All engine parameters, as loaded from a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub session: SessionSettings,
    pub mastery: MasterySettings,
    pub scheduler: SchedulerSettings,
}

impl EngineSettings {
    /// # Errors
    ///
    /// Returns the first invalid field across all sections.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.session.validate()?;
        self.mastery.validate()?;
        self.scheduler.validate()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
