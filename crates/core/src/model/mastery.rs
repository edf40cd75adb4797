use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::WordId;

//
// ─── MASTERY LEVEL ─────────────────────────────────────────────────────────────
//

/// Coarse proficiency stage of a word. Ordered from weakest to strongest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MasteryLevel {
    #[default]
    Learning,
    Practicing,
    Mastered,
}

impl MasteryLevel {
    pub const ALL: [MasteryLevel; 3] = [
        MasteryLevel::Learning,
        MasteryLevel::Practicing,
        MasteryLevel::Mastered,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MasteryLevel::Learning => "learning",
            MasteryLevel::Practicing => "practicing",
            MasteryLevel::Mastered => "mastered",
        }
    }

    #[must_use]
    pub fn promoted(self) -> Option<Self> {
        match self {
            MasteryLevel::Learning => Some(MasteryLevel::Practicing),
            MasteryLevel::Practicing => Some(MasteryLevel::Mastered),
            MasteryLevel::Mastered => None,
        }
    }

    #[must_use]
    pub fn demoted(self) -> Option<Self> {
        match self {
            MasteryLevel::Learning => None,
            MasteryLevel::Practicing => Some(MasteryLevel::Learning),
            MasteryLevel::Mastered => Some(MasteryLevel::Practicing),
        }
    }
}

impl fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown mastery level: {0}")]
pub struct UnknownMasteryLevel(pub String);

impl FromStr for MasteryLevel {
    type Err = UnknownMasteryLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MasteryLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| UnknownMasteryLevel(s.to_owned()))
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum MasteryError {
    #[error("accuracy must be in [0, 1], got {0}")]
    InvalidAccuracy(f64),
    #[error("a reviewed word needs a last review time")]
    MissingReviewTime,
}

//
// ─── WORD MASTERY ──────────────────────────────────────────────────────────────
//

/// Per-user, per-word proficiency state.
///
/// Only `MasteryPolicy` produces updated records; everything else reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordMastery {
    word_id: WordId,
    level: MasteryLevel,
    accuracy_ewma: f64,
    last_reviewed_at: Option<DateTime<Utc>>,
    review_count: u32,
    below_floor: bool,
}

impl WordMastery {
    /// Fresh record for a word that has never been reviewed.
    #[must_use]
    pub fn new(word_id: WordId, initial_accuracy: f64) -> Self {
        Self {
            word_id,
            level: MasteryLevel::Learning,
            accuracy_ewma: initial_accuracy.clamp(0.0, 1.0),
            last_reviewed_at: None,
            review_count: 0,
            below_floor: false,
        }
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `MasteryError::InvalidAccuracy` for an EWMA outside `[0, 1]` and
    /// `MasteryError::MissingReviewTime` when reviews were counted without a
    /// timestamp.
    pub fn from_persisted(
        word_id: WordId,
        level: MasteryLevel,
        accuracy_ewma: f64,
        last_reviewed_at: Option<DateTime<Utc>>,
        review_count: u32,
        below_floor: bool,
    ) -> Result<Self, MasteryError> {
        if !accuracy_ewma.is_finite() || !(0.0..=1.0).contains(&accuracy_ewma) {
            return Err(MasteryError::InvalidAccuracy(accuracy_ewma));
        }
        if review_count > 0 && last_reviewed_at.is_none() {
            return Err(MasteryError::MissingReviewTime);
        }
        Ok(Self {
            word_id,
            level,
            accuracy_ewma,
            last_reviewed_at,
            review_count,
            below_floor,
        })
    }

    #[must_use]
    pub fn word_id(&self) -> &WordId {
        &self.word_id
    }

    #[must_use]
    pub fn level(&self) -> MasteryLevel {
        self.level
    }

    #[must_use]
    pub fn accuracy_ewma(&self) -> f64 {
        self.accuracy_ewma
    }

    #[must_use]
    pub fn last_reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.last_reviewed_at
    }

    #[must_use]
    pub fn review_count(&self) -> u32 {
        self.review_count
    }

    /// Whether the previous update left the EWMA under the demotion floor.
    #[must_use]
    pub fn below_floor(&self) -> bool {
        self.below_floor
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.review_count == 0 || self.last_reviewed_at.is_none()
    }

    pub(crate) fn record_review(
        &mut self,
        accuracy_ewma: f64,
        level: MasteryLevel,
        below_floor: bool,
        reviewed_at: DateTime<Utc>,
    ) {
        self.accuracy_ewma = accuracy_ewma.clamp(0.0, 1.0);
        self.level = level;
        self.below_floor = below_floor;
        self.last_reviewed_at = Some(reviewed_at);
        self.review_count = self.review_count.saturating_add(1);
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn word() -> WordId {
        WordId::new("merhaba").unwrap()
    }

    #[test]
    fn new_record_starts_learning_and_unreviewed() {
        let m = WordMastery::new(word(), 0.5);
        assert_eq!(m.level(), MasteryLevel::Learning);
        assert_eq!(m.review_count(), 0);
        assert!(m.last_reviewed_at().is_none());
        assert!(m.is_new());
    }

    #[test]
    fn persisted_record_validates_accuracy() {
        let err = WordMastery::from_persisted(
            word(),
            MasteryLevel::Practicing,
            1.2,
            Some(fixed_now()),
            4,
            false,
        )
        .unwrap_err();
        assert_eq!(err, MasteryError::InvalidAccuracy(1.2));
    }

    #[test]
    fn persisted_record_needs_timestamp_once_reviewed() {
        let err = WordMastery::from_persisted(word(), MasteryLevel::Learning, 0.5, None, 2, false)
            .unwrap_err();
        assert_eq!(err, MasteryError::MissingReviewTime);
    }

    #[test]
    fn levels_step_one_at_a_time() {
        assert_eq!(MasteryLevel::Learning.promoted(), Some(MasteryLevel::Practicing));
        assert_eq!(MasteryLevel::Mastered.promoted(), None);
        assert_eq!(MasteryLevel::Mastered.demoted(), Some(MasteryLevel::Practicing));
        assert_eq!(MasteryLevel::Learning.demoted(), None);
        assert!(MasteryLevel::Learning < MasteryLevel::Mastered);
    }

    #[test]
    fn level_tags_round_trip() {
        for level in MasteryLevel::ALL {
            assert_eq!(level.as_str().parse::<MasteryLevel>().unwrap(), level);
        }
    }
}
