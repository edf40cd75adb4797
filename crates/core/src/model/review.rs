use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::model::exercise::ExerciseType;
use crate::model::ids::WordId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ReviewResultError {
    #[error("review accuracy must be in [0, 1], got {0}")]
    InvalidAccuracy(f64),
    #[error("mistake tag cannot be empty")]
    EmptyMistake,
}

//
// ─── REVIEW RESULT ─────────────────────────────────────────────────────────────
//

/// Outcome of practicing one word during one session. Append-only history.
///
/// `mistakes` holds exercise-type tags (see `ExerciseType::as_str`) for the
/// exercises answered wrongly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    word_id: WordId,
    accuracy: f64,
    latency: Duration,
    attempts: u32,
    practiced: BTreeSet<ExerciseType>,
    mistakes: BTreeSet<String>,
    needs_reinforcement: bool,
    reviewed_at: DateTime<Utc>,
}

impl ReviewResult {
    /// # Errors
    ///
    /// Returns `ReviewResultError::InvalidAccuracy` outside `[0, 1]`.
    pub fn new(
        word_id: WordId,
        accuracy: f64,
        reviewed_at: DateTime<Utc>,
    ) -> Result<Self, ReviewResultError> {
        if !accuracy.is_finite() || !(0.0..=1.0).contains(&accuracy) {
            return Err(ReviewResultError::InvalidAccuracy(accuracy));
        }
        Ok(Self {
            word_id,
            accuracy,
            latency: Duration::ZERO,
            attempts: 1,
            practiced: BTreeSet::new(),
            mistakes: BTreeSet::new(),
            needs_reinforcement: false,
            reviewed_at,
        })
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_practiced(mut self, practiced: impl IntoIterator<Item = ExerciseType>) -> Self {
        self.practiced.extend(practiced);
        self
    }

    /// # Errors
    ///
    /// Returns `ReviewResultError::EmptyMistake` if any tag is blank.
    pub fn with_mistakes<I, S>(mut self, mistakes: I) -> Result<Self, ReviewResultError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in mistakes {
            let tag = tag.into().trim().to_owned();
            if tag.is_empty() {
                return Err(ReviewResultError::EmptyMistake);
            }
            self.mistakes.insert(tag);
        }
        Ok(self)
    }

    #[must_use]
    pub fn with_reinforcement(mut self, needs_reinforcement: bool) -> Self {
        self.needs_reinforcement = needs_reinforcement;
        self
    }

    #[must_use]
    pub fn word_id(&self) -> &WordId {
        &self.word_id
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    #[must_use]
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Number of exercises that drilled the word in the session.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn practiced(&self) -> &BTreeSet<ExerciseType> {
        &self.practiced
    }

    #[must_use]
    pub fn mistakes(&self) -> &BTreeSet<String> {
        &self.mistakes
    }

    /// Mistake tags that name a known exercise type. Free-form tags are skipped.
    pub fn mistake_types(&self) -> impl Iterator<Item = ExerciseType> + '_ {
        self.mistakes
            .iter()
            .filter_map(|tag| tag.parse::<ExerciseType>().ok())
    }

    #[must_use]
    pub fn needs_reinforcement(&self) -> bool {
        self.needs_reinforcement
    }

    #[must_use]
    pub fn reviewed_at(&self) -> DateTime<Utc> {
        self.reviewed_at
    }
}

//
// ─── REVIEW TYPE ───────────────────────────────────────────────────────────────
//

/// Flavor of a review batch, each with a fixed estimated duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewType {
    Daily,
    Weekly,
    Monthly,
    Spaced,
    Intensive,
    Quick,
    Comprehensive,
}

impl ReviewType {
    pub const ALL: [ReviewType; 7] = [
        ReviewType::Daily,
        ReviewType::Weekly,
        ReviewType::Monthly,
        ReviewType::Spaced,
        ReviewType::Intensive,
        ReviewType::Quick,
        ReviewType::Comprehensive,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewType::Daily => "daily",
            ReviewType::Weekly => "weekly",
            ReviewType::Monthly => "monthly",
            ReviewType::Spaced => "spaced",
            ReviewType::Intensive => "intensive",
            ReviewType::Quick => "quick",
            ReviewType::Comprehensive => "comprehensive",
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            ReviewType::Daily => "Daily Review",
            ReviewType::Weekly => "Weekly Review",
            ReviewType::Monthly => "Monthly Review",
            ReviewType::Spaced => "Spaced Repetition",
            ReviewType::Intensive => "Intensive Practice",
            ReviewType::Quick => "Quick Review",
            ReviewType::Comprehensive => "Comprehensive Review",
        }
    }

    #[must_use]
    pub fn default_duration(self) -> Duration {
        let minutes = match self {
            ReviewType::Quick => 5,
            ReviewType::Daily => 10,
            ReviewType::Spaced => 15,
            ReviewType::Weekly => 20,
            ReviewType::Monthly | ReviewType::Intensive => 30,
            ReviewType::Comprehensive => 45,
        };
        Duration::from_secs(minutes * 60)
    }
}

impl fmt::Display for ReviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {raw}")]
pub struct UnknownTag {
    pub kind: &'static str,
    pub raw: String,
}

impl FromStr for ReviewType {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReviewType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownTag {
                kind: "review type",
                raw: s.to_owned(),
            })
    }
}

//
// ─── PRIORITY ──────────────────────────────────────────────────────────────────
//

/// Urgency of a schedule entry. `High` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(UnknownTag {
                kind: "priority",
                raw: s.to_owned(),
            }),
        }
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
        WordId::new("nasilsin").unwrap()
    }

    #[test]
    fn accuracy_must_be_a_ratio() {
        assert_eq!(
            ReviewResult::new(word(), 1.5, fixed_now()).unwrap_err(),
            ReviewResultError::InvalidAccuracy(1.5)
        );
        assert!(ReviewResult::new(word(), f64::NAN, fixed_now()).is_err());
        assert!(ReviewResult::new(word(), 0.0, fixed_now()).is_ok());
    }

    #[test]
    fn mistakes_are_a_trimmed_set() {
        let result = ReviewResult::new(word(), 0.5, fixed_now())
            .unwrap()
            .with_mistakes(["listening", " listening ", "quiz"])
            .unwrap();
        assert_eq!(result.mistakes().len(), 2);
        let types: Vec<_> = result.mistake_types().collect();
        assert_eq!(types, vec![ExerciseType::Listening, ExerciseType::Quiz]);
    }

    #[test]
    fn free_form_mistake_tags_are_kept_but_not_typed() {
        let result = ReviewResult::new(word(), 0.5, fixed_now())
            .unwrap()
            .with_mistakes(["pronunciation"])
            .unwrap();
        assert!(result.mistakes().contains("pronunciation"));
        assert_eq!(result.mistake_types().count(), 0);
    }

    #[test]
    fn blank_mistake_is_rejected() {
        let err = ReviewResult::new(word(), 0.5, fixed_now())
            .unwrap()
            .with_mistakes([" "])
            .unwrap_err();
        assert_eq!(err, ReviewResultError::EmptyMistake);
    }

    #[test]
    fn review_type_durations() {
        assert_eq!(ReviewType::Quick.default_duration(), Duration::from_secs(300));
        assert_eq!(
            ReviewType::Comprehensive.default_duration(),
            Duration::from_secs(45 * 60)
        );
        assert_eq!(ReviewType::Spaced.to_string(), "Spaced Repetition");
        assert_eq!("weekly".parse::<ReviewType>().unwrap(), ReviewType::Weekly);
    }

    #[test]
    fn high_priority_sorts_greatest() {
        assert!(Priority::High > Priority::Medium);
        assert_eq!(
            [Priority::Low, Priority::High, Priority::Medium]
                .into_iter()
                .max(),
            Some(Priority::High)
        );
    }
}
