//! Word mastery updates from session results.
//!
//! Accuracy is tracked as an exponentially weighted moving average. Levels move
//! at most one step per update: promotion needs enough reviews and a high
//! enough EWMA, demotion needs the EWMA under the floor on two consecutive
//! updates.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::model::{MasteryLevel, ReviewResult, WordId, WordMastery};
use crate::settings::MasterySettings;

/// A level transition caused by one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelChange {
    Promoted {
        from: MasteryLevel,
        to: MasteryLevel,
    },
    Demoted {
        from: MasteryLevel,
        to: MasteryLevel,
    },
}

/// Updated record for one word, plus what changed.
#[derive(Debug, Clone, PartialEq)]
pub struct MasteryUpdate {
    pub mastery: WordMastery,
    pub previous_accuracy: f64,
    pub change: Option<LevelChange>,
    /// The word had no record before this update.
    pub created: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MasteryPolicy {
    settings: MasterySettings,
}

impl MasteryPolicy {
    #[must_use]
    pub fn new(settings: MasterySettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &MasterySettings {
        &self.settings
    }

    /// Fresh record for a word seen for the first time.
    #[must_use]
    pub fn fresh(&self, word_id: WordId) -> WordMastery {
        WordMastery::new(word_id, self.settings.initial_accuracy())
    }

    /// Apply one observation (`correct` in `[0, 1]`) to `mastery`.
    #[must_use]
    pub fn update(&self, mut mastery: WordMastery, correct: f64, now: DateTime<Utc>) -> MasteryUpdate {
        let alpha = self.settings.alpha();
        let previous_accuracy = mastery.accuracy_ewma();
        let created = mastery.is_new();
        let correct = if correct.is_finite() {
            correct.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let ewma = (alpha * correct + (1.0 - alpha) * previous_accuracy).clamp(0.0, 1.0);
        let review_count = mastery.review_count().saturating_add(1);
        let from = mastery.level();

        let (level, below_floor) = if ewma < self.settings.demotion_floor() {
            match (mastery.below_floor(), from.demoted()) {
                (true, Some(lower)) => (lower, false),
                _ => (from, true),
            }
        } else {
            let promote = self
                .settings
                .promotion_gate(from)
                .filter(|&(min_reviews, min_accuracy)| {
                    review_count >= min_reviews && ewma >= min_accuracy
                })
                .and_then(|_| from.promoted());
            (promote.unwrap_or(from), false)
        };

        let change = match level.cmp(&from) {
            std::cmp::Ordering::Greater => Some(LevelChange::Promoted { from, to: level }),
            std::cmp::Ordering::Less => Some(LevelChange::Demoted { from, to: level }),
            std::cmp::Ordering::Equal => None,
        };

        mastery.record_review(ewma, level, below_floor, now);
        MasteryUpdate {
            mastery,
            previous_accuracy,
            change,
            created,
        }
    }

    /// Fold a batch of results into the current records.
    ///
    /// Each touched word gets exactly one update; several results for the same
    /// word are averaged first. Words without a record start fresh. Output is
    /// ordered by word id.
    #[must_use]
    pub fn apply_results(
        &self,
        existing: &[WordMastery],
        results: &[ReviewResult],
        now: DateTime<Utc>,
    ) -> Vec<MasteryUpdate> {
        let mut observed: BTreeMap<&WordId, (f64, u32)> = BTreeMap::new();
        for result in results {
            let slot = observed.entry(result.word_id()).or_insert((0.0, 0));
            slot.0 += result.accuracy();
            slot.1 += 1;
        }

        let current: BTreeMap<&WordId, &WordMastery> =
            existing.iter().map(|m| (m.word_id(), m)).collect();

        observed
            .into_iter()
            .map(|(word_id, (sum, count))| {
                let mastery = current
                    .get(word_id)
                    .map_or_else(|| self.fresh(word_id.clone()), |m| (*m).clone());
                self.update(mastery, sum / f64::from(count), now)
            })
            .collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
