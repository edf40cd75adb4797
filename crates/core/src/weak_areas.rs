//! Category-level diagnostics over the mastery snapshot.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{CategoryId, ExerciseType, ReviewResult, Word, WordId, WordMastery};
use crate::settings::SchedulerSettings;

/// A category whose average accuracy sits below the diagnostic threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakArea {
    pub category: CategoryId,
    pub accuracy: f64,
    /// Words in the category with a mastery record.
    pub tracked_words: usize,
    /// Tracked words individually below the threshold.
    pub weak_words: usize,
    /// Exercise types most often missed in the category's low-accuracy results.
    pub recommended_exercise_types: Vec<ExerciseType>,
}

/// Weak categories, weakest first (ties by category id).
///
/// Category accuracy is the mean EWMA over words that have a mastery record;
/// categories with none are skipped.
#[must_use]
pub fn weak_areas(
    words: &[Word],
    masteries: &[WordMastery],
    history: &[ReviewResult],
    settings: &SchedulerSettings,
) -> Vec<WeakArea> {
    let threshold = settings.weak_area_threshold();
    let accuracy: BTreeMap<&WordId, f64> = masteries
        .iter()
        .map(|m| (m.word_id(), m.accuracy_ewma()))
        .collect();

    let mut members: BTreeMap<&CategoryId, BTreeSet<&WordId>> = BTreeMap::new();
    for word in words {
        for category in word.categories() {
            members.entry(category).or_default().insert(word.id());
        }
    }

    let mut areas: Vec<WeakArea> = members
        .into_iter()
        .filter_map(|(category, ids)| {
            let tracked: Vec<f64> = ids
                .iter()
                .filter_map(|id| accuracy.get(*id).copied())
                .collect();
            if tracked.is_empty() {
                return None;
            }
            #[allow(clippy::cast_precision_loss)]
            let mean = tracked.iter().sum::<f64>() / tracked.len() as f64;
            if mean >= threshold {
                return None;
            }
            Some(WeakArea {
                category: category.clone(),
                accuracy: mean,
                tracked_words: tracked.len(),
                weak_words: tracked.iter().filter(|&&a| a < threshold).count(),
                recommended_exercise_types: recommend(
                    &ids,
                    history,
                    threshold,
                    settings.max_recommendations(),
                ),
            })
        })
        .collect();

    areas.sort_by(|a, b| {
        a.accuracy
            .total_cmp(&b.accuracy)
            .then_with(|| a.category.cmp(&b.category))
    });
    areas
}

/// Rank exercise types by how often they were missed in low-accuracy results.
fn recommend(
    words: &BTreeSet<&WordId>,
    history: &[ReviewResult],
    threshold: f64,
    limit: usize,
) -> Vec<ExerciseType> {
    let mut counts: BTreeMap<ExerciseType, usize> = BTreeMap::new();
    for result in history
        .iter()
        .filter(|r| r.accuracy() < threshold && words.contains(r.word_id()))
    {
        for kind in result.mistake_types() {
            *counts.entry(kind).or_default() += 1;
        }
    }
    let mut ranked: Vec<(ExerciseType, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(kind, _)| kind).collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MasteryLevel;
    use crate::time::fixed_now;

    fn word_in(key: &str, category: &str) -> Word {
        Word::new(
            WordId::new(key).unwrap(),
            key,
            vec![CategoryId::new(category).unwrap()],
        )
        .unwrap()
    }

    fn mastery(key: &str, accuracy: f64) -> WordMastery {
        WordMastery::from_persisted(
            WordId::new(key).unwrap(),
            MasteryLevel::Learning,
            accuracy,
            Some(fixed_now()),
            3,
            false,
        )
        .unwrap()
    }

    fn missed(key: &str, accuracy: f64, tags: &[&str]) -> ReviewResult {
        ReviewResult::new(WordId::new(key).unwrap(), accuracy, fixed_now())
            .unwrap()
            .with_mistakes(tags.iter().copied())
            .unwrap()
    }

    #[test]
    fn weak_category_recommends_most_missed_type() {
        let words: Vec<_> = ["w1", "w2", "w3", "w4", "w5"]
            .iter()
            .map(|k| word_in(k, "food"))
            .collect();
        let masteries = vec![
            mastery("w1", 0.3),
            mastery("w2", 0.4),
            mastery("w3", 0.5),
            mastery("w4", 0.7),
            mastery("w5", 0.8),
        ];
        let history = vec![
            missed("w1", 0.25, &["listening", "quiz"]),
            missed("w2", 0.5, &["listening"]),
            missed("w3", 0.0, &["listening", "speaking"]),
            missed("w4", 0.9, &["quiz", "quiz"]),
        ];

        let areas = weak_areas(&words, &masteries, &history, &SchedulerSettings::default());
        assert_eq!(areas.len(), 1);
        let area = &areas[0];
        assert_eq!(area.category.as_str(), "food");
        assert!((area.accuracy - 0.54).abs() < 1e-9);
        assert_eq!(area.weak_words, 3);
        assert_eq!(area.recommended_exercise_types[0], ExerciseType::Listening);
        assert_eq!(area.recommended_exercise_types.len(), 3);
    }

    #[test]
    fn strong_category_is_not_reported() {
        let words = vec![word_in("a", "travel"), word_in("b", "travel")];
        let masteries = vec![mastery("a", 0.9), mastery("b", 0.5)];
        let areas = weak_areas(&words, &masteries, &[], &SchedulerSettings::default());
        assert!(areas.is_empty());
    }

    #[test]
    fn untracked_words_do_not_dilute_the_average() {
        let words = vec![word_in("a", "travel"), word_in("b", "travel")];
        let masteries = vec![mastery("a", 0.2)];
        let areas = weak_areas(&words, &masteries, &[], &SchedulerSettings::default());
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].tracked_words, 1);
        assert!(areas[0].recommended_exercise_types.is_empty());
    }

    #[test]
    fn weakest_category_comes_first() {
        let words = vec![word_in("a", "travel"), word_in("b", "food")];
        let masteries = vec![mastery("a", 0.5), mastery("b", 0.1)];
        let areas = weak_areas(&words, &masteries, &[], &SchedulerSettings::default());
        let order: Vec<_> = areas.iter().map(|a| a.category.as_str()).collect();
        assert_eq!(order, vec!["food", "travel"]);
    }
}
