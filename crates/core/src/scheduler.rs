use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::model::{
    CategoryId, MasteryLevel, Priority, ReviewResult, ReviewType, Word, WordId, WordMastery,
};
use crate::settings::SchedulerSettings;
use crate::time::{add_days, duration_to_days};

//
// ─── SCHEDULE TYPES ────────────────────────────────────────────────────────────
//

/// When one word is due and how urgent it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub word_id: WordId,
    pub level: MasteryLevel,
    pub accuracy: f64,
    pub due_at: DateTime<Utc>,
    pub interval_days: f64,
    /// Days past due; zero when not yet due.
    pub overdue_days: f64,
    pub review_type: ReviewType,
    pub priority: Priority,
    pub estimated_duration: Duration,
}

impl ScheduleEntry {
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }

    /// Overdue amount measured in intervals.
    #[must_use]
    pub fn severity(&self) -> f64 {
        if self.interval_days > 0.0 {
            self.overdue_days / self.interval_days
        } else {
            0.0
        }
    }
}

/// Group of due words to review together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewBatch {
    pub id: String,
    pub words: Vec<WordId>,
    pub scheduled_for: DateTime<Utc>,
    pub review_type: ReviewType,
    pub estimated_duration: Duration,
    pub priority: Priority,
}

/// Ordered schedule for every tracked word, recomputed from scratch each pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSchedule {
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<ScheduleEntry>,
    /// Due words up to the batch cap. Overflow stays due in `entries`.
    pub batch: Option<ReviewBatch>,
}

impl ReviewSchedule {
    pub fn due(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.entries
            .iter()
            .filter(move |e| e.is_due(self.generated_at))
    }

    #[must_use]
    pub fn entry(&self, word_id: &WordId) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|e| &e.word_id == word_id)
    }
}

/// Schedule plus the data-quality recoveries made while computing it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleReport {
    pub schedule: ReviewSchedule,
    /// Words whose last review lies after `now`; treated as reviewed at `now`.
    pub clamped: Vec<WordId>,
}

/// Per-category rollup of a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScheduleEntry {
    pub category: CategoryId,
    pub due_at: DateTime<Utc>,
    pub priority: Priority,
    pub words: usize,
    pub due_words: usize,
}

//
// ─── INTERVALS ─────────────────────────────────────────────────────────────────
//

/// Review interval in days.
///
/// `base(level) * (1 + bonus * min(streak, cap))`, halved (by default) when the
/// latest result needs reinforcement.
#[must_use]
pub fn interval(
    settings: &SchedulerSettings,
    level: MasteryLevel,
    consecutive_correct: u32,
    needs_reinforcement: bool,
) -> f64 {
    let streak = f64::from(consecutive_correct.min(settings.streak_cap()));
    let days = settings.base_interval_days(level) * (1.0 + settings.streak_bonus() * streak);
    if needs_reinforcement {
        days * settings.reinforcement_factor()
    } else {
        days
    }
}

/// Trailing run of results that did not need reinforcement, oldest to newest.
fn consecutive_correct(history: &[&ReviewResult]) -> u32 {
    let run = history
        .iter()
        .rev()
        .take_while(|r| !r.needs_reinforcement())
        .count();
    u32::try_from(run).unwrap_or(u32::MAX)
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    settings: SchedulerSettings,
}

impl Scheduler {
    #[must_use]
    pub fn new(settings: SchedulerSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Compute the full schedule for a snapshot of masteries and history.
    ///
    /// Words without review history are due at `now`. A record reviewed after
    /// `now` is clamped to `now` and reported in `ScheduleReport::clamped`.
    /// Output is deterministic for identical inputs.
    #[must_use]
    pub fn compute_schedule(
        &self,
        masteries: &[WordMastery],
        history: &[ReviewResult],
        now: DateTime<Utc>,
    ) -> ScheduleReport {
        let mut by_word: BTreeMap<&WordId, Vec<&ReviewResult>> = BTreeMap::new();
        for result in history {
            by_word.entry(result.word_id()).or_default().push(result);
        }
        for results in by_word.values_mut() {
            results.sort_by_key(|r| r.reviewed_at());
        }

        let mut clamped = Vec::new();
        let mut entries: Vec<ScheduleEntry> = masteries
            .iter()
            .map(|mastery| {
                let results = by_word
                    .get(mastery.word_id())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let latest_needs_help = results.last().is_some_and(|r| r.needs_reinforcement());
                let interval_days = interval(
                    &self.settings,
                    mastery.level(),
                    consecutive_correct(results),
                    latest_needs_help,
                );

                let due_at = match mastery.last_reviewed_at() {
                    Some(_) if mastery.is_new() => now,
                    None => now,
                    Some(last) if last > now => {
                        clamped.push(mastery.word_id().clone());
                        add_days(now, interval_days)
                    }
                    Some(last) => add_days(last, interval_days),
                };
                self.entry(mastery, interval_days, due_at, now)
            })
            .collect();

        entries.sort_by(|a, b| compare_entries(a, b, now));

        let batch = self.batch(&mut entries, now);
        ScheduleReport {
            schedule: ReviewSchedule {
                generated_at: now,
                entries,
                batch,
            },
            clamped,
        }
    }

    fn entry(
        &self,
        mastery: &WordMastery,
        interval_days: f64,
        due_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ScheduleEntry {
        let overdue_days = duration_to_days(now - due_at).max(0.0);
        let accuracy = mastery.accuracy_ewma();
        let severity = if interval_days > 0.0 {
            overdue_days / interval_days
        } else {
            0.0
        };
        let priority = if due_at > now {
            Priority::Low
        } else if severity >= self.settings.high_priority_severity()
            || accuracy < self.settings.weak_area_threshold()
        {
            Priority::High
        } else {
            Priority::Medium
        };
        let review_type = cadence(interval_days);
        ScheduleEntry {
            word_id: mastery.word_id().clone(),
            level: mastery.level(),
            accuracy,
            due_at,
            interval_days,
            overdue_days,
            review_type,
            priority,
            estimated_duration: review_type.default_duration(),
        }
    }

    /// Pick the leading due entries into a batch and retag them with its type.
    fn batch(&self, entries: &mut [ScheduleEntry], now: DateTime<Utc>) -> Option<ReviewBatch> {
        let due = entries
            .iter()
            .take(self.settings.batch_cap())
            .take_while(|e| e.is_due(now))
            .count();
        if due == 0 {
            return None;
        }
        let members = &mut entries[..due];
        let review_type = self.batch_type(members);
        for entry in members.iter_mut() {
            entry.review_type = review_type;
            entry.estimated_duration = review_type.default_duration();
        }
        let priority = members
            .iter()
            .map(|e| e.priority)
            .max()
            .unwrap_or(Priority::Medium);
        Some(ReviewBatch {
            id: format!("{}-{}", review_type.as_str(), now.format("%Y%m%dT%H%M%SZ")),
            words: members.iter().map(|e| e.word_id.clone()).collect(),
            scheduled_for: now,
            review_type,
            estimated_duration: review_type.default_duration(),
            priority,
        })
    }

    fn batch_type(&self, members: &[ScheduleEntry]) -> ReviewType {
        let n = members.len();
        #[allow(clippy::cast_precision_loss)]
        let severity = members.iter().map(ScheduleEntry::severity).sum::<f64>() / n.max(1) as f64;
        let s = &self.settings;

        if n >= s.intensive_min_batch() && severity >= s.intensive_min_severity() {
            return ReviewType::Intensive;
        }
        if n <= s.quick_max_batch() && severity < s.quick_max_severity() {
            return ReviewType::Quick;
        }
        if n >= s.batch_cap() {
            return ReviewType::Comprehensive;
        }
        let count = |level| members.iter().filter(|e| e.level == level).count();
        if count(MasteryLevel::Learning) * 2 > n {
            ReviewType::Daily
        } else if count(MasteryLevel::Practicing) * 2 > n {
            ReviewType::Weekly
        } else if count(MasteryLevel::Mastered) * 2 > n {
            ReviewType::Monthly
        } else {
            ReviewType::Spaced
        }
    }
}

/// Review cadence implied by an interval, for words outside the batch.
fn cadence(interval_days: f64) -> ReviewType {
    if interval_days <= 1.0 {
        ReviewType::Daily
    } else if interval_days <= 7.0 {
        ReviewType::Weekly
    } else {
        ReviewType::Monthly
    }
}

/// Most overdue first, then weaker accuracy, then lower level, then word id.
fn compare_entries(a: &ScheduleEntry, b: &ScheduleEntry, now: DateTime<Utc>) -> Ordering {
    (now - b.due_at)
        .cmp(&(now - a.due_at))
        .then_with(|| a.accuracy.total_cmp(&b.accuracy))
        .then_with(|| a.level.cmp(&b.level))
        .then_with(|| a.word_id.cmp(&b.word_id))
}

/// Roll a schedule up by word category: earliest due time and worst priority.
///
/// Scheduled words missing from `words` are skipped. Sorted by priority
/// (highest first), then due time, then category id.
#[must_use]
pub fn category_schedule(schedule: &ReviewSchedule, words: &[Word]) -> Vec<CategoryScheduleEntry> {
    let by_id: BTreeMap<&WordId, &Word> = words.iter().map(|w| (w.id(), w)).collect();
    let mut rollup: BTreeMap<&CategoryId, CategoryScheduleEntry> = BTreeMap::new();

    for entry in &schedule.entries {
        let Some(word) = by_id.get(&entry.word_id) else {
            continue;
        };
        let due = usize::from(entry.is_due(schedule.generated_at));
        for category in word.categories() {
            rollup
                .entry(category)
                .and_modify(|c| {
                    c.due_at = c.due_at.min(entry.due_at);
                    c.priority = c.priority.max(entry.priority);
                    c.words += 1;
                    c.due_words += due;
                })
                .or_insert_with(|| CategoryScheduleEntry {
                    category: category.clone(),
                    due_at: entry.due_at,
                    priority: entry.priority,
                    words: 1,
                    due_words: due,
                });
        }
    }

    let mut out: Vec<_> = rollup.into_values().collect();
    out.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.due_at.cmp(&b.due_at))
            .then_with(|| a.category.cmp(&b.category))
    });
    out
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration as ChronoDuration;
    use proptest::prelude::*;

    fn word(key: &str) -> WordId {
        WordId::new(key).unwrap()
    }

    fn mastery(key: &str, level: MasteryLevel, accuracy: f64, days_ago: i64) -> WordMastery {
        WordMastery::from_persisted(
            word(key),
            level,
            accuracy,
            Some(fixed_now() - ChronoDuration::days(days_ago)),
            5,
            false,
        )
        .unwrap()
    }

    fn result(key: &str, days_ago: i64, reinforce: bool) -> ReviewResult {
        ReviewResult::new(word(key), 0.8, fixed_now() - ChronoDuration::days(days_ago))
            .unwrap()
            .with_reinforcement(reinforce)
    }

    #[test]
    fn interval_scales_with_streak_up_to_cap() {
        let s = SchedulerSettings::default();
        assert!((interval(&s, MasteryLevel::Learning, 0, false) - 1.0).abs() < 1e-9);
        assert!((interval(&s, MasteryLevel::Practicing, 2, false) - 8.0).abs() < 1e-9);
        assert!((interval(&s, MasteryLevel::Mastered, 4, false) - 42.0).abs() < 1e-9);
        assert!((interval(&s, MasteryLevel::Mastered, 9, false) - 42.0).abs() < 1e-9);
    }

    #[test]
    fn reinforcement_halves_practicing_interval() {
        let scheduler = Scheduler::default();
        let m = mastery("w", MasteryLevel::Practicing, 0.8, 0);
        let history = vec![result("w", 0, true)];
        let report = scheduler.compute_schedule(&[m], &history, fixed_now());
        let entry = &report.schedule.entries[0];
        assert!((entry.interval_days - 2.0).abs() < 1e-9);
        assert_eq!(entry.due_at, fixed_now() + ChronoDuration::days(2));
    }

    #[test]
    fn unseen_word_is_due_now_as_learning() {
        let scheduler = Scheduler::default();
        let fresh = WordMastery::new(word("yeni"), 0.5);
        let report = scheduler.compute_schedule(&[fresh], &[], fixed_now());
        let entry = &report.schedule.entries[0];
        assert_eq!(entry.due_at, fixed_now());
        assert_eq!(entry.level, MasteryLevel::Learning);
        assert!(report.schedule.batch.is_some());
    }

    #[test]
    fn future_review_is_clamped_and_reported() {
        let scheduler = Scheduler::default();
        let m = mastery("w", MasteryLevel::Learning, 0.8, -3);
        let report = scheduler.compute_schedule(&[m], &[], fixed_now());
        assert_eq!(report.clamped, vec![word("w")]);
        assert_eq!(
            report.schedule.entries[0].due_at,
            fixed_now() + ChronoDuration::days(1)
        );
    }

    #[test]
    fn streak_counts_trailing_results_only() {
        let scheduler = Scheduler::default();
        let m = mastery("w", MasteryLevel::Learning, 0.8, 0);
        let history = vec![
            result("w", 1, false),
            result("w", 3, true),
            result("w", 2, false),
        ];
        let report = scheduler.compute_schedule(&[m], &history, fixed_now());
        // Sorted by time: reinforce(3d), ok(2d), ok(1d) -> streak of 2.
        assert!((report.schedule.entries[0].interval_days - 2.0).abs() < 1e-9);
    }

    #[test]
    fn ordering_prefers_overdue_then_accuracy_then_level_then_id() {
        let scheduler = Scheduler::default();
        let masteries = vec![
            mastery("c", MasteryLevel::Learning, 0.9, 2),
            mastery("a", MasteryLevel::Learning, 0.9, 5),
            mastery("b", MasteryLevel::Learning, 0.4, 2),
            mastery("d", MasteryLevel::Practicing, 0.9, 5),
        ];
        let report = scheduler.compute_schedule(&masteries, &[], fixed_now());
        let order: Vec<_> = report
            .schedule
            .entries
            .iter()
            .map(|e| e.word_id.as_str().to_owned())
            .collect();
        // a: 4d overdue; b and c: 1d overdue, b weaker; d not due until day 4 after review -> 1d overdue, higher level.
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn batch_respects_cap_and_overflow_stays_due() {
        let settings = SchedulerSettings::default().with_batch_cap(3).unwrap();
        let scheduler = Scheduler::new(settings);
        let masteries: Vec<_> = (0..5)
            .map(|i| mastery(&format!("w{i}"), MasteryLevel::Learning, 0.8, 3))
            .collect();
        let report = scheduler.compute_schedule(&masteries, &[], fixed_now());
        let batch = report.schedule.batch.as_ref().unwrap();
        assert_eq!(batch.words.len(), 3);
        assert_eq!(report.schedule.due().count(), 5);
    }

    #[test]
    fn small_fresh_batch_is_quick() {
        let scheduler = Scheduler::default();
        let masteries = vec![
            WordMastery::new(word("a"), 0.5),
            WordMastery::new(word("b"), 0.5),
        ];
        let report = scheduler.compute_schedule(&masteries, &[], fixed_now());
        let batch = report.schedule.batch.unwrap();
        assert_eq!(batch.review_type, ReviewType::Quick);
        assert_eq!(batch.estimated_duration, ReviewType::Quick.default_duration());
        // 0.5 < 0.6 weak threshold and due -> high priority.
        assert_eq!(batch.priority, Priority::High);
    }

    #[test]
    fn large_overdue_batch_is_intensive() {
        let scheduler = Scheduler::default();
        let masteries: Vec<_> = (0..12)
            .map(|i| mastery(&format!("w{i:02}"), MasteryLevel::Learning, 0.8, 10))
            .collect();
        let report = scheduler.compute_schedule(&masteries, &[], fixed_now());
        assert_eq!(
            report.schedule.batch.unwrap().review_type,
            ReviewType::Intensive
        );
    }

    #[test]
    fn nothing_due_means_no_batch() {
        let scheduler = Scheduler::default();
        let m = mastery("w", MasteryLevel::Mastered, 0.95, 1);
        let report = scheduler.compute_schedule(&[m], &[], fixed_now());
        assert!(report.schedule.batch.is_none());
        assert_eq!(report.schedule.entries[0].priority, Priority::Low);
        assert_eq!(report.schedule.entries[0].review_type, ReviewType::Monthly);
    }

    #[test]
    fn category_rollup_takes_earliest_due_and_worst_priority() {
        let scheduler = Scheduler::default();
        let masteries = vec![
            mastery("a", MasteryLevel::Mastered, 0.95, 1),
            mastery("b", MasteryLevel::Learning, 0.4, 3),
        ];
        let report = scheduler.compute_schedule(&masteries, &[], fixed_now());
        let greetings = CategoryId::new("greetings").unwrap();
        let words = vec![
            Word::new(word("a"), "a", vec![greetings.clone()]).unwrap(),
            Word::new(word("b"), "b", vec![greetings.clone()]).unwrap(),
        ];
        let rollup = category_schedule(&report.schedule, &words);
        assert_eq!(rollup.len(), 1);
        assert_eq!(rollup[0].category, greetings);
        assert_eq!(rollup[0].priority, Priority::High);
        assert_eq!(rollup[0].due_at, fixed_now() - ChronoDuration::days(2));
        assert_eq!(rollup[0].words, 2);
        assert_eq!(rollup[0].due_words, 1);
    }

    #[test]
    fn largest_valid_intervals_saturate_instead_of_overflowing() {
        let settings: SchedulerSettings = serde_json::from_str(
            r#"{"mastered_interval_days": 36500, "streak_bonus": 10, "streak_cap": 4294967295}"#,
        )
        .unwrap();
        settings.validate().unwrap();
        let scheduler = Scheduler::new(settings);
        let m = mastery("w", MasteryLevel::Mastered, 0.95, 1);
        // A 300-review streak pushes the interval past the calendar's end.
        let history: Vec<_> = (1..=300).map(|d| result("w", d, false)).collect();
        let report = scheduler.compute_schedule(&[m], &history, fixed_now());
        let entry = &report.schedule.entries[0];
        assert_eq!(entry.due_at, DateTime::<Utc>::MAX_UTC);
        assert_eq!(entry.priority, Priority::Low);
        assert!(report.schedule.batch.is_none());
    }

    fn arb_mastery() -> impl Strategy<Value = WordMastery> {
        (0u32..40, 0usize..3, 0.0f64..=1.0, -2i64..30).prop_map(|(id, lvl, acc, days)| {
            mastery(&format!("w{id}"), MasteryLevel::ALL[lvl], acc, days)
        })
    }

    fn arb_result() -> impl Strategy<Value = ReviewResult> {
        (0u32..40, 0.0f64..=1.0, -2i64..30, any::<bool>()).prop_map(
            |(id, acc, days, reinforce)| {
                ReviewResult::new(
                    word(&format!("w{id}")),
                    acc,
                    fixed_now() - ChronoDuration::days(days),
                )
                .unwrap()
                .with_reinforcement(reinforce)
            },
        )
    }

    proptest! {
        #[test]
        fn schedule_is_deterministic(
            masteries in proptest::collection::vec(arb_mastery(), 0..25),
            history in proptest::collection::vec(arb_result(), 0..60),
        ) {
            let scheduler = Scheduler::default();
            let a = scheduler.compute_schedule(&masteries, &history, fixed_now());
            let b = scheduler.compute_schedule(&masteries, &history, fixed_now());
            prop_assert_eq!(a, b);
        }

        #[test]
        fn earlier_due_is_never_after_later_due(
            masteries in proptest::collection::vec(arb_mastery(), 0..25),
            history in proptest::collection::vec(arb_result(), 0..60),
        ) {
            let now = fixed_now();
            let report = Scheduler::default().compute_schedule(&masteries, &history, now);
            let entries = &report.schedule.entries;
            for (i, a) in entries.iter().enumerate() {
                for b in &entries[i + 1..] {
                    // b comes after a, so b must not be strictly more overdue.
                    prop_assert!(!(b.due_at < a.due_at && a.due_at <= now));
                }
            }
        }
    }
}
