//! Read-only rollups over review history and the mastery snapshot.
//!
//! Days are UTC calendar days.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::model::{MasteryLevel, ReviewResult, SkillCategory, Word, WordId, WordMastery};
use crate::settings::SchedulerSettings;
use crate::time::utc_day;
use crate::weak_areas::{WeakArea, weak_areas};

//
// ─── TRENDS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    /// Mean result accuracy of the day.
    Accuracy,
    /// Distinct words reviewed that day.
    WordsReviewed,
    /// Words reviewed for the first time ever that day.
    WordsLearned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub day: NaiveDate,
    pub value: f64,
    /// Results that contributed; zero means no activity that day.
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub metric: TrendMetric,
    pub points: Vec<TrendPoint>,
}

/// Longest trend window, in days.
pub const MAX_TREND_DAYS: u32 = 366;

/// One point per day for the `days` days ending on `now`'s day, per metric.
///
/// `days` is capped at [`MAX_TREND_DAYS`]. The window stops early at the
/// earliest representable date.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn daily_trends(history: &[ReviewResult], now: DateTime<Utc>, days: u32) -> Vec<TrendSeries> {
    let today = utc_day(now);
    let mut window: Vec<NaiveDate> = (0..u64::from(days.min(MAX_TREND_DAYS)))
        .map_while(|back| today.checked_sub_days(Days::new(back)))
        .collect();
    window.reverse();

    let mut per_day: BTreeMap<NaiveDate, Vec<&ReviewResult>> = BTreeMap::new();
    for result in history {
        per_day
            .entry(utc_day(result.reviewed_at()))
            .or_default()
            .push(result);
    }
    let first_seen = first_review_days(history);
    let mut learned: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for day in first_seen.values() {
        *learned.entry(*day).or_default() += 1;
    }

    let empty = Vec::new();
    let mut accuracy = Vec::with_capacity(window.len());
    let mut reviewed = Vec::with_capacity(window.len());
    let mut newly_learned = Vec::with_capacity(window.len());
    for day in window {
        let results = per_day.get(&day).unwrap_or(&empty);
        let samples = results.len();
        let mean = if samples == 0 {
            0.0
        } else {
            results.iter().map(|r| r.accuracy()).sum::<f64>() / samples as f64
        };
        let distinct: BTreeSet<&WordId> = results.iter().map(|r| r.word_id()).collect();
        let learned_today = learned.get(&day).copied().unwrap_or(0);

        accuracy.push(TrendPoint {
            day,
            value: mean,
            samples,
        });
        reviewed.push(TrendPoint {
            day,
            value: distinct.len() as f64,
            samples,
        });
        newly_learned.push(TrendPoint {
            day,
            value: learned_today as f64,
            samples,
        });
    }

    vec![
        TrendSeries {
            metric: TrendMetric::Accuracy,
            points: accuracy,
        },
        TrendSeries {
            metric: TrendMetric::WordsReviewed,
            points: reviewed,
        },
        TrendSeries {
            metric: TrendMetric::WordsLearned,
            points: newly_learned,
        },
    ]
}

fn first_review_days(history: &[ReviewResult]) -> BTreeMap<&WordId, NaiveDate> {
    let mut first: BTreeMap<&WordId, NaiveDate> = BTreeMap::new();
    for result in history {
        let day = utc_day(result.reviewed_at());
        first
            .entry(result.word_id())
            .and_modify(|d| *d = (*d).min(day))
            .or_insert(day);
    }
    first
}

//
// ─── MASTERY BREAKDOWN ─────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasteryBreakdown {
    pub learning: usize,
    pub practicing: usize,
    pub mastered: usize,
}

impl MasteryBreakdown {
    #[must_use]
    pub fn total(&self) -> usize {
        self.learning + self.practicing + self.mastered
    }
}

#[must_use]
pub fn mastery_breakdown(masteries: &[WordMastery]) -> MasteryBreakdown {
    masteries
        .iter()
        .fold(MasteryBreakdown::default(), |mut acc, m| {
            match m.level() {
                MasteryLevel::Learning => acc.learning += 1,
                MasteryLevel::Practicing => acc.practicing += 1,
                MasteryLevel::Mastered => acc.mastered += 1,
            }
            acc
        })
}

//
// ─── DAILY PROGRESS ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProgress {
    pub day: NaiveDate,
    pub words_learned: usize,
    pub exercises_completed: u32,
    pub time_spent: Duration,
    pub streak_days: u32,
}

/// Consecutive active days ending today.
///
/// A streak stays alive through today until the day is over: with no activity
/// yet today, counting starts from yesterday.
#[must_use]
pub fn streak_days(history: &[ReviewResult], now: DateTime<Utc>) -> u32 {
    let active: BTreeSet<NaiveDate> = history.iter().map(|r| utc_day(r.reviewed_at())).collect();
    let today = utc_day(now);
    let mut day = if active.contains(&today) {
        Some(today)
    } else {
        today.pred_opt()
    };
    let mut streak = 0_u32;
    while let Some(d) = day.filter(|d| active.contains(d)) {
        streak += 1;
        day = d.pred_opt();
    }
    streak
}

#[must_use]
pub fn daily_progress(history: &[ReviewResult], now: DateTime<Utc>) -> DailyProgress {
    let today = utc_day(now);
    let todays: Vec<&ReviewResult> = history
        .iter()
        .filter(|r| utc_day(r.reviewed_at()) == today)
        .collect();
    DailyProgress {
        day: today,
        words_learned: first_review_days(history)
            .values()
            .filter(|d| **d == today)
            .count(),
        exercises_completed: todays.iter().map(|r| r.attempts()).sum(),
        time_spent: todays.iter().map(|r| r.latency()).sum(),
        streak_days: streak_days(history, now),
    }
}

//
// ─── SKILLS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillAccuracy {
    pub skill: SkillCategory,
    pub attempts: usize,
    pub correct: usize,
    pub accuracy: f64,
}

/// Accuracy per language skill.
///
/// Each exercise type practiced in a result counts once; it is correct when the
/// type is absent from the result's mistakes. Skills never practiced report zero
/// attempts.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn skill_accuracy(history: &[ReviewResult]) -> Vec<SkillAccuracy> {
    let mut tally: BTreeMap<SkillCategory, (usize, usize)> = BTreeMap::new();
    for result in history {
        let missed: BTreeSet<_> = result.mistake_types().collect();
        for kind in result.practiced() {
            let slot = tally.entry(kind.skill()).or_default();
            slot.0 += 1;
            if !missed.contains(kind) {
                slot.1 += 1;
            }
        }
    }
    SkillCategory::ALL
        .into_iter()
        .map(|skill| {
            let (attempts, correct) = tally.get(&skill).copied().unwrap_or_default();
            SkillAccuracy {
                skill,
                attempts,
                correct,
                accuracy: if attempts == 0 {
                    0.0
                } else {
                    correct as f64 / attempts as f64
                },
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSpeed {
    pub skill: SkillCategory,
    pub samples: usize,
    pub mean_time: Duration,
}

/// Mean time spent per exercise, by language skill.
///
/// A result's latency is split evenly across the exercise types it practiced.
/// Results without practiced types are skipped.
#[must_use]
pub fn skill_speed(history: &[ReviewResult]) -> Vec<SkillSpeed> {
    let mut tally: BTreeMap<SkillCategory, (usize, Duration)> = BTreeMap::new();
    for result in history {
        let Ok(kinds) = u32::try_from(result.practiced().len()) else {
            continue;
        };
        if kinds == 0 {
            continue;
        }
        let share = result.latency() / kinds;
        for kind in result.practiced() {
            let slot = tally.entry(kind.skill()).or_default();
            slot.0 += 1;
            slot.1 = slot.1.saturating_add(share);
        }
    }
    SkillCategory::ALL
        .into_iter()
        .map(|skill| {
            let (samples, total) = tally.get(&skill).copied().unwrap_or_default();
            let mean_time = u32::try_from(samples)
                .ok()
                .filter(|n| *n > 0)
                .map_or(Duration::ZERO, |n| total / n);
            SkillSpeed {
                skill,
                samples,
                mean_time,
            }
        })
        .collect()
}

//
// ─── RETENTION ─────────────────────────────────────────────────────────────────
//

/// Upper bound (inclusive) of the short-term retention bucket, in days.
pub const SHORT_TERM_DAYS: i64 = 7;
/// Upper bound (inclusive) of the medium-term retention bucket, in days.
pub const MEDIUM_TERM_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionBucket {
    pub words: usize,
    /// Words whose smoothed accuracy is at or above the weak-area threshold.
    pub retained: usize,
    pub rate: f64,
}

impl RetentionBucket {
    #[allow(clippy::cast_precision_loss)]
    fn push(&mut self, retained: bool) {
        self.words += 1;
        self.retained += usize::from(retained);
        self.rate = self.retained as f64 / self.words as f64;
    }
}

/// Share of reviewed words still held, bucketed by time since their last review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WordRetention {
    /// Last reviewed at most [`SHORT_TERM_DAYS`] ago.
    pub short_term: RetentionBucket,
    /// Last reviewed at most [`MEDIUM_TERM_DAYS`] ago.
    pub medium_term: RetentionBucket,
    pub long_term: RetentionBucket,
}

/// Words never reviewed are not counted. Reviews after `now` count as short term.
#[must_use]
pub fn word_retention(
    masteries: &[WordMastery],
    settings: &SchedulerSettings,
    now: DateTime<Utc>,
) -> WordRetention {
    let mut retention = WordRetention::default();
    for mastery in masteries {
        let Some(last) = mastery.last_reviewed_at().filter(|_| !mastery.is_new()) else {
            continue;
        };
        let age = (now - last).num_days();
        let bucket = if age <= SHORT_TERM_DAYS {
            &mut retention.short_term
        } else if age <= MEDIUM_TERM_DAYS {
            &mut retention.medium_term
        } else {
            &mut retention.long_term
        };
        bucket.push(mastery.accuracy_ewma() >= settings.weak_area_threshold());
    }
    retention
}

//
// ─── REPORT ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub trends: Vec<TrendSeries>,
    pub weak_areas: Vec<WeakArea>,
    pub mastery_breakdown: MasteryBreakdown,
    pub daily_progress: DailyProgress,
    pub skill_accuracy: Vec<SkillAccuracy>,
    pub skill_speed: Vec<SkillSpeed>,
    pub word_retention: WordRetention,
}

/// Everything the analytics screen shows, from one consistent snapshot.
#[must_use]
pub fn build_report(
    words: &[Word],
    masteries: &[WordMastery],
    history: &[ReviewResult],
    settings: &SchedulerSettings,
    now: DateTime<Utc>,
    trend_days: u32,
) -> AnalyticsReport {
    AnalyticsReport {
        generated_at: now,
        trends: daily_trends(history, now, trend_days),
        weak_areas: weak_areas(words, masteries, history, settings),
        mastery_breakdown: mastery_breakdown(masteries),
        daily_progress: daily_progress(history, now),
        skill_accuracy: skill_accuracy(history),
        skill_speed: skill_speed(history),
        word_retention: word_retention(masteries, settings, now),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExerciseType;
    use crate::time::fixed_now;
    use chrono::Duration as ChronoDuration;

    fn at(key: &str, accuracy: f64, days_ago: i64) -> ReviewResult {
        ReviewResult::new(
            WordId::new(key).unwrap(),
            accuracy,
            fixed_now() - ChronoDuration::days(days_ago),
        )
        .unwrap()
    }

    #[test]
    fn trends_cover_the_whole_window() {
        let history = vec![at("a", 1.0, 0), at("b", 0.5, 0), at("a", 0.0, 2)];
        let trends = daily_trends(&history, fixed_now(), 3);
        assert_eq!(trends.len(), 3);

        let accuracy = &trends[0];
        assert_eq!(accuracy.metric, TrendMetric::Accuracy);
        assert_eq!(accuracy.points.len(), 3);
        assert_eq!(accuracy.points[0].value, 0.0);
        assert_eq!(accuracy.points[1].samples, 0);
        assert!((accuracy.points[2].value - 0.75).abs() < 1e-9);

        let learned = &trends[2];
        // "a" was first seen two days ago, "b" today.
        assert_eq!(learned.points[0].value, 1.0);
        assert_eq!(learned.points[2].value, 1.0);
    }

    #[test]
    fn breakdown_counts_levels() {
        let masteries = vec![
            WordMastery::new(WordId::new("a").unwrap(), 0.5),
            WordMastery::from_persisted(
                WordId::new("b").unwrap(),
                MasteryLevel::Mastered,
                0.95,
                Some(fixed_now()),
                10,
                false,
            )
            .unwrap(),
        ];
        let breakdown = mastery_breakdown(&masteries);
        assert_eq!(breakdown.learning, 1);
        assert_eq!(breakdown.mastered, 1);
        assert_eq!(breakdown.total(), 2);
    }

    #[test]
    fn streak_survives_until_day_ends() {
        let history = vec![at("a", 1.0, 1), at("a", 1.0, 2), at("a", 1.0, 4)];
        assert_eq!(streak_days(&history, fixed_now()), 2);
        let with_today = [history.clone(), vec![at("b", 1.0, 0)]].concat();
        assert_eq!(streak_days(&with_today, fixed_now()), 3);
        assert_eq!(streak_days(&[at("a", 1.0, 3)], fixed_now()), 0);
    }

    #[test]
    fn daily_progress_sums_today_only() {
        let history = vec![
            at("a", 1.0, 0)
                .with_attempts(3)
                .with_latency(Duration::from_secs(20)),
            at("b", 1.0, 0)
                .with_attempts(2)
                .with_latency(Duration::from_secs(10)),
            at("b", 1.0, 1).with_attempts(7),
        ];
        let progress = daily_progress(&history, fixed_now());
        assert_eq!(progress.exercises_completed, 5);
        assert_eq!(progress.time_spent, Duration::from_secs(30));
        assert_eq!(progress.words_learned, 1);
        assert_eq!(progress.streak_days, 2);
    }

    #[test]
    fn skill_accuracy_counts_missed_types() {
        let history = vec![
            at("a", 0.5, 0)
                .with_practiced([ExerciseType::Listening, ExerciseType::Quiz])
                .with_mistakes(["listening"])
                .unwrap(),
            at("b", 1.0, 0).with_practiced([ExerciseType::Listening]),
        ];
        let skills = skill_accuracy(&history);
        let listening = skills
            .iter()
            .find(|s| s.skill == SkillCategory::Listening)
            .unwrap();
        assert_eq!(listening.attempts, 2);
        assert_eq!(listening.correct, 1);
        let reading = skills
            .iter()
            .find(|s| s.skill == SkillCategory::Reading)
            .unwrap();
        assert_eq!(reading.attempts, 1);
        assert!((reading.accuracy - 1.0).abs() < 1e-9);
        let speaking = skills
            .iter()
            .find(|s| s.skill == SkillCategory::Speaking)
            .unwrap();
        assert_eq!(speaking.attempts, 0);
    }

    #[test]
    fn trend_window_is_capped() {
        let trends = daily_trends(&[], fixed_now(), 200_000_000);
        assert!(
            trends
                .iter()
                .all(|t| t.points.len() == MAX_TREND_DAYS as usize)
        );
        let last = trends[0].points.last().unwrap();
        assert_eq!(last.day, utc_day(fixed_now()));
    }

    #[test]
    fn trend_window_stops_at_earliest_date() {
        let earliest = NaiveDate::MIN.and_hms_opt(12, 0, 0).unwrap().and_utc();
        let trends = daily_trends(&[], earliest, 30);
        assert_eq!(trends[0].points.len(), 1);
        assert_eq!(trends[0].points[0].day, NaiveDate::MIN);
        assert_eq!(streak_days(&[], earliest), 0);
    }

    #[test]
    fn skill_speed_splits_latency_across_practiced_types() {
        let history = vec![
            at("a", 1.0, 0)
                .with_latency(Duration::from_secs(20))
                .with_practiced([ExerciseType::Listening, ExerciseType::FillInBlanks]),
            at("b", 1.0, 0)
                .with_latency(Duration::from_secs(30))
                .with_practiced([ExerciseType::Listening]),
            at("c", 1.0, 0).with_latency(Duration::from_secs(99)),
        ];
        let speed = skill_speed(&history);
        let find = |skill| speed.iter().find(|s| s.skill == skill).unwrap();
        let listening = find(SkillCategory::Listening);
        assert_eq!(listening.samples, 2);
        assert_eq!(listening.mean_time, Duration::from_secs(20));
        assert_eq!(find(SkillCategory::Writing).mean_time, Duration::from_secs(10));
        let speaking = find(SkillCategory::Speaking);
        assert_eq!(speaking.samples, 0);
        assert_eq!(speaking.mean_time, Duration::ZERO);
    }

    fn reviewed(key: &str, accuracy: f64, days_ago: i64) -> WordMastery {
        WordMastery::from_persisted(
            WordId::new(key).unwrap(),
            MasteryLevel::Practicing,
            accuracy,
            Some(fixed_now() - ChronoDuration::days(days_ago)),
            4,
            false,
        )
        .unwrap()
    }

    #[test]
    fn retention_buckets_by_review_age() {
        let masteries = vec![
            reviewed("a", 0.9, 1),
            reviewed("b", 0.3, 7),
            reviewed("c", 0.8, 20),
            reviewed("d", 0.2, 45),
            WordMastery::new(WordId::new("e").unwrap(), 0.5),
        ];
        let retention = word_retention(&masteries, &SchedulerSettings::default(), fixed_now());
        assert_eq!(retention.short_term.words, 2);
        assert_eq!(retention.short_term.retained, 1);
        assert!((retention.short_term.rate - 0.5).abs() < 1e-9);
        assert_eq!(retention.medium_term.words, 1);
        assert!((retention.medium_term.rate - 1.0).abs() < 1e-9);
        assert_eq!(retention.long_term.words, 1);
        assert_eq!(retention.long_term.retained, 0);
    }
}
