use std::time::Duration;

use chrono::{DateTime, Utc};
use lexi_core::model::{
    Exercise, ExerciseType, Lesson, LessonId, MasteryLevel, ReviewResult, UserId, WordId,
    WordMastery,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn lesson_id_to_i64(id: LessonId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("lesson_id overflow".into()))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    u64::try_from(v)
        .map(LessonId::new)
        .map_err(|_| StorageError::Serialization("lesson_id sign overflow".into()))
}

pub(crate) fn user_key(user: &UserId) -> &str {
    user.as_str()
}

pub(crate) fn word_id_from_str(raw: &str) -> Result<WordId, StorageError> {
    WordId::new(raw).map_err(ser)
}

pub(crate) fn latency_to_ms(latency: Duration) -> i64 {
    i64::try_from(latency.as_millis()).unwrap_or(i64::MAX)
}

pub(crate) fn map_mastery_row(row: &SqliteRow) -> Result<WordMastery, StorageError> {
    let word_id: String = row.try_get("word_id").map_err(ser)?;
    let level: String = row.try_get("level").map_err(ser)?;
    let review_count: i64 = row.try_get("review_count").map_err(ser)?;
    let below_floor: i64 = row.try_get("below_floor").map_err(ser)?;

    WordMastery::from_persisted(
        word_id_from_str(&word_id)?,
        level.parse::<MasteryLevel>().map_err(ser)?,
        row.try_get("accuracy_ewma").map_err(ser)?,
        row.try_get::<Option<DateTime<Utc>>, _>("last_reviewed_at")
            .map_err(ser)?,
        u32_from_i64("review_count", review_count)?,
        below_floor != 0,
    )
    .map_err(ser)
}

pub(crate) fn map_review_result_row(row: &SqliteRow) -> Result<ReviewResult, StorageError> {
    let word_id: String = row.try_get("word_id").map_err(ser)?;
    let latency_ms: i64 = row.try_get("latency_ms").map_err(ser)?;
    let attempts: i64 = row.try_get("attempts").map_err(ser)?;
    let practiced: String = row.try_get("practiced").map_err(ser)?;
    let mistakes: String = row.try_get("mistakes").map_err(ser)?;
    let needs_reinforcement: i64 = row.try_get("needs_reinforcement").map_err(ser)?;

    let practiced: Vec<ExerciseType> = serde_json::from_str(&practiced).map_err(ser)?;
    let mistakes: Vec<String> = serde_json::from_str(&mistakes).map_err(ser)?;
    let latency = u64::try_from(latency_ms)
        .map(Duration::from_millis)
        .map_err(|_| StorageError::Serialization(format!("invalid latency_ms: {latency_ms}")))?;

    let result = ReviewResult::new(
        word_id_from_str(&word_id)?,
        row.try_get("accuracy").map_err(ser)?,
        row.try_get("reviewed_at").map_err(ser)?,
    )
    .map_err(ser)?
    .with_latency(latency)
    .with_attempts(u32_from_i64("attempts", attempts)?)
    .with_practiced(practiced)
    .with_mistakes(mistakes)
    .map_err(ser)?
    .with_reinforcement(needs_reinforcement != 0);
    Ok(result)
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let exercises: String = row.try_get("exercises").map_err(ser)?;
    let exercises: Vec<Exercise> = serde_json::from_str(&exercises).map_err(ser)?;
    let optional = |field: &'static str| -> Result<Option<u32>, StorageError> {
        row.try_get::<Option<i64>, _>(field)
            .map_err(ser)?
            .map(|v| u32_from_i64(field, v))
            .transpose()
    };

    Lesson::from_persisted(
        lesson_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        exercises,
        optional("lives")?,
        optional("xp_reward")?,
        optional("gems_reward")?,
    )
    .map_err(ser)
}
