use lexi_core::model::{Lesson, LessonId};

use super::{
    SqliteRepository, connection,
    mapping::{lesson_id_to_i64, map_lesson_row, ser},
};
use crate::repository::{LessonRepository, StorageError};

#[async_trait::async_trait]
impl LessonRepository for SqliteRepository {
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let exercises = serde_json::to_string(lesson.exercises()).map_err(ser)?;
        sqlx::query(
            r"
            INSERT INTO lessons (id, title, lives, xp_reward, gems_reward, exercises)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                lives = excluded.lives,
                xp_reward = excluded.xp_reward,
                gems_reward = excluded.gems_reward,
                exercises = excluded.exercises
            ",
        )
        .bind(lesson_id_to_i64(lesson.id())?)
        .bind(lesson.title())
        .bind(lesson.lives_override().map(i64::from))
        .bind(lesson.xp_override().map(i64::from))
        .bind(lesson.gems_override().map(i64::from))
        .bind(exercises)
        .execute(&self.pool)
        .await
        .map_err(connection)?;
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Lesson, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, lives, xp_reward, gems_reward, exercises
            FROM lessons
            WHERE id = ?1
            ",
        )
        .bind(lesson_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(connection)?
        .ok_or(StorageError::NotFound)?;
        map_lesson_row(&row)
    }

    async fn list_lessons(&self) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, lives, xp_reward, gems_reward, exercises
            FROM lessons
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(connection)?;
        rows.iter().map(map_lesson_row).collect()
    }
}
