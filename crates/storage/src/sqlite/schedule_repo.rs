use lexi_core::model::UserId;
use lexi_core::scheduler::ReviewSchedule;
use sqlx::Row;

use super::{
    SqliteRepository, connection,
    mapping::{ser, user_key},
};
use crate::repository::{ScheduleRepository, StorageError};

#[async_trait::async_trait]
impl ScheduleRepository for SqliteRepository {
    async fn save_schedule(
        &self,
        user: &UserId,
        schedule: &ReviewSchedule,
    ) -> Result<(), StorageError> {
        let body = serde_json::to_string(schedule).map_err(ser)?;
        sqlx::query(
            r"
            INSERT INTO review_schedules (user_id, generated_at, schedule)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                generated_at = excluded.generated_at,
                schedule = excluded.schedule
            ",
        )
        .bind(user_key(user))
        .bind(schedule.generated_at)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(connection)?;
        Ok(())
    }

    async fn load_schedule(&self, user: &UserId) -> Result<Option<ReviewSchedule>, StorageError> {
        let row = sqlx::query("SELECT schedule FROM review_schedules WHERE user_id = ?1")
            .bind(user_key(user))
            .fetch_optional(&self.pool)
            .await
            .map_err(connection)?;
        row.map(|row| {
            let body: String = row.try_get("schedule").map_err(ser)?;
            serde_json::from_str(&body).map_err(ser)
        })
        .transpose()
    }
}
