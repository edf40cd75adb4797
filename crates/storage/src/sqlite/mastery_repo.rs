use lexi_core::model::{UserId, WordMastery};
use sqlx::{Sqlite, Transaction};

use super::{
    SqliteRepository, connection,
    mapping::{map_mastery_row, user_key},
};
use crate::repository::{MasteryRepository, StorageError};

pub(super) async fn upsert_masteries(
    tx: &mut Transaction<'_, Sqlite>,
    user: &UserId,
    masteries: &[WordMastery],
) -> Result<(), StorageError> {
    for mastery in masteries {
        sqlx::query(
            r"
            INSERT INTO word_masteries (
                user_id, word_id, level, accuracy_ewma,
                last_reviewed_at, review_count, below_floor
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id, word_id) DO UPDATE SET
                level = excluded.level,
                accuracy_ewma = excluded.accuracy_ewma,
                last_reviewed_at = excluded.last_reviewed_at,
                review_count = excluded.review_count,
                below_floor = excluded.below_floor
            ",
        )
        .bind(user_key(user))
        .bind(mastery.word_id().as_str())
        .bind(mastery.level().as_str())
        .bind(mastery.accuracy_ewma())
        .bind(mastery.last_reviewed_at())
        .bind(i64::from(mastery.review_count()))
        .bind(i64::from(mastery.below_floor()))
        .execute(&mut **tx)
        .await
        .map_err(connection)?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl MasteryRepository for SqliteRepository {
    async fn load_word_masteries(&self, user: &UserId) -> Result<Vec<WordMastery>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT word_id, level, accuracy_ewma, last_reviewed_at, review_count, below_floor
            FROM word_masteries
            WHERE user_id = ?1
            ORDER BY word_id
            ",
        )
        .bind(user_key(user))
        .fetch_all(&self.pool)
        .await
        .map_err(connection)?;
        rows.iter().map(map_mastery_row).collect()
    }

    async fn save_word_masteries(
        &self,
        user: &UserId,
        masteries: &[WordMastery],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(connection)?;
        upsert_masteries(&mut tx, user, masteries).await?;
        tx.commit().await.map_err(connection)?;
        Ok(())
    }
}
