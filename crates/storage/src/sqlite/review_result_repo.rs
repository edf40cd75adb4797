use lexi_core::model::{ReviewResult, UserId, WordMastery};
use sqlx::{Sqlite, Transaction};

use super::{
    SqliteRepository, connection,
    mapping::{latency_to_ms, map_review_result_row, ser, user_key},
    mastery_repo::upsert_masteries,
};
use crate::repository::{MasteryPersistence, ReviewHistoryRepository, StorageError};

async fn insert_results(
    tx: &mut Transaction<'_, Sqlite>,
    user: &UserId,
    results: &[ReviewResult],
) -> Result<(), StorageError> {
    for result in results {
        let practiced = serde_json::to_string(result.practiced()).map_err(ser)?;
        let mistakes = serde_json::to_string(result.mistakes()).map_err(ser)?;
        sqlx::query(
            r"
            INSERT INTO review_results (
                user_id, word_id, accuracy, latency_ms, attempts,
                practiced, mistakes, needs_reinforcement, reviewed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(user_key(user))
        .bind(result.word_id().as_str())
        .bind(result.accuracy())
        .bind(latency_to_ms(result.latency()))
        .bind(i64::from(result.attempts()))
        .bind(practiced)
        .bind(mistakes)
        .bind(i64::from(result.needs_reinforcement()))
        .bind(result.reviewed_at())
        .execute(&mut **tx)
        .await
        .map_err(connection)?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl ReviewHistoryRepository for SqliteRepository {
    async fn load_review_history(&self, user: &UserId) -> Result<Vec<ReviewResult>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                word_id, accuracy, latency_ms, attempts,
                practiced, mistakes, needs_reinforcement, reviewed_at
            FROM review_results
            WHERE user_id = ?1
            ORDER BY reviewed_at ASC, id ASC
            ",
        )
        .bind(user_key(user))
        .fetch_all(&self.pool)
        .await
        .map_err(connection)?;
        rows.iter().map(map_review_result_row).collect()
    }

    async fn append_review_results(
        &self,
        user: &UserId,
        results: &[ReviewResult],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(connection)?;
        insert_results(&mut tx, user, results).await?;
        tx.commit().await.map_err(connection)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MasteryPersistence for SqliteRepository {
    async fn commit_review(
        &self,
        user: &UserId,
        masteries: &[WordMastery],
        results: &[ReviewResult],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(connection)?;
        upsert_masteries(&mut tx, user, masteries).await?;
        insert_results(&mut tx, user, results).await?;
        tx.commit().await.map_err(connection)?;
        Ok(())
    }
}
