use sqlx::Row;

use vocab_core::model::{ProgressRecord, StudentId};

use crate::repository::{ProgressRepository, StorageError, UpsertOutcome};
use super::SqliteRepository;
use super::mapping::{map_progress_row, ser, student_id_to_i64, tasks_to_json};

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn upsert_progress(
        &self,
        record: &ProgressRecord,
    ) -> Result<UpsertOutcome, StorageError> {
        let existing: Option<i64> = sqlx::query_scalar(
            r"
            SELECT id FROM learning_progress
            WHERE student_id = ?1 AND word_set_name = ?2 AND word_index = ?3
            ",
        )
        .bind(student_id_to_i64(record.student_id)?)
        .bind(&record.word_set_name)
        .bind(i64::from(record.word_index))
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO learning_progress (
                student_id, word_set_name, word_index, current_stage,
                total_groups, tasks_completed, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (student_id, word_set_name, word_index) DO UPDATE SET
                current_stage = excluded.current_stage,
                total_groups = excluded.total_groups,
                tasks_completed = excluded.tasks_completed,
                updated_at = excluded.updated_at
            ",
        )
        .bind(student_id_to_i64(record.student_id)?)
        .bind(&record.word_set_name)
        .bind(i64::from(record.word_index))
        .bind(i64::from(record.current_stage))
        .bind(i64::from(record.total_groups))
        .bind(tasks_to_json(&record.tasks_completed)?)
        .bind(record.updated_at)
        .execute(self.pool())
        .await
        .map_err(conn)?;

        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        })
    }

    async fn list_progress(
        &self,
        student_id: StudentId,
        word_set_name: &str,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT student_id, word_set_name, word_index, current_stage,
                   total_groups, tasks_completed, updated_at
            FROM learning_progress
            WHERE student_id = ?1 AND word_set_name = ?2
            ORDER BY word_index ASC
            ",
        )
        .bind(student_id_to_i64(student_id)?)
        .bind(word_set_name)
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        Ok(out)
    }

    async fn stage_counts(
        &self,
        student_id: StudentId,
        word_set_name: &str,
    ) -> Result<[u64; 9], StorageError> {
        let rows = sqlx::query(
            r"
            SELECT current_stage, COUNT(*) AS n
            FROM learning_progress
            WHERE student_id = ?1 AND word_set_name = ?2
            GROUP BY current_stage
            ",
        )
        .bind(student_id_to_i64(student_id)?)
        .bind(word_set_name)
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let mut counts = [0u64; 9];
        for row in rows {
            let stage: i64 = row.try_get("current_stage").map_err(ser)?;
            let n: i64 = row.try_get("n").map_err(ser)?;
            let idx = usize::try_from(stage)
                .map_err(|_| StorageError::Serialization(format!("invalid stage: {stage}")))?;
            if idx < counts.len() {
                counts[idx] = u64::try_from(n).unwrap_or(0);
            }
        }
        Ok(counts)
    }
}
