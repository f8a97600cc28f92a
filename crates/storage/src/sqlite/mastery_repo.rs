use std::collections::HashMap;

use sqlx::Row;

use vocab_core::model::{MAX_BOX, MasteryRecord, StudentId, WordId};

use crate::repository::{MasteryRepository, StorageError};
use super::SqliteRepository;
use super::mapping::{map_mastery_row, ser, student_id_to_i64, word_id_to_i64};

#[async_trait::async_trait]
impl MasteryRepository for SqliteRepository {
    async fn assign_word(&self, record: &MasteryRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO student_words (
                student_id, word_id, box_position, review_count, last_reviewed_at, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(student_id, word_id) DO NOTHING
            ",
        )
        .bind(student_id_to_i64(record.student_id)?)
        .bind(word_id_to_i64(record.word_id)?)
        .bind(i64::from(record.box_position.value()))
        .bind(i64::from(record.review_count))
        .bind(record.last_reviewed_at)
        .bind(record.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn get_mastery(
        &self,
        student_id: StudentId,
        word_id: WordId,
    ) -> Result<MasteryRecord, StorageError> {
        let row = sqlx::query(
            r"
            SELECT student_id, word_id, box_position, review_count, last_reviewed_at, created_at
            FROM student_words
            WHERE student_id = ?1 AND word_id = ?2
            ",
        )
        .bind(student_id_to_i64(student_id)?)
        .bind(word_id_to_i64(word_id)?)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;
        map_mastery_row(&row)
    }

    async fn get_mastery_many(
        &self,
        student_id: StudentId,
        word_ids: &[WordId],
    ) -> Result<Vec<MasteryRecord>, StorageError> {
        if word_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
            SELECT student_id, word_id, box_position, review_count, last_reviewed_at, created_at
            FROM student_words
            WHERE student_id = ?1 AND word_id IN (
            ",
        );
        for i in 0..word_ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 2).to_string());
        }
        sql.push_str(")\n");

        let mut q = sqlx::query(&sql).bind(student_id_to_i64(student_id)?);
        for word_id in word_ids {
            q = q.bind(word_id_to_i64(*word_id)?);
        }

        let rows = q
            .fetch_all(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut by_id: HashMap<WordId, MasteryRecord> = HashMap::with_capacity(rows.len());
        for row in rows {
            let record = map_mastery_row(&row)?;
            by_id.insert(record.word_id, record);
        }

        let mut out = Vec::with_capacity(word_ids.len());
        for word_id in word_ids {
            match by_id.remove(word_id) {
                Some(record) => out.push(record),
                None => return Err(StorageError::NotFound),
            }
        }
        Ok(out)
    }

    async fn update_mastery(&self, record: &MasteryRecord) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE student_words
            SET box_position = ?3, review_count = ?4, last_reviewed_at = ?5
            WHERE student_id = ?1 AND word_id = ?2
            ",
        )
        .bind(student_id_to_i64(record.student_id)?)
        .bind(word_id_to_i64(record.word_id)?)
        .bind(i64::from(record.box_position.value()))
        .bind(i64::from(record.review_count))
        .bind(record.last_reviewed_at)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn eligible_words(&self, student_id: StudentId) -> Result<Vec<WordId>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT word_id
            FROM student_words
            WHERE student_id = ?1 AND box_position < ?2
            ORDER BY word_id ASC
            ",
        )
        .bind(student_id_to_i64(student_id)?)
        .bind(i64::from(MAX_BOX))
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: i64 = row.try_get("word_id").map_err(ser)?;
            out.push(super::mapping::word_id_from_i64(raw)?);
        }
        Ok(out)
    }

    async fn box_counts(&self, student_id: StudentId) -> Result<[u64; 9], StorageError> {
        let rows = sqlx::query(
            r"
            SELECT box_position, COUNT(*) AS n
            FROM student_words
            WHERE student_id = ?1
            GROUP BY box_position
            ",
        )
        .bind(student_id_to_i64(student_id)?)
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut counts = [0_u64; 9];
        for row in rows {
            let position: i64 = row.try_get("box_position").map_err(ser)?;
            let n: i64 = row.try_get("n").map_err(ser)?;
            let idx = usize::try_from(position)
                .map_err(|_| StorageError::Serialization(format!("invalid box: {position}")))?;
            if idx < counts.len() {
                counts[idx] = u64::try_from(n).unwrap_or(0);
            }
        }
        Ok(counts)
    }
}
