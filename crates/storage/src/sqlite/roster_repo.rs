use std::collections::HashMap;

use vocab_core::model::{Student, StudentId, Word, WordId};

use crate::repository::{StorageError, StudentRepository, WordRepository};
use super::SqliteRepository;
use super::mapping::{map_student_row, map_word_row, student_id_to_i64, word_id_to_i64};

#[async_trait::async_trait]
impl StudentRepository for SqliteRepository {
    async fn upsert_student(&self, student: &Student) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO students (id, name, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name
            ",
        )
        .bind(student_id_to_i64(student.id)?)
        .bind(&student.name)
        .bind(student.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn get_student(&self, id: StudentId) -> Result<Student, StorageError> {
        let row = sqlx::query("SELECT id, name, created_at FROM students WHERE id = ?1")
            .bind(student_id_to_i64(id)?)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .ok_or(StorageError::NotFound)?;
        map_student_row(&row)
    }

    async fn student_exists(&self, id: StudentId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM students WHERE id = ?1")
            .bind(student_id_to_i64(id)?)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(row.is_some())
    }
}

#[async_trait::async_trait]
impl WordRepository for SqliteRepository {
    async fn upsert_word(&self, word: &Word) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO words (id, word_set_name, english, chinese, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                word_set_name = excluded.word_set_name,
                english = excluded.english,
                chinese = excluded.chinese
            ",
        )
        .bind(word_id_to_i64(word.id)?)
        .bind(&word.word_set_name)
        .bind(&word.english)
        .bind(&word.chinese)
        .bind(word.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn get_words(&self, ids: &[WordId]) -> Result<Vec<Word>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            "SELECT id, word_set_name, english, chinese, created_at FROM words WHERE id IN (",
        );
        for i in 0..ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push(')');

        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(word_id_to_i64(*id)?);
        }

        let rows = q
            .fetch_all(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut by_id: HashMap<WordId, Word> = HashMap::with_capacity(rows.len());
        for row in rows {
            let word = map_word_row(&row)?;
            by_id.insert(word.id, word);
        }

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match by_id.remove(id) {
                Some(word) => out.push(word),
                None => return Err(StorageError::NotFound),
            }
        }
        Ok(out)
    }

    async fn words_in_set(&self, word_set_name: &str) -> Result<Vec<Word>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, word_set_name, english, chinese, created_at
            FROM words
            WHERE word_set_name = ?1
            ORDER BY id ASC
            ",
        )
        .bind(word_set_name)
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_word_row(&row)?);
        }
        Ok(out)
    }
}
