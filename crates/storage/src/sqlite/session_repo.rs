use sqlx::{Row, Sqlite, Transaction};

use vocab_core::model::{LearningSession, SessionId, Stage, StageRecord, StudentId, WordId};

use crate::repository::{NewSessionRecord, SessionRepository, SessionTransition, StorageError};
use super::SqliteRepository;
use super::mapping::{
    map_session_row, map_stage_record_row, ser, session_id_to_i64, student_id_to_i64,
    word_id_from_i64, word_id_to_i64,
};

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Writes one stage record inside the caller's transaction. Every multi-step
/// session mutation threads its transaction handle through helpers like this
/// one explicitly.
async fn insert_stage_record(
    tx: &mut Transaction<'_, Sqlite>,
    record: &StageRecord,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO stage_records (session_id, word_id, stage, action, result, recorded_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
    )
    .bind(session_id_to_i64(record.session_id)?)
    .bind(word_id_to_i64(record.word_id)?)
    .bind(record.stage.as_str())
    .bind(record.action.as_str())
    .bind(record.result.as_str())
    .bind(record.recorded_at)
    .execute(&mut **tx)
    .await
    .map_err(conn)?;
    Ok(())
}

async fn update_session_row(
    tx: &mut Transaction<'_, Sqlite>,
    session: &LearningSession,
) -> Result<(), StorageError> {
    let result = sqlx::query(
        r"
        UPDATE learning_sessions
        SET current_group = ?2, current_stage = ?3, completed = ?4
        WHERE id = ?1
        ",
    )
    .bind(session_id_to_i64(session.id)?)
    .bind(i64::from(session.current_group))
    .bind(session.current_stage.as_str())
    .bind(i64::from(session.completed))
    .execute(&mut **tx)
    .await
    .map_err(conn)?;

    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(())
}

async fn mark_stage1_completed(
    tx: &mut Transaction<'_, Sqlite>,
    session_id: SessionId,
    word_ids: &[WordId],
) -> Result<(), StorageError> {
    for word_id in word_ids {
        sqlx::query(
            r"
            UPDATE stage_records
            SET result = 'completed'
            WHERE session_id = ?1 AND word_id = ?2 AND stage = 'stage1'
            ",
        )
        .bind(session_id_to_i64(session_id)?)
        .bind(word_id_to_i64(*word_id)?)
        .execute(&mut **tx)
        .await
        .map_err(conn)?;
    }
    Ok(())
}

async fn update_mastery_row(
    tx: &mut Transaction<'_, Sqlite>,
    record: &vocab_core::model::MasteryRecord,
) -> Result<(), StorageError> {
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
    .execute(&mut **tx)
    .await
    .map_err(conn)?;

    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(())
}

impl SqliteRepository {
    async fn session_word_ids(&self, session_id: SessionId) -> Result<Vec<WordId>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT word_id
            FROM session_words
            WHERE session_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(session_id_to_i64(session_id)?)
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(word_id_from_i64(row.try_get::<i64, _>("word_id").map_err(ser)?)?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(
        &self,
        record: &NewSessionRecord,
    ) -> Result<LearningSession, StorageError> {
        // Build the domain session up front so create-time invariants are
        // checked before anything is written.
        let draft = LearningSession::create(
            SessionId::new(0),
            record.student_id,
            record.word_ids.clone(),
            record.created_at,
        )
        .map_err(ser)?;

        let mut tx = self.pool().begin().await.map_err(conn)?;

        let inserted = sqlx::query(
            r"
            INSERT INTO learning_sessions (
                student_id, words_count, total_groups, current_group,
                current_stage, completed, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(student_id_to_i64(record.student_id)?)
        .bind(i64::from(draft.words_count))
        .bind(i64::from(draft.total_groups))
        .bind(i64::from(draft.current_group))
        .bind(draft.current_stage.as_str())
        .bind(i64::from(draft.completed))
        .bind(record.created_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        let id = u64::try_from(inserted.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("session rowid overflow".into()))?;
        let session = LearningSession {
            id: SessionId::new(id),
            ..draft
        };

        for (position, word_id) in session.word_ids.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO session_words (session_id, position, word_id)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(session_id_to_i64(session.id)?)
            .bind(position as i64)
            .bind(word_id_to_i64(*word_id)?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        for stage_record in session.stage1_records(1, record.created_at) {
            insert_stage_record(&mut tx, &stage_record).await?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(session)
    }

    async fn get_session(&self, id: SessionId) -> Result<LearningSession, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, student_id, words_count, total_groups, current_group,
                   current_stage, completed, created_at
            FROM learning_sessions
            WHERE id = ?1
            ",
        )
        .bind(session_id_to_i64(id)?)
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        let word_ids = self.session_word_ids(id).await?;
        map_session_row(&row, word_ids)
    }

    async fn sessions_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<LearningSession>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, student_id, words_count, total_groups, current_group,
                   current_stage, completed, created_at
            FROM learning_sessions
            WHERE student_id = ?1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(student_id_to_i64(student_id)?)
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id = super::mapping::session_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
            let word_ids = self.session_word_ids(id).await?;
            out.push(map_session_row(&row, word_ids)?);
        }
        Ok(out)
    }

    async fn stage_records(
        &self,
        session_id: SessionId,
        stage: Stage,
    ) -> Result<Vec<StageRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT session_id, word_id, stage, action, result, recorded_at
            FROM stage_records
            WHERE session_id = ?1 AND stage = ?2
            ORDER BY id ASC
            ",
        )
        .bind(session_id_to_i64(session_id)?)
        .bind(stage.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_stage_record_row(&row)?);
        }
        Ok(out)
    }

    async fn apply_transition(&self, transition: &SessionTransition) -> Result<(), StorageError> {
        let mut tx = self.pool().begin().await.map_err(conn)?;

        if let Some(session) = &transition.session {
            update_session_row(&mut tx, session).await?;
            if !transition.complete_stage1.is_empty() {
                mark_stage1_completed(&mut tx, session.id, &transition.complete_stage1).await?;
            }
        }
        for record in &transition.records {
            insert_stage_record(&mut tx, record).await?;
        }
        for record in &transition.mastery {
            update_mastery_row(&mut tx, record).await?;
        }

        // An early return above drops the transaction, rolling everything
        // back; only a clean pass through the whole write set commits.
        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
