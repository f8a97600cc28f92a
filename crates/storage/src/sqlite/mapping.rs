use sqlx::Row;

use vocab_core::model::{
    AntiForgetSession, BoxPosition, MasteryRecord, ProgressRecord, ReviewSessionId, ReviewWord,
    SessionId, Stage, StageAction, StageRecord, StageResult, Student, StudentId, StudentReview,
    StudentReviewId, TasksCompleted, UserId, Word, WordId,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn student_id_from_i64(v: i64) -> Result<StudentId, StorageError> {
    Ok(StudentId::new(i64_to_u64("student_id", v)?))
}

pub(crate) fn word_id_from_i64(v: i64) -> Result<WordId, StorageError> {
    Ok(WordId::new(i64_to_u64("word_id", v)?))
}

pub(crate) fn session_id_from_i64(v: i64) -> Result<SessionId, StorageError> {
    Ok(SessionId::new(i64_to_u64("session_id", v)?))
}

pub(crate) fn student_id_to_i64(id: StudentId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("student_id overflow".into()))
}

pub(crate) fn word_id_to_i64(id: WordId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("word_id overflow".into()))
}

pub(crate) fn session_id_to_i64(id: SessionId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("session_id overflow".into()))
}

pub(crate) fn parse_stage(s: &str) -> Result<Stage, StorageError> {
    Stage::parse(s).ok_or_else(|| StorageError::Serialization(format!("invalid stage: {s}")))
}

pub(crate) fn parse_stage_action(s: &str) -> Result<StageAction, StorageError> {
    StageAction::parse(s).ok_or_else(|| StorageError::Serialization(format!("invalid action: {s}")))
}

pub(crate) fn parse_stage_result(s: &str) -> Result<StageResult, StorageError> {
    StageResult::parse(s).ok_or_else(|| StorageError::Serialization(format!("invalid result: {s}")))
}

pub(crate) fn box_position_from_i64(v: i64) -> Result<BoxPosition, StorageError> {
    let raw = u8::try_from(v)
        .map_err(|_| StorageError::Serialization(format!("invalid box_position: {v}")))?;
    BoxPosition::new(raw).map_err(ser)
}

pub(crate) fn count_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn map_student_row(row: &sqlx::sqlite::SqliteRow) -> Result<Student, StorageError> {
    Ok(Student {
        id: student_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        name: row.try_get("name").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_word_row(row: &sqlx::sqlite::SqliteRow) -> Result<Word, StorageError> {
    Ok(Word {
        id: word_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        word_set_name: row.try_get("word_set_name").map_err(ser)?,
        english: row.try_get("english").map_err(ser)?,
        chinese: row.try_get("chinese").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_mastery_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<MasteryRecord, StorageError> {
    Ok(MasteryRecord {
        student_id: student_id_from_i64(row.try_get::<i64, _>("student_id").map_err(ser)?)?,
        word_id: word_id_from_i64(row.try_get::<i64, _>("word_id").map_err(ser)?)?,
        box_position: box_position_from_i64(row.try_get::<i64, _>("box_position").map_err(ser)?)?,
        review_count: count_from_i64(
            "review_count",
            row.try_get::<i64, _>("review_count").map_err(ser)?,
        )?,
        last_reviewed_at: row.try_get("last_reviewed_at").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

/// Maps a session row. The ordered word list lives in `session_words` and is
/// joined in by the caller.
pub(crate) fn map_session_row(
    row: &sqlx::sqlite::SqliteRow,
    word_ids: Vec<WordId>,
) -> Result<vocab_core::model::LearningSession, StorageError> {
    let stage_str: String = row.try_get("current_stage").map_err(ser)?;
    Ok(vocab_core::model::LearningSession {
        id: session_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        student_id: student_id_from_i64(row.try_get::<i64, _>("student_id").map_err(ser)?)?,
        word_ids,
        words_count: count_from_i64(
            "words_count",
            row.try_get::<i64, _>("words_count").map_err(ser)?,
        )?,
        total_groups: count_from_i64(
            "total_groups",
            row.try_get::<i64, _>("total_groups").map_err(ser)?,
        )?,
        current_group: count_from_i64(
            "current_group",
            row.try_get::<i64, _>("current_group").map_err(ser)?,
        )?,
        current_stage: parse_stage(&stage_str)?,
        completed: row.try_get::<i64, _>("completed").map_err(ser)? != 0,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_stage_record_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<StageRecord, StorageError> {
    let stage_str: String = row.try_get("stage").map_err(ser)?;
    let action_str: String = row.try_get("action").map_err(ser)?;
    let result_str: String = row.try_get("result").map_err(ser)?;
    Ok(StageRecord {
        session_id: session_id_from_i64(row.try_get::<i64, _>("session_id").map_err(ser)?)?,
        word_id: word_id_from_i64(row.try_get::<i64, _>("word_id").map_err(ser)?)?,
        stage: parse_stage(&stage_str)?,
        action: parse_stage_action(&action_str)?,
        result: parse_stage_result(&result_str)?,
        recorded_at: row.try_get("recorded_at").map_err(ser)?,
    })
}

pub(crate) fn words_to_json(words: &[ReviewWord]) -> Result<String, StorageError> {
    serde_json::to_string(words).map_err(ser)
}

pub(crate) fn words_from_json(raw: &str) -> Result<Vec<ReviewWord>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_review_session_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<AntiForgetSession, StorageError> {
    let words_raw: String = row.try_get("words").map_err(ser)?;
    let teacher_id: String = row.try_get("teacher_id").map_err(ser)?;
    let id: String = row.try_get("id").map_err(ser)?;
    Ok(AntiForgetSession {
        id: ReviewSessionId::from_raw(id),
        student_id: student_id_from_i64(row.try_get::<i64, _>("student_id").map_err(ser)?)?,
        teacher_id: UserId::new(teacher_id),
        word_set_name: row.try_get("word_set_name").map_err(ser)?,
        words: words_from_json(&words_raw)?,
        review_count: count_from_i64(
            "review_count",
            row.try_get::<i64, _>("review_count").map_err(ser)?,
        )?,
        total_reviews: count_from_i64(
            "total_reviews",
            row.try_get::<i64, _>("total_reviews").map_err(ser)?,
        )?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_student_review_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<StudentReview, StorageError> {
    let words_raw: String = row.try_get("words").map_err(ser)?;
    let id: String = row.try_get("id").map_err(ser)?;
    Ok(StudentReview {
        id: StudentReviewId::from_raw(id),
        student_id: student_id_from_i64(row.try_get::<i64, _>("student_id").map_err(ser)?)?,
        word_set_name: row.try_get("word_set_name").map_err(ser)?,
        learn_date: row.try_get("learn_date").map_err(ser)?,
        words: words_from_json(&words_raw)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn tasks_to_json(tasks: &TasksCompleted) -> Result<String, StorageError> {
    serde_json::to_string(tasks).map_err(ser)
}

pub(crate) fn tasks_from_json(raw: &str) -> Result<TasksCompleted, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ProgressRecord, StorageError> {
    let tasks_raw: String = row.try_get("tasks_completed").map_err(ser)?;
    let stage_i64: i64 = row.try_get("current_stage").map_err(ser)?;
    let current_stage = u8::try_from(stage_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid current_stage: {stage_i64}")))?;
    Ok(ProgressRecord {
        student_id: student_id_from_i64(row.try_get::<i64, _>("student_id").map_err(ser)?)?,
        word_set_name: row.try_get("word_set_name").map_err(ser)?,
        word_index: count_from_i64(
            "word_index",
            row.try_get::<i64, _>("word_index").map_err(ser)?,
        )?,
        current_stage,
        total_groups: count_from_i64(
            "total_groups",
            row.try_get::<i64, _>("total_groups").map_err(ser)?,
        )?,
        tasks_completed: tasks_from_json(&tasks_raw)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}
