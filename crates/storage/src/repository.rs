use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use vocab_core::model::{
    AntiForgetSession, LearningSession, MasteryRecord, ProgressRecord, ReviewSessionId,
    ReviewWord, SessionId, Stage, StageRecord, Student, StudentId, StudentReview,
    StudentReviewId, Word, WordId,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Everything needed to start a session, minus the id the store assigns.
#[derive(Debug, Clone)]
pub struct NewSessionRecord {
    pub student_id: StudentId,
    pub word_ids: Vec<WordId>,
    pub created_at: DateTime<Utc>,
}

/// The write set of one session stage transition.
///
/// Adapters must apply the whole set atomically: the updated session row,
/// stage-1 records flipped to completed, new audit records, and any mastery
/// updates either all commit or none do.
#[derive(Debug, Clone, Default)]
pub struct SessionTransition {
    /// Post-transition session state. `word_ids` is immutable after create
    /// and is not rewritten here.
    pub session: Option<LearningSession>,
    /// Stage-1 records of this session to mark `completed`.
    pub complete_stage1: Vec<WordId>,
    /// Audit records to append.
    pub records: Vec<StageRecord>,
    /// Full post-state mastery rows to persist.
    pub mastery: Vec<MasteryRecord>,
}

/// Whether an upsert created a new row or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// Persist or update a student.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the student cannot be stored.
    async fn upsert_student(&self, student: &Student) -> Result<(), StorageError>;

    /// Fetch a student by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_student(&self, id: StudentId) -> Result<Student, StorageError>;

    /// Whether a student exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn student_exists(&self, id: StudentId) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait WordRepository: Send + Sync {
    /// Persist or update a word.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the word cannot be stored.
    async fn upsert_word(&self, word: &Word) -> Result<(), StorageError>;

    /// Fetch words by id, preserving the requested order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any are missing.
    async fn get_words(&self, ids: &[WordId]) -> Result<Vec<Word>, StorageError>;

    /// All words of a named word set, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn words_in_set(&self, word_set_name: &str) -> Result<Vec<Word>, StorageError>;
}

#[async_trait]
pub trait MasteryRepository: Send + Sync {
    /// Insert a fresh mastery record unless the (student, word) pair already
    /// has one. Re-assigning an already-assigned word is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn assign_word(&self, record: &MasteryRecord) -> Result<(), StorageError>;

    /// Fetch the mastery record for one (student, word) pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the word was never assigned.
    async fn get_mastery(
        &self,
        student_id: StudentId,
        word_id: WordId,
    ) -> Result<MasteryRecord, StorageError>;

    /// Fetch records for several words, preserving the requested order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any pair is missing.
    async fn get_mastery_many(
        &self,
        student_id: StudentId,
        word_ids: &[WordId],
    ) -> Result<Vec<MasteryRecord>, StorageError>;

    /// Persist the post-state of an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn update_mastery(&self, record: &MasteryRecord) -> Result<(), StorageError>;

    /// Word ids below the mastered ceiling for the student, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn eligible_words(&self, student_id: StudentId) -> Result<Vec<WordId>, StorageError>;

    /// Word counts per box position, indexed 0..=8.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn box_counts(&self, student_id: StudentId) -> Result<[u64; 9], StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a session plus its ordered word list and the stage-1 records
    /// for the first group, atomically. Returns the stored session with its
    /// assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any part of the write fails; nothing is
    /// persisted in that case.
    async fn create_session(
        &self,
        record: &NewSessionRecord,
    ) -> Result<LearningSession, StorageError>;

    /// Fetch a session, including its ordered word list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_session(&self, id: SessionId) -> Result<LearningSession, StorageError>;

    /// Sessions of a student, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn sessions_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<LearningSession>, StorageError>;

    /// Stage records of one stage of a session, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn stage_records(
        &self,
        session_id: SessionId,
        stage: Stage,
    ) -> Result<Vec<StageRecord>, StorageError>;

    /// Apply a stage transition write set as one atomic unit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` after rolling back every change in the set.
    async fn apply_transition(&self, transition: &SessionTransition) -> Result<(), StorageError>;
}

#[async_trait]
pub trait AntiForgetRepository: Send + Sync {
    /// Insert a new anti-forget session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the id already exists.
    async fn insert_review_session(&self, session: &AntiForgetSession)
        -> Result<(), StorageError>;

    /// Fetch one anti-forget session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_review_session(
        &self,
        id: &ReviewSessionId,
    ) -> Result<AntiForgetSession, StorageError>;

    /// All anti-forget sessions of a student, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn review_sessions_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<AntiForgetSession>, StorageError>;

    /// Replace the whole word snapshot of a session. Snapshot mutation is
    /// always a read-modify-write of the full value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session is missing.
    async fn update_review_words(
        &self,
        id: &ReviewSessionId,
        words: &[ReviewWord],
    ) -> Result<(), StorageError>;

    /// Persist a new review counter value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session is missing.
    async fn set_review_count(
        &self,
        id: &ReviewSessionId,
        review_count: u32,
    ) -> Result<(), StorageError>;

    /// Delete a session (the caller decides when a finished cycle goes).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session is missing.
    async fn delete_review_session(&self, id: &ReviewSessionId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait StudentReviewRepository: Send + Sync {
    /// Insert a new archived review record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the id already exists.
    async fn insert_student_review(&self, review: &StudentReview) -> Result<(), StorageError>;

    /// Fetch one archived review.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_student_review(
        &self,
        id: &StudentReviewId,
    ) -> Result<StudentReview, StorageError>;

    /// All archived reviews of a student, most recent learn date first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn student_reviews_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<StudentReview>, StorageError>;

    /// Replace the whole word snapshot of an archived review.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the review is missing.
    async fn update_student_review_words(
        &self,
        id: &StudentReviewId,
        words: &[ReviewWord],
    ) -> Result<(), StorageError>;

    /// Delete an archived review.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the review is missing.
    async fn delete_student_review(&self, id: &StudentReviewId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Create or replace the record keyed by (student, word set, word index).
    /// Last write wins; `tasks_completed` is replaced, never merged.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn upsert_progress(
        &self,
        record: &ProgressRecord,
    ) -> Result<UpsertOutcome, StorageError>;

    /// Progress records of a student within one word set, by word index.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_progress(
        &self,
        student_id: StudentId,
        word_set_name: &str,
    ) -> Result<Vec<ProgressRecord>, StorageError>;

    /// Record counts per `current_stage`, indexed 0..=8.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn stage_counts(
        &self,
        student_id: StudentId,
        word_set_name: &str,
    ) -> Result<[u64; 9], StorageError>;
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub students: Arc<dyn StudentRepository>,
    pub words: Arc<dyn WordRepository>,
    pub mastery: Arc<dyn MasteryRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub anti_forget: Arc<dyn AntiForgetRepository>,
    pub student_reviews: Arc<dyn StudentReviewRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = crate::memory::InMemoryRepository::new();
        Self::from_repo(repo)
    }

    pub(crate) fn from_repo<R>(repo: R) -> Self
    where
        R: StudentRepository
            + WordRepository
            + MasteryRepository
            + SessionRepository
            + AntiForgetRepository
            + StudentReviewRepository
            + ProgressRepository
            + Clone
            + 'static,
    {
        Self {
            students: Arc::new(repo.clone()),
            words: Arc::new(repo.clone()),
            mastery: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            anti_forget: Arc::new(repo.clone()),
            student_reviews: Arc::new(repo.clone()),
            progress: Arc::new(repo),
        }
    }
}
