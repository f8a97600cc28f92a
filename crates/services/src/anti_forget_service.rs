use std::sync::Arc;

use storage::repository::{AntiForgetRepository, StudentRepository};
use vocab_core::Clock;
use vocab_core::model::{
    AntiForgetSession, ReviewSessionId, ReviewStats, ReviewWord, StudentId, UserId, WordId,
};

use crate::error::AntiForgetServiceError;

/// Result of one `complete_review` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewProgress {
    pub review_count: u32,
    pub total_reviews: u32,
    pub is_completed: bool,
}

/// Counter-based repeated-review cycles over frozen word snapshots.
///
/// Sessions never touch mastery state and are deleted by the caller once the
/// cycle reports complete.
#[derive(Clone)]
pub struct AntiForgetService {
    clock: Clock,
    students: Arc<dyn StudentRepository>,
    reviews: Arc<dyn AntiForgetRepository>,
}

impl AntiForgetService {
    #[must_use]
    pub fn new(
        clock: Clock,
        students: Arc<dyn StudentRepository>,
        reviews: Arc<dyn AntiForgetRepository>,
    ) -> Self {
        Self {
            clock,
            students,
            reviews,
        }
    }

    /// Create a review cycle from a snapshot of `words`. `total_reviews`
    /// defaults to 10 and is immutable afterwards.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` for an unknown student, `AntiForget` for
    /// an empty word list or zero review target, and `Storage(Conflict)`
    /// when an identical session id already exists.
    pub async fn create_session(
        &self,
        student_id: StudentId,
        teacher_id: UserId,
        word_set_name: &str,
        words: Vec<ReviewWord>,
        total_reviews: Option<u32>,
    ) -> Result<AntiForgetSession, AntiForgetServiceError> {
        let student = self.students.get_student(student_id).await?;

        let session = AntiForgetSession::create(
            student.id,
            teacher_id,
            word_set_name,
            words,
            total_reviews,
            self.clock.now(),
        )?;
        self.reviews.insert_review_session(&session).await?;
        tracing::info!(
            session_id = session.id.as_str(),
            student_id = student_id.value(),
            total_words = session.words.len(),
            total_reviews = session.total_reviews,
            "created anti-forget session"
        );
        Ok(session)
    }

    /// Fetch one session.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` if the session does not exist.
    pub async fn session(
        &self,
        id: &ReviewSessionId,
    ) -> Result<AntiForgetSession, AntiForgetServiceError> {
        Ok(self.reviews.get_review_session(id).await?)
    }

    /// All sessions of a student, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AntiForgetServiceError::Storage` on storage failures.
    pub async fn sessions_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<AntiForgetSession>, AntiForgetServiceError> {
        Ok(self.reviews.review_sessions_for_student(student_id).await?)
    }

    /// Flip the star on one snapshot word and persist the whole snapshot.
    /// Returns the new starred state.
    ///
    /// # Errors
    ///
    /// Returns `AntiForget(WordNotInSnapshot)` when the word is not in the
    /// session's snapshot.
    pub async fn toggle_star(
        &self,
        id: &ReviewSessionId,
        word_id: WordId,
    ) -> Result<bool, AntiForgetServiceError> {
        let mut session = self.reviews.get_review_session(id).await?;
        let starred = session.toggle_star(word_id)?;
        self.reviews.update_review_words(id, &session.words).await?;
        Ok(starred)
    }

    /// Record one finished review pass. Each call adds exactly one to the
    /// counter; deleting a finished session is left to the caller.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` if the session does not exist.
    pub async fn complete_review(
        &self,
        id: &ReviewSessionId,
    ) -> Result<ReviewProgress, AntiForgetServiceError> {
        let mut session = self.reviews.get_review_session(id).await?;
        let is_completed = session.complete_review();
        self.reviews
            .set_review_count(id, session.review_count)
            .await?;
        tracing::info!(
            session_id = id.as_str(),
            review_count = session.review_count,
            is_completed,
            "completed review pass"
        );
        Ok(ReviewProgress {
            review_count: session.review_count,
            total_reviews: session.total_reviews,
            is_completed,
        })
    }

    /// Current counters and star tally for a session.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` if the session does not exist.
    pub async fn stats(
        &self,
        id: &ReviewSessionId,
    ) -> Result<ReviewStats, AntiForgetServiceError> {
        let session = self.reviews.get_review_session(id).await?;
        Ok(session.stats())
    }

    /// Remove a session, typically after it reported complete.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` if the session does not exist.
    pub async fn delete_session(
        &self,
        id: &ReviewSessionId,
    ) -> Result<(), AntiForgetServiceError> {
        self.reviews.delete_review_session(id).await?;
        tracing::info!(session_id = id.as_str(), "deleted anti-forget session");
        Ok(())
    }
}
