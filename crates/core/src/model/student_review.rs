use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{ReviewWord, StudentId, WordId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StudentReviewError {
    #[error("word {0} is not part of this review's snapshot")]
    WordNotInSnapshot(WordId),

    #[error("a review needs at least one word")]
    EmptyWordList,
}

/// Identifier for an archived review record, derived from its creation
/// context: `review_{student}_{word_set}_{unix_timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudentReviewId(String);

impl StudentReviewId {
    #[must_use]
    pub fn derive(student_id: StudentId, word_set_name: &str, created_at: DateTime<Utc>) -> Self {
        Self(format!(
            "review_{}_{}_{}",
            student_id,
            word_set_name,
            created_at.timestamp()
        ))
    }

    /// Wraps a persisted id without re-deriving it.
    #[must_use]
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A dated archive of the words a student trained on one day, written when
/// the post-training check finishes.
///
/// Like the anti-forget snapshot, the word list is a frozen copy; the only
/// mutation is the per-word star flag, and the record is removed only by an
/// explicit delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentReview {
    pub id: StudentReviewId,
    pub student_id: StudentId,
    pub word_set_name: String,
    pub learn_date: NaiveDate,
    pub words: Vec<ReviewWord>,
    pub created_at: DateTime<Utc>,
}

impl StudentReview {
    /// Creates an archive record snapshotting `words` for `learn_date`.
    ///
    /// # Errors
    ///
    /// Returns `EmptyWordList` when there is nothing to archive.
    pub fn create(
        student_id: StudentId,
        word_set_name: impl Into<String>,
        learn_date: NaiveDate,
        words: Vec<ReviewWord>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, StudentReviewError> {
        if words.is_empty() {
            return Err(StudentReviewError::EmptyWordList);
        }
        let word_set_name = word_set_name.into();
        let id = StudentReviewId::derive(student_id, &word_set_name, created_at);
        Ok(Self {
            id,
            student_id,
            word_set_name,
            learn_date,
            words,
            created_at,
        })
    }

    /// Flips the star flag on one archived word, returning the new state.
    ///
    /// # Errors
    ///
    /// Returns `WordNotInSnapshot` when the word is not in the archive.
    pub fn toggle_star(&mut self, word_id: WordId) -> Result<bool, StudentReviewError> {
        let word = self
            .words
            .iter_mut()
            .find(|w| w.id == word_id)
            .ok_or(StudentReviewError::WordNotInSnapshot(word_id))?;
        word.is_starred = !word.is_starred;
        Ok(word.is_starred)
    }

    #[must_use]
    pub fn starred_count(&self) -> u32 {
        self.words.iter().filter(|w| w.is_starred).count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn snapshot() -> Vec<ReviewWord> {
        (1..=3)
            .map(|i| ReviewWord {
                id: WordId::new(i),
                english: format!("word-{i}"),
                chinese: format!("词{i}"),
                is_starred: false,
            })
            .collect()
    }

    fn learn_date() -> NaiveDate {
        fixed_now().date_naive()
    }

    fn build() -> StudentReview {
        StudentReview::create(StudentId::new(1), "unit-3", learn_date(), snapshot(), fixed_now())
            .unwrap()
    }

    #[test]
    fn id_derivation_is_stable() {
        let review = build();
        let ts = fixed_now().timestamp();
        assert_eq!(review.id.as_str(), format!("review_1_unit-3_{ts}"));
    }

    #[test]
    fn toggle_star_is_an_involution() {
        let mut review = build();
        assert!(review.toggle_star(WordId::new(2)).unwrap());
        assert_eq!(review.starred_count(), 1);
        assert!(!review.toggle_star(WordId::new(2)).unwrap());
        assert_eq!(review.starred_count(), 0);
    }

    #[test]
    fn toggle_star_unknown_word_fails() {
        let mut review = build();
        assert_eq!(
            review.toggle_star(WordId::new(99)).unwrap_err(),
            StudentReviewError::WordNotInSnapshot(WordId::new(99))
        );
    }

    #[test]
    fn empty_word_list_is_rejected() {
        let err = StudentReview::create(
            StudentId::new(1),
            "unit-3",
            learn_date(),
            Vec::new(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, StudentReviewError::EmptyWordList);
    }
}
