use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{StudentId, UserId, WordId};

/// Review passes an anti-forget cycle runs by default.
pub const DEFAULT_TOTAL_REVIEWS: u32 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AntiForgetError {
    #[error("word {0} is not part of this session's snapshot")]
    WordNotInSnapshot(WordId),

    #[error("total_reviews must be at least 1")]
    ZeroTotalReviews,

    #[error("a session needs at least one word")]
    EmptyWordList,
}

/// Identifier for an anti-forget session, derived from its creation context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewSessionId(String);

impl ReviewSessionId {
    /// Derives the id the same way the remediation workflow names its cycles:
    /// `af_{student}_{word_set}_{unix_timestamp}`.
    #[must_use]
    pub fn derive(student_id: StudentId, word_set_name: &str, created_at: DateTime<Utc>) -> Self {
        Self(format!(
            "af_{}_{}_{}",
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

impl fmt::Display for ReviewSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One word inside an anti-forget snapshot. Identity fields are frozen at
/// creation; only the star flag mutates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewWord {
    pub id: WordId,
    pub english: String,
    pub chinese: String,
    #[serde(default)]
    pub is_starred: bool,
}

/// Read-only statistics for one anti-forget session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReviewStats {
    pub review_count: u32,
    pub total_reviews: u32,
    pub starred_count: u32,
    pub total_words: u32,
    pub progress_percent: u32,
}

/// A fixed-length repeated-review cycle over a point-in-time word snapshot.
///
/// The snapshot is a copy, not a live reference; starring a word here does
/// not touch the mastery store or any other session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiForgetSession {
    pub id: ReviewSessionId,
    pub student_id: StudentId,
    pub teacher_id: UserId,
    pub word_set_name: String,
    pub words: Vec<ReviewWord>,
    pub review_count: u32,
    pub total_reviews: u32,
    pub created_at: DateTime<Utc>,
}

impl AntiForgetSession {
    /// Creates a session snapshotting `words`, with `total_reviews` fixed for
    /// the session's lifetime (`None` means the default of 10).
    ///
    /// # Errors
    ///
    /// Returns `AntiForgetError` for an empty word list or zero total reviews.
    pub fn create(
        student_id: StudentId,
        teacher_id: UserId,
        word_set_name: impl Into<String>,
        words: Vec<ReviewWord>,
        total_reviews: Option<u32>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AntiForgetError> {
        if words.is_empty() {
            return Err(AntiForgetError::EmptyWordList);
        }
        let total_reviews = total_reviews.unwrap_or(DEFAULT_TOTAL_REVIEWS);
        if total_reviews == 0 {
            return Err(AntiForgetError::ZeroTotalReviews);
        }
        let word_set_name = word_set_name.into();
        let id = ReviewSessionId::derive(student_id, &word_set_name, created_at);
        Ok(Self {
            id,
            student_id,
            teacher_id,
            word_set_name,
            words,
            review_count: 0,
            total_reviews,
            created_at,
        })
    }

    /// Flips the star flag on one snapshot word, returning the new state.
    ///
    /// # Errors
    ///
    /// Returns `WordNotInSnapshot` when the word is not in the snapshot.
    pub fn toggle_star(&mut self, word_id: WordId) -> Result<bool, AntiForgetError> {
        let word = self
            .words
            .iter_mut()
            .find(|w| w.id == word_id)
            .ok_or(AntiForgetError::WordNotInSnapshot(word_id))?;
        word.is_starred = !word.is_starred;
        Ok(word.is_starred)
    }

    /// Records one finished review pass. Each call increments the counter by
    /// exactly one; the returned flag reports whether the cycle is done.
    /// Deleting a finished session is the caller's responsibility.
    pub fn complete_review(&mut self) -> bool {
        self.review_count += 1;
        self.is_complete()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.review_count >= self.total_reviews
    }

    #[must_use]
    pub fn stats(&self) -> ReviewStats {
        let starred_count = self.words.iter().filter(|w| w.is_starred).count() as u32;
        ReviewStats {
            review_count: self.review_count,
            total_reviews: self.total_reviews,
            starred_count,
            total_words: self.words.len() as u32,
            progress_percent: self.review_count * 100 / self.total_reviews,
        }
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

    fn build() -> AntiForgetSession {
        AntiForgetSession::create(
            StudentId::new(1),
            UserId::new("teacher-1"),
            "unit-3",
            snapshot(),
            None,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn id_derivation_is_stable() {
        let session = build();
        let ts = fixed_now().timestamp();
        assert_eq!(session.id.as_str(), format!("af_1_unit-3_{ts}"));
    }

    #[test]
    fn toggle_star_is_an_involution() {
        let mut session = build();
        let first = session.toggle_star(WordId::new(2)).unwrap();
        assert!(first);
        let second = session.toggle_star(WordId::new(2)).unwrap();
        assert!(!second);
        assert!(session.words.iter().all(|w| !w.is_starred));
    }

    #[test]
    fn toggle_star_unknown_word_fails() {
        let mut session = build();
        assert_eq!(
            session.toggle_star(WordId::new(99)).unwrap_err(),
            AntiForgetError::WordNotInSnapshot(WordId::new(99))
        );
    }

    #[test]
    fn completes_on_the_last_review_only() {
        let mut session = build();
        for i in 1..DEFAULT_TOTAL_REVIEWS {
            assert!(!session.complete_review(), "pass {i} should not complete");
        }
        assert!(session.complete_review());
        assert_eq!(session.review_count, DEFAULT_TOTAL_REVIEWS);
    }

    #[test]
    fn extra_reviews_still_count_one_at_a_time() {
        let mut session = build();
        for _ in 0..DEFAULT_TOTAL_REVIEWS + 1 {
            session.complete_review();
        }
        assert_eq!(session.review_count, DEFAULT_TOTAL_REVIEWS + 1);
    }

    #[test]
    fn stats_report_floor_percent() {
        let mut session = AntiForgetSession::create(
            StudentId::new(1),
            UserId::new("teacher-1"),
            "unit-3",
            snapshot(),
            Some(3),
            fixed_now(),
        )
        .unwrap();
        session.complete_review();
        session.toggle_star(WordId::new(1)).unwrap();

        let stats = session.stats();
        assert_eq!(stats.review_count, 1);
        assert_eq!(stats.total_reviews, 3);
        assert_eq!(stats.starred_count, 1);
        assert_eq!(stats.total_words, 3);
        // 1/3 floors to 33
        assert_eq!(stats.progress_percent, 33);
    }

    #[test]
    fn zero_total_reviews_is_rejected() {
        let err = AntiForgetSession::create(
            StudentId::new(1),
            UserId::new("teacher-1"),
            "unit-3",
            snapshot(),
            Some(0),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, AntiForgetError::ZeroTotalReviews);
    }
}
