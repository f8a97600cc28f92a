//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use vocab_core::model::{
    AntiForgetError, MasteryError, ProgressError, SessionError, StudentReviewError, WordId,
};

/// Errors emitted by `MasteryService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MasteryServiceError {
    #[error(transparent)]
    Mastery(#[from] MasteryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SessionEngine`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionEngineError {
    #[error("words_count must be at least 1")]
    InvalidWordCount,
    #[error("only {available} eligible words, {requested} requested")]
    InsufficientWords { available: usize, requested: usize },
    #[error("no result supplied for word {0}")]
    MissingResult(WordId),
    #[error("word {0} is not part of this step")]
    UnknownWord(WordId),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Mastery(#[from] MasteryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AntiForgetService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AntiForgetServiceError {
    #[error(transparent)]
    AntiForget(#[from] AntiForgetError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `StudentReviewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StudentReviewServiceError {
    #[error(transparent)]
    StudentReview(#[from] StudentReviewError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
