use thiserror::Error;

use crate::model::anti_forget::AntiForgetError;
use crate::model::mastery::MasteryError;
use crate::model::progress::ProgressError;
use crate::model::session::SessionError;
use crate::model::student_review::StudentReviewError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Mastery(#[from] MasteryError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    AntiForget(#[from] AntiForgetError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    StudentReview(#[from] StudentReviewError),
}
