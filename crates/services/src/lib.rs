#![forbid(unsafe_code)]

pub mod anti_forget_service;
pub mod error;
pub mod mastery_service;
pub mod progress_service;
pub mod session_engine;
pub mod student_review_service;

pub use vocab_core::Clock;

pub use error::{
    AntiForgetServiceError, MasteryServiceError, ProgressServiceError, SessionEngineError,
    StudentReviewServiceError,
};

pub use anti_forget_service::{AntiForgetService, ReviewProgress};
pub use mastery_service::MasteryService;
pub use progress_service::{BatchOutcome, ProgressService, ProgressUpsert};
pub use session_engine::{SessionEngine, Stage2Outcome, Stage3Outcome, WordResult};
pub use student_review_service::StudentReviewService;
