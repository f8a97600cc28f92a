pub mod anti_forget;
pub mod ids;
pub mod mastery;
pub mod progress;
pub mod roster;
pub mod session;
pub mod student_review;

pub use anti_forget::{
    AntiForgetError, AntiForgetSession, DEFAULT_TOTAL_REVIEWS, ReviewSessionId, ReviewStats,
    ReviewWord,
};
pub use ids::{ParseIdError, SessionId, StudentId, UserId, WordId};
pub use mastery::{BoxPosition, MAX_BOX, MasteryError, MasteryRecord};
pub use progress::{GridStats, ProgressError, ProgressRecord, TasksCompleted};
pub use roster::{Student, Word, WordCard};
pub use session::{
    GROUP_SIZE, GroupAdvance, LearningSession, SessionError, Stage, StageAction, StageRecord,
    StageResult,
};
pub use student_review::{StudentReview, StudentReviewError, StudentReviewId};
