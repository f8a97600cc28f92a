use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{StudentId, WordId};
use crate::model::session::Stage;

/// A student tracked by the mastery engine. Authentication and roles live
/// outside the core; this is only the identity the engines key their data on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Student {
    #[must_use]
    pub fn new(id: StudentId, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at,
        }
    }
}

/// A vocabulary item belonging to a named word set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub id: WordId,
    pub word_set_name: String,
    pub english: String,
    pub chinese: String,
    pub created_at: DateTime<Utc>,
}

impl Word {
    #[must_use]
    pub fn new(
        id: WordId,
        word_set_name: impl Into<String>,
        english: impl Into<String>,
        chinese: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            word_set_name: word_set_name.into(),
            english: english.into(),
            chinese: chinese.into(),
            created_at,
        }
    }
}

/// Presentation shape for a word inside a session stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordCard {
    pub word_id: WordId,
    pub english: String,
    pub chinese: String,
    pub stage: Stage,
}

impl WordCard {
    #[must_use]
    pub fn from_word(word: &Word, stage: Stage) -> Self {
        Self {
            word_id: word.id,
            english: word.english.clone(),
            chinese: word.chinese.clone(),
            stage,
        }
    }
}
