use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A source document registered for translation.
///
/// Rich-text storage and rendering live elsewhere; the engine only needs
/// the source text and an identity for its Output Records to hang off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub source_text: String,
    /// Language code of the source text, informational only.
    pub source_language: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(title: &str, source_text: &str, source_language: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            source_text: source_text.to_string(),
            source_language,
            created_at: Utc::now(),
        }
    }
}
