use serde::{Deserialize, Serialize};

/// A target language from the seeded reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// Lowercase language code as used in trigger requests ("es", "pt-br").
    pub code: String,
    /// English display name shown to users and inserted into prompts.
    pub name: String,
}
