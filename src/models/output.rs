use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ProofreadStatus, TranslationStatus};
use super::language::Language;

/// Active records whose last write is older than this are treated as
/// abandoned by polling clients.
pub const STALE_AFTER_MINUTES: i64 = 30;

/// One correction suggested by the proofreading propose step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedChange {
    pub original: String,
    pub change: String,
    pub reason: String,
}

/// The persisted outcome of the propose step.
///
/// `Raw` holds the model's unparsed reply when no structured block could
/// be extracted; storing it beats discarding the work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Proposal {
    Changes(Vec<ProposedChange>),
    Raw(String),
}

/// Success provenance for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStats {
    pub duration_ms: i64,
    /// Absent when the provider reported no usage for the call.
    pub output_tokens: Option<i64>,
}

/// The unit of work for one (document, language) pair.
///
/// Exactly one record exists per pair; a new run deletes and recreates it.
/// Mutated only by the phase runners, never by request handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub language_code: String,
    pub language_name: String,
    pub model: String,
    pub translated_text: Option<String>,
    pub proofread_proposed_changes: Option<Proposal>,
    pub proofread_original_translation: Option<String>,
    pub translation_status: TranslationStatus,
    pub proofread_status: ProofreadStatus,
    pub translation_stats: Option<PhaseStats>,
    pub proofread_stats: Option<PhaseStats>,
    pub updated_at: DateTime<Utc>,
}

impl OutputRecord {
    /// Fresh record at the start of a run. Proofreading that was not
    /// requested resolves to `skipped` immediately so the record can
    /// settle on translation alone.
    pub fn new(document_id: Uuid, language: &Language, model: &str, proofread: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            language_code: language.code.clone(),
            language_name: language.name.clone(),
            model: model.to_string(),
            translated_text: None,
            proofread_proposed_changes: None,
            proofread_original_translation: None,
            translation_status: TranslationStatus::Pending,
            proofread_status: if proofread {
                ProofreadStatus::Pending
            } else {
                ProofreadStatus::Skipped
            },
            translation_stats: None,
            proofread_stats: None,
            updated_at: Utc::now(),
        }
    }

    /// Whether more server-side work is expected for this record.
    ///
    /// A failed translation settles the record even though proofreading
    /// never left `pending`: proofreading is gated on a completed
    /// translation and will never run.
    pub fn is_active(&self) -> bool {
        if !self.translation_status.is_terminal() {
            return true;
        }
        self.translation_status == TranslationStatus::Completed
            && !self.proofread_status.is_terminal()
    }

    /// An active record whose last write is older than the staleness
    /// threshold. Clients present these as stopped, not running.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now - self.updated_at > Duration::minutes(STALE_AFTER_MINUTES)
    }
}
