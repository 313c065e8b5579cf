//! Client-side view of a run in progress.
//!
//! The server never sweeps abandoned records; their rows keep an active
//! status forever. Polling clients decide presentation at each tick: an
//! active record whose last write is older than the staleness threshold
//! is shown as stopped and no longer drives polling. Stopping a record by
//! hand only mutes it in the session; the store row is untouched.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{OutputRecord, ProofreadStatus, TranslationStatus};

/// What a polling client shows for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPresentation {
    /// Translation has not started.
    Queued,
    Translating,
    /// Translation done; proofreading queued or underway.
    Proofreading,
    Completed,
    Failed,
    /// Muted by the user or abandoned server-side.
    Stopped,
}

/// Record ids the user stopped watching this session.
#[derive(Debug, Default)]
pub struct StopSet {
    ids: HashSet<Uuid>,
}

impl StopSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&mut self, id: Uuid) {
        self.ids.insert(id);
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }
}

pub fn presentation(
    record: &OutputRecord,
    stopped: &StopSet,
    now: DateTime<Utc>,
) -> RecordPresentation {
    if stopped.contains(&record.id) || record.is_stale_at(now) {
        return RecordPresentation::Stopped;
    }

    match record.translation_status {
        TranslationStatus::Pending => RecordPresentation::Queued,
        TranslationStatus::Translating => RecordPresentation::Translating,
        TranslationStatus::Failed => RecordPresentation::Failed,
        TranslationStatus::Completed => match record.proofread_status {
            ProofreadStatus::Completed | ProofreadStatus::Skipped => {
                RecordPresentation::Completed
            }
            ProofreadStatus::Failed => RecordPresentation::Failed,
            ProofreadStatus::Pending
            | ProofreadStatus::ProofReading
            | ProofreadStatus::ApplyingProofread => RecordPresentation::Proofreading,
        },
    }
}

/// Whether another poll tick is worthwhile: yes while at least one
/// unmuted record is active and not yet stale.
pub fn should_continue_polling(
    records: &[OutputRecord],
    stopped: &StopSet,
    now: DateTime<Utc>,
) -> bool {
    records
        .iter()
        .any(|r| !stopped.contains(&r.id) && r.is_active() && !r.is_stale_at(now))
}
