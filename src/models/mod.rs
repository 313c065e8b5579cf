pub mod document;
pub mod enums;
pub mod language;
pub mod output;

pub use document::Document;
pub use enums::{ProofreadStatus, TranslationStatus};
pub use language::Language;
pub use output::{OutputRecord, PhaseStats, Proposal, ProposedChange, STALE_AFTER_MINUTES};
