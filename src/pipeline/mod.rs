//! Per-language translation and proofreading pipeline.
//!
//! A run fans out one task per target language: translate, then (unless
//! skipped at creation) proofread in two steps. Tasks share nothing but
//! the store, so one language failing never touches the others.

pub mod orchestrator;
pub mod prompt;
pub mod proofread;
pub mod proposal;
pub mod translate;

pub use orchestrator::start_run;
pub use proposal::parse_proposal;

use std::sync::Arc;

use crate::db::{DatabaseError, RetryPolicy, Store};
use crate::gateway::{GatewayError, TextGenerator};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Generation failed: {0}")]
    Gateway(#[from] GatewayError),
}

/// Shared dependencies for the pipeline runners. Cheap to clone; each
/// spawned language task carries its own copy.
#[derive(Clone)]
pub struct PipelineContext {
    pub store: Store,
    pub generator: Arc<dyn TextGenerator>,
    pub retry: RetryPolicy,
}
