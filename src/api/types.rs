//! Shared types for the API layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Store;
use crate::models::{Document, Language, OutputRecord};
use crate::pipeline::PipelineContext;

/// Shared state for all API routes: the pipeline dependencies plus the
/// model used when a trigger omits one.
#[derive(Clone)]
pub struct ApiContext {
    pub pipeline: PipelineContext,
    pub default_model: String,
}

impl ApiContext {
    pub fn new(pipeline: PipelineContext, default_model: impl Into<String>) -> Self {
        Self {
            pipeline,
            default_model: default_model.into(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.pipeline.store
    }
}

// ─── Request bodies ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub source_text: String,
    #[serde(default)]
    pub source_language: Option<String>,
}

/// Body for the fan-out trigger.
#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    /// Target language codes, one record per entry.
    pub languages: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Replaces the built-in phase instructions when present.
    #[serde(default)]
    pub instruction: Option<String>,
    /// Set to `false` to mark proofreading skipped at creation.
    #[serde(default = "default_true")]
    pub proofread: bool,
}

/// Body for the single-language rerun. The whole body may be omitted.
#[derive(Debug, Deserialize)]
pub struct RerunRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default = "default_true")]
    pub proofread: bool,
}

fn default_true() -> bool {
    true
}

impl RerunRequest {
    /// An omitted body keeps proofreading on.
    pub fn or_defaults(body: Option<Self>) -> Self {
        body.unwrap_or(Self {
            model: None,
            instruction: None,
            proofread: true,
        })
    }
}

// ─── Response bodies ─────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<Document>,
}

#[derive(Debug, Serialize)]
pub struct LanguageListResponse {
    pub languages: Vec<Language>,
}

#[derive(Debug, Serialize)]
pub struct OutputListResponse {
    pub outputs: Vec<OutputRecord>,
}

/// Returned by both triggers with `202 Accepted`: the ids of the freshly
/// created records, for the client to poll.
#[derive(Debug, Serialize)]
pub struct RunAccepted {
    pub record_ids: Vec<Uuid>,
}
