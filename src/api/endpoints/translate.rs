//! Run triggers: fan-out and single-language rerun.
//!
//! Both validate their inputs, replace the records, spawn the language
//! tasks, and return `202 Accepted` right away. Phase outcomes land in
//! the records; clients follow them through the status query.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, RerunRequest, RunAccepted, TranslateRequest};
use crate::db::{repository, with_retry};
use crate::models::{Language, OutputRecord};
use crate::pipeline::start_run;

use super::parse_uuid;

/// `POST /api/documents/:id/translate` — start a run over a set of
/// target languages.
pub async fn start(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(payload): Json<TranslateRequest>,
) -> Result<(StatusCode, Json<RunAccepted>), ApiError> {
    let id = parse_uuid(&id, "document id")?;
    if payload.languages.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one language code is required".into(),
        ));
    }

    // Duplicate codes would race each other for the same record slot.
    let mut codes: Vec<String> = Vec::with_capacity(payload.languages.len());
    for code in &payload.languages {
        if !codes.contains(code) {
            codes.push(code.clone());
        }
    }

    let (document, resolved) = with_retry(&ctx.pipeline.retry, "resolve_run_inputs", || {
        let conn = ctx.store().connect()?;
        let document = repository::get_document(&conn, &id)?;
        let mut resolved = Vec::with_capacity(codes.len());
        for code in &codes {
            resolved.push(repository::get_language(&conn, code)?);
        }
        Ok((document, resolved))
    })
    .await?;

    let document =
        document.ok_or_else(|| ApiError::NotFound(format!("Document {id} not found")))?;
    let mut languages: Vec<Language> = Vec::with_capacity(resolved.len());
    for (code, language) in codes.iter().zip(resolved) {
        languages.push(
            language
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown language code: {code}")))?,
        );
    }

    let model = payload
        .model
        .clone()
        .unwrap_or_else(|| ctx.default_model.clone());
    let records = start_run(
        &ctx.pipeline,
        document,
        languages,
        &model,
        payload.proofread,
        payload.instruction,
    )
    .await?;

    Ok((StatusCode::ACCEPTED, Json(accepted(&records))))
}

/// `POST /api/documents/:id/translate/:language` — rerun one language.
/// Same replace-then-spawn path as the fan-out, with a one-element list.
pub async fn rerun(
    State(ctx): State<ApiContext>,
    Path((id, code)): Path<(String, String)>,
    body: Option<Json<RerunRequest>>,
) -> Result<(StatusCode, Json<RunAccepted>), ApiError> {
    let id = parse_uuid(&id, "document id")?;
    let body = RerunRequest::or_defaults(body.map(|Json(b)| b));

    let (document, language) = with_retry(&ctx.pipeline.retry, "resolve_rerun_inputs", || {
        let conn = ctx.store().connect()?;
        Ok((
            repository::get_document(&conn, &id)?,
            repository::get_language(&conn, &code)?,
        ))
    })
    .await?;

    let document =
        document.ok_or_else(|| ApiError::NotFound(format!("Document {id} not found")))?;
    let language =
        language.ok_or_else(|| ApiError::BadRequest(format!("Unknown language code: {code}")))?;

    let model = body.model.unwrap_or_else(|| ctx.default_model.clone());
    let records = start_run(
        &ctx.pipeline,
        document,
        vec![language],
        &model,
        body.proofread,
        body.instruction,
    )
    .await?;

    Ok((StatusCode::ACCEPTED, Json(accepted(&records))))
}

fn accepted(records: &[OutputRecord]) -> RunAccepted {
    RunAccepted {
        record_ids: records.iter().map(|r| r.id).collect(),
    }
}
