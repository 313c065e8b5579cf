//! Document CRUD endpoints plus the per-document status query.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CreateDocumentRequest, DocumentListResponse, OutputListResponse};
use crate::db::{repository, with_retry, DatabaseError};
use crate::models::Document;

use super::parse_uuid;

/// `POST /api/documents` — register a source document.
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(payload): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("Title must not be empty".into()));
    }
    if payload.source_text.trim().is_empty() {
        return Err(ApiError::BadRequest("Source text must not be empty".into()));
    }

    let document = Document::new(title, &payload.source_text, payload.source_language.clone());
    with_retry(&ctx.pipeline.retry, "insert_document", || {
        let conn = ctx.store().connect()?;
        repository::insert_document(&conn, &document)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(document)))
}

/// `GET /api/documents` — all documents, newest first.
pub async fn list(
    State(ctx): State<ApiContext>,
) -> Result<Json<DocumentListResponse>, ApiError> {
    let documents = with_retry(&ctx.pipeline.retry, "list_documents", || {
        let conn = ctx.store().connect()?;
        repository::list_documents(&conn)
    })
    .await?;

    Ok(Json(DocumentListResponse { documents }))
}

/// `GET /api/documents/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let id = parse_uuid(&id, "document id")?;
    let document = with_retry(&ctx.pipeline.retry, "get_document", || {
        let conn = ctx.store().connect()?;
        repository::get_document(&conn, &id)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Document {id} not found")))?;

    Ok(Json(document))
}

/// `DELETE /api/documents/:id` — removes the document and, through the
/// schema cascade, all of its output records.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_uuid(&id, "document id")?;
    with_retry(&ctx.pipeline.retry, "delete_document", || {
        let conn = ctx.store().connect()?;
        repository::delete_document(&conn, &id)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/documents/:id/outputs` — the full record set polling clients
/// work from. An unknown document is a 404, distinct from a document with
/// no records yet.
pub async fn outputs(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<OutputListResponse>, ApiError> {
    let id = parse_uuid(&id, "document id")?;
    let outputs = with_retry(&ctx.pipeline.retry, "get_outputs_for_document", || {
        let conn = ctx.store().connect()?;
        if repository::get_document(&conn, &id)?.is_none() {
            return Err(DatabaseError::NotFound {
                entity_type: "Document".into(),
                id: id.to_string(),
            });
        }
        repository::get_outputs_for_document(&conn, &id)
    })
    .await?;

    Ok(Json(OutputListResponse { outputs }))
}
