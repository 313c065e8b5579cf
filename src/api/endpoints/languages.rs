//! Language reference data endpoint.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, LanguageListResponse};
use crate::db::{repository, with_retry};

/// `GET /api/languages` — the seeded target languages, sorted by name.
pub async fn list(
    State(ctx): State<ApiContext>,
) -> Result<Json<LanguageListResponse>, ApiError> {
    let languages = with_retry(&ctx.pipeline.retry, "list_languages", || {
        let conn = ctx.store().connect()?;
        repository::list_languages(&conn)
    })
    .await?;

    Ok(Json(LanguageListResponse { languages }))
}
