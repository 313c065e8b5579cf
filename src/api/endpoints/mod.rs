//! API endpoint handlers.
//!
//! One module per resource. Handlers validate at the boundary, then call
//! the repository through the retry layer or hand off to the pipeline.

pub mod documents;
pub mod health;
pub mod languages;
pub mod translate;

use uuid::Uuid;

use crate::api::error::ApiError;

/// Parse a path segment as a UUID, naming the field in the 400 message.
fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {what}: {raw}")))
}
