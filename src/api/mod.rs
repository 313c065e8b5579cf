//! HTTP API.
//!
//! Exposes the document store, language reference data, run triggers,
//! and the status query under `/api/`. Triggers return `202 Accepted`
//! and hand the work to the pipeline; everything a client shows comes
//! from polling the status query afterwards.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{start_server, ApiServer};
pub use types::ApiContext;
