//! HTTP router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Handlers take `State<ApiContext>`; the context carries the store, the
//! generator, and the retry policy, so integration tests can run the
//! whole surface in process with `tower::ServiceExt::oneshot`.

use axum::routing::get;
use axum::Router;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the API router.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(ctx: ApiContext) -> Router {
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/documents",
            get(endpoints::documents::list).post(endpoints::documents::create),
        )
        .route(
            "/documents/:id",
            get(endpoints::documents::detail).delete(endpoints::documents::remove),
        )
        .route("/documents/:id/outputs", get(endpoints::documents::outputs))
        .route(
            "/documents/:id/translate",
            axum::routing::post(endpoints::translate::start),
        )
        .route(
            "/documents/:id/translate/:language",
            axum::routing::post(endpoints::translate::rerun),
        )
        .route("/languages", get(endpoints::languages::list))
        .with_state(ctx);

    Router::new().nest("/api", routes)
}
