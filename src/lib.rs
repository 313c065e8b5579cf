pub mod api;
pub mod config;
pub mod db;
pub mod gateway;
pub mod models;
pub mod pipeline;
pub mod poller;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use api::ApiContext;
use db::{RetryPolicy, Store};
use gateway::{AnthropicClient, Gateway, OpenAiClient};
use pipeline::PipelineContext;

/// Wire the store, the provider gateway, and the HTTP server, then run
/// until interrupted.
pub async fn run() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let db_path = config::database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Cannot create data directory: {e}"))?;
    }
    let store = Store::open(&db_path).map_err(|e| format!("Cannot open database: {e}"))?;
    tracing::info!(path = %db_path.display(), "Database ready");

    let gateway = Gateway::new(
        OpenAiClient::new(
            &config::openai_base_url(),
            &config::openai_api_key(),
            config::GENERATION_TIMEOUT_SECS,
        ),
        AnthropicClient::new(
            &config::anthropic_base_url(),
            &config::anthropic_api_key(),
            config::GENERATION_TIMEOUT_SECS,
            config::MAX_OUTPUT_TOKENS,
        ),
    );

    let pipeline = PipelineContext {
        store,
        generator: Arc::new(gateway),
        retry: RetryPolicy::default(),
    };
    let ctx = ApiContext::new(pipeline, config::default_model());

    let mut server = api::start_server(ctx, &config::bind_addr()).await?;
    tracing::info!(addr = %server.addr, "Ready");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Signal handling failed: {e}"))?;
    tracing::info!("Interrupt received, shutting down");
    server.shutdown();

    Ok(())
}
