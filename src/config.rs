use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Linguara";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Model used when a trigger request does not name one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Per-request timeout for generation calls. Translations of long
/// documents stream for minutes; this bounds a hung connection, not a
/// slow one.
pub const GENERATION_TIMEOUT_SECS: u64 = 300;

/// Output token cap passed to providers that require one.
pub const MAX_OUTPUT_TOKENS: u32 = 8192;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Get the application data directory
/// ~/Linguara/ on all platforms (user-visible)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Linguara")
}

/// Database file location; `LINGUARA_DB` overrides the default.
pub fn database_path() -> PathBuf {
    match std::env::var("LINGUARA_DB") {
        Ok(path) => PathBuf::from(path),
        Err(_) => app_data_dir().join("linguara.db"),
    }
}

pub fn bind_addr() -> String {
    std::env::var("LINGUARA_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
}

pub fn default_model() -> String {
    std::env::var("LINGUARA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string())
}

pub fn openai_base_url() -> String {
    std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string())
}

/// Empty when unset; provider calls will fail with an auth error, which
/// the records surface as a failed phase.
pub fn openai_api_key() -> String {
    std::env::var("OPENAI_API_KEY").unwrap_or_default()
}

pub fn anthropic_base_url() -> String {
    std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_ANTHROPIC_BASE_URL.to_string())
}

pub fn anthropic_api_key() -> String {
    std::env::var("ANTHROPIC_API_KEY").unwrap_or_default()
}

/// Filter applied when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,linguara=debug"
}
