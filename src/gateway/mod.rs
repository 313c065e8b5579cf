pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Cannot reach model provider at {0}")]
    Connection(String),

    #[error("Generation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Provider returned a response with no text")]
    EmptyResponse,

    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("Failed to parse provider response: {0}")]
    ResponseParsing(String),
}

/// Role of one prior turn in a replayed conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One prior turn, sent verbatim ahead of the current input.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// One generation call. `history` carries earlier turns of a multi-step
/// exchange; providers replay them before `input`, the final user turn.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub instruction: String,
    pub history: Vec<ChatTurn>,
    pub input: String,
    pub stream: bool,
}

impl GenerationRequest {
    pub fn new(model: &str, instruction: &str, input: &str) -> Self {
        Self {
            model: model.to_string(),
            instruction: instruction.to_string(),
            history: Vec::new(),
            input: input.to_string(),
            stream: false,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn streamed(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Completed generation. `output_tokens` is absent when the provider
/// reported no usage.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub output_tokens: Option<i64>,
}

/// A text-generation backend. Implementations must return
/// [`GatewayError::EmptyResponse`] for a call that succeeds at the HTTP
/// level but yields no text, so callers can tell that apart from a
/// timeout.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GatewayError>;
}

/// Which provider serves a model id.
fn provider_name(model: &str) -> &'static str {
    if model.starts_with("claude") {
        "anthropic"
    } else {
        "openai"
    }
}

/// Routes each request to the provider that serves its model family.
/// Claude models go to the Anthropic client; everything else goes to the
/// OpenAI-compatible endpoint.
pub struct Gateway {
    openai: OpenAiClient,
    anthropic: AnthropicClient,
}

impl Gateway {
    pub fn new(openai: OpenAiClient, anthropic: AnthropicClient) -> Self {
        Self { openai, anthropic }
    }
}

#[async_trait]
impl TextGenerator for Gateway {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GatewayError> {
        match provider_name(&request.model) {
            "anthropic" => self.anthropic.generate(request).await,
            _ => self.openai.generate(request).await,
        }
    }
}

/// Mock generator for testing. Pops scripted replies in order and records
/// every request it sees. With no scripted replies left it falls back to a
/// configurable default, so fan-out tests don't have to script each of
/// their concurrently ordered calls.
pub struct MockGenerator {
    replies: std::sync::Mutex<std::collections::VecDeque<Generation>>,
    default_reply: String,
    fail_when: Option<String>,
    requests: std::sync::Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            replies: std::sync::Mutex::new(std::collections::VecDeque::new()),
            default_reply: "OK".to_string(),
            fail_when: None,
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Generation {
            text: text.to_string(),
            output_tokens: Some(7),
        });
        self
    }

    pub fn with_default_reply(mut self, text: &str) -> Self {
        self.default_reply = text.to_string();
        self
    }

    /// Fail any call whose instruction or input contains `needle`.
    pub fn failing_when(mut self, needle: &str) -> Self {
        self.fail_when = Some(needle.to_string());
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(needle) = &self.fail_when {
            if request.instruction.contains(needle) || request.input.contains(needle) {
                return Err(GatewayError::Provider {
                    status: 500,
                    body: "scripted failure".to_string(),
                });
            }
        }

        match self.replies.lock().unwrap().pop_front() {
            Some(generation) => Ok(generation),
            None => Ok(Generation {
                text: self.default_reply.clone(),
                output_tokens: Some(3),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_models_route_to_anthropic() {
        assert_eq!(provider_name("claude-3-5-haiku-20241022"), "anthropic");
        assert_eq!(provider_name("gpt-4o-mini"), "openai");
        assert_eq!(provider_name("llama3:8b"), "openai");
    }

    #[test]
    fn request_builder_defaults() {
        let request = GenerationRequest::new("gpt-4o-mini", "translate", "hello");
        assert!(request.history.is_empty());
        assert!(!request.stream);

        let streamed = request.streamed();
        assert!(streamed.stream);
    }

    #[test]
    fn chat_turn_constructors() {
        let turn = ChatTurn::user("hi");
        assert_eq!(turn.role, ChatRole::User);
        assert_eq!(ChatTurn::assistant("yo").role.as_str(), "assistant");
    }

    #[tokio::test]
    async fn mock_pops_scripted_replies_then_falls_back() {
        let mock = MockGenerator::new()
            .with_reply("first")
            .with_default_reply("fallback");

        let request = GenerationRequest::new("m", "i", "x");
        let first = mock.generate(request.clone()).await.unwrap();
        assert_eq!(first.text, "first");
        let second = mock.generate(request).await.unwrap();
        assert_eq!(second.text, "fallback");
    }

    #[tokio::test]
    async fn mock_fails_on_matching_needle() {
        let mock = MockGenerator::new().failing_when("French");

        let bad = GenerationRequest::new("m", "Translate into French", "x");
        assert!(mock.generate(bad).await.is_err());

        let good = GenerationRequest::new("m", "Translate into Spanish", "x");
        assert!(mock.generate(good).await.is_ok());
    }

    #[tokio::test]
    async fn mock_records_requests() {
        let mock = MockGenerator::new();
        let request = GenerationRequest::new("m", "i", "body")
            .with_history(vec![ChatTurn::user("earlier")]);
        mock.generate(request).await.unwrap();

        let seen = mock.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].history.len(), 1);
        assert_eq!(seen[0].input, "body");
    }
}
