use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Generation, GenerationRequest, GatewayError, TextGenerator};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    timeout_secs: u64,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64, max_tokens: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
            max_tokens,
        }
    }

    // The Messages API takes the instruction as a top-level system field,
    // not as a message.
    fn build_body(&self, request: &GenerationRequest) -> Value {
        let mut messages = Vec::new();
        for turn in &request.history {
            messages.push(json!({
                "role": turn.role.as_str(),
                "content": turn.content,
            }));
        }
        messages.push(json!({
            "role": "user",
            "content": request.input,
        }));

        json!({
            "model": request.model,
            "max_tokens": self.max_tokens,
            "system": request.instruction,
            "messages": messages,
            "stream": request.stream,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout {
                seconds: self.timeout_secs,
            }
        } else if e.is_connect() {
            GatewayError::Connection(self.base_url.clone())
        } else {
            GatewayError::Http(e.to_string())
        }
    }

    async fn send(&self, request: &GenerationRequest) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Provider {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn generate_plain(
        &self,
        request: &GenerationRequest,
    ) -> Result<Generation, GatewayError> {
        let response = self.send(request).await?;

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::ResponseParsing(e.to_string()))?;

        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(GatewayError::EmptyResponse);
        }

        Ok(Generation {
            text,
            output_tokens: parsed.usage.and_then(|u| u.output_tokens),
        })
    }

    async fn generate_streaming(
        &self,
        request: &GenerationRequest,
    ) -> Result<Generation, GatewayError> {
        let response = self.send(request).await?;

        let mut text = String::new();
        let mut output_tokens = None;
        let mut buffer = String::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.map_send_error(e))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].to_string();
                buffer = buffer[line_end + 1..].to_string();
                absorb_stream_line(&line, &mut text, &mut output_tokens);
            }
        }
        absorb_stream_line(&buffer, &mut text, &mut output_tokens);

        if text.is_empty() {
            return Err(GatewayError::EmptyResponse);
        }
        Ok(Generation {
            text,
            output_tokens,
        })
    }
}

/// Fold one SSE line into the accumulated result. Text arrives in
/// content_block_delta events; usage arrives in the closing message_delta.
fn absorb_stream_line(line: &str, text: &mut String, output_tokens: &mut Option<i64>) {
    let Some(data) = line.trim().strip_prefix("data: ") else {
        return;
    };
    let Ok(event) = serde_json::from_str::<Value>(data) else {
        return;
    };

    match event["type"].as_str() {
        Some("content_block_delta") => {
            if let Some(delta) = event["delta"]["text"].as_str() {
                text.push_str(delta);
            }
        }
        Some("message_delta") => {
            if let Some(tokens) = event["usage"]["output_tokens"].as_i64() {
                *output_tokens = Some(tokens);
            }
        }
        _ => {}
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GatewayError> {
        if request.stream {
            self.generate_streaming(&request).await
        } else {
            self.generate_plain(&request).await
        }
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<MessagesUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct MessagesUsage {
    output_tokens: Option<i64>,
}
