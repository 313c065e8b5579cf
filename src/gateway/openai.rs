use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Generation, GenerationRequest, GatewayError, TextGenerator};

/// Client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        }
    }

    fn build_body(&self, request: &GenerationRequest) -> Value {
        let mut messages = vec![json!({
            "role": "system",
            "content": request.instruction,
        })];
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

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": request.stream,
        });
        // Without this the final stream chunk carries no usage block
        if request.stream {
            body["stream_options"] = json!({ "include_usage": true });
        }
        body
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
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::ResponseParsing(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(GatewayError::EmptyResponse);
        }

        Ok(Generation {
            text,
            output_tokens: parsed.usage.and_then(|u| u.completion_tokens),
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

/// Fold one SSE line into the accumulated result. Malformed lines are
/// skipped; the stream carries keep-alives and comments we don't need.
fn absorb_stream_line(line: &str, text: &mut String, output_tokens: &mut Option<i64>) {
    let Some(data) = line.trim().strip_prefix("data: ") else {
        return;
    };
    if data == "[DONE]" {
        return;
    }
    let Ok(event) = serde_json::from_str::<Value>(data) else {
        return;
    };

    if let Some(delta) = event["choices"][0]["delta"]["content"].as_str() {
        text.push_str(delta);
    }
    if let Some(tokens) = event["usage"]["completion_tokens"].as_i64() {
        *output_tokens = Some(tokens);
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GatewayError> {
        if request.stream {
            self.generate_streaming(&request).await
        } else {
            self.generate_plain(&request).await
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    completion_tokens: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ChatTurn;

    fn test_client() -> OpenAiClient {
        OpenAiClient::new("http://localhost:8080/", "sk-test", 60)
    }

    #[test]
    fn constructor_trims_trailing_slash() {
        assert_eq!(test_client().base_url, "http://localhost:8080");
    }

    #[test]
    fn body_places_instruction_first_and_input_last() {
        let request = GenerationRequest::new("gpt-4o-mini", "translate", "hello")
            .with_history(vec![
                ChatTurn::user("earlier question"),
                ChatTurn::assistant("earlier answer"),
            ]);
        let body = test_client().build_body(&request);

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "translate");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["role"], "user");
        assert_eq!(messages[3]["content"], "hello");
        assert_eq!(body["stream"], false);
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn streamed_body_requests_usage() {
        let request = GenerationRequest::new("gpt-4o-mini", "i", "x").streamed();
        let body = test_client().build_body(&request);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
    }

    #[test]
    fn stream_lines_accumulate_deltas_and_usage() {
        let mut text = String::new();
        let mut tokens = None;

        absorb_stream_line(
            r#"data: {"choices":[{"delta":{"content":"Hola"}}]}"#,
            &mut text,
            &mut tokens,
        );
        absorb_stream_line(
            r#"data: {"choices":[{"delta":{"content":" mundo"}}]}"#,
            &mut text,
            &mut tokens,
        );
        absorb_stream_line(
            r#"data: {"choices":[],"usage":{"completion_tokens":12}}"#,
            &mut text,
            &mut tokens,
        );
        absorb_stream_line("data: [DONE]", &mut text, &mut tokens);

        assert_eq!(text, "Hola mundo");
        assert_eq!(tokens, Some(12));
    }

    #[test]
    fn malformed_stream_lines_are_skipped() {
        let mut text = String::new();
        let mut tokens = None;

        absorb_stream_line("", &mut text, &mut tokens);
        absorb_stream_line(": keep-alive", &mut text, &mut tokens);
        absorb_stream_line("data: {not json", &mut text, &mut tokens);

        assert!(text.is_empty());
        assert!(tokens.is_none());
    }
}
