//! KoboldCpp client implementation.
//!
//! Talks to a KoboldCpp-style server:
//! - `GET  /api/extra/true_max_context_length` for the context window
//! - `POST /api/extra/generate/stream` for streaming generation (SSE)
//!
//! Fragments arrive as `data: {"token": "..."}` message events. The stream
//! is finite and not restartable; dropping the receiver cancels it.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use textmill_core::client::{FragmentStream, GenerateRequest, ModelClient};
use textmill_core::error::StreamError;
use tracing::{debug, trace, warn};

/// A client for a KoboldCpp-compatible generation server.
pub struct KoboldClient {
    base_url: String,
    api_password: Option<String>,
    client: reqwest::Client,
}

impl KoboldClient {
    /// Create a new client for the given base URL.
    ///
    /// The optional password is passed through as a bearer credential on
    /// every request; no other auth logic is applied.
    pub fn new(base_url: impl Into<String>, api_password: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(600))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_password,
            client,
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_password {
            Some(password) => builder.bearer_auth(password),
            None => builder,
        }
    }

    fn map_transport_error(e: reqwest::Error) -> StreamError {
        if e.is_timeout() {
            StreamError::Timeout(e.to_string())
        } else {
            StreamError::Network(e.to_string())
        }
    }

    fn to_api_body(request: &GenerateRequest) -> serde_json::Value {
        serde_json::json!({
            "prompt": request.prompt,
            "max_length": request.max_length,
            "temperature": request.params.temperature,
            "top_k": request.params.top_k,
            "top_p": request.params.top_p,
            "rep_pen": request.params.rep_pen,
            "min_p": request.params.min_p,
            "text_completion": request.text_completion,
            "quiet": true,
        })
    }
}

#[async_trait]
impl ModelClient for KoboldClient {
    fn name(&self) -> &str {
        "koboldcpp"
    }

    async fn max_context_length(&self) -> Result<i64, StreamError> {
        let url = format!("{}/api/extra/true_max_context_length", self.base_url);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(StreamError::AuthenticationFailed(
                "Invalid API password".into(),
            ));
        }
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::ApiError {
                status_code: status,
                message: body,
            });
        }

        let value: MaxContextResponse = response
            .json()
            .await
            .map_err(|e| StreamError::ApiError {
                status_code: 200,
                message: format!("Failed to parse context length response: {e}"),
            })?;

        debug!(context_length = value.value, "Server reported context length");
        Ok(value.value)
    }

    async fn stream_generate(
        &self,
        request: GenerateRequest,
    ) -> Result<FragmentStream, StreamError> {
        let url = format!("{}/api/extra/generate/stream", self.base_url);
        let body = Self::to_api_body(&request);

        debug!(
            max_length = request.max_length,
            prompt_chars = request.prompt.len(),
            "Sending streaming generation request"
        );

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(StreamError::AuthenticationFailed(
                "Invalid API password".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Server returned streaming error");
            return Err(StreamError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(forward_fragments(response.bytes_stream(), tx));

        Ok(rx)
    }
}

/// Read an SSE byte stream and forward token fragments into the channel.
///
/// Runs until the stream ends, the server signals a finish reason, or the
/// receiver is dropped. A dropped receiver stops consumption without
/// draining the rest of the stream. Lines may be split across byte chunks;
/// the buffer reassembles them.
async fn forward_fragments<S, E>(
    mut byte_stream: S,
    tx: tokio::sync::mpsc::Sender<Result<String, StreamError>>,
) where
    S: futures::Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut buffer = String::new();

    while let Some(chunk_result) = byte_stream.next().await {
        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                let _ = tx.send(Err(StreamError::Interrupted(e.to_string()))).await;
                return;
            }
        };

        buffer.push_str(&String::from_utf8_lossy(&bytes));

        // Process complete lines
        while let Some(line_end) = buffer.find('\n') {
            let line = buffer[..line_end].trim_end_matches('\r').to_string();
            buffer = buffer[line_end + 1..].to_string();

            // Skip empty lines, SSE comments, and event-name lines
            if line.is_empty() || line.starts_with(':') || line.starts_with("event:") {
                continue;
            }

            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };

            match serde_json::from_str::<TokenEvent>(data.trim()) {
                Ok(event) => {
                    if !event.token.is_empty() && tx.send(Ok(event.token)).await.is_err() {
                        return; // receiver dropped, stop reading
                    }
                    if event.finish_reason.is_some() {
                        return;
                    }
                }
                Err(e) => {
                    trace!(data = %data, error = %e, "Ignoring unparseable SSE event");
                }
            }
        }
    }
}

// --- KoboldCpp API types (internal) ---

#[derive(Debug, Deserialize)]
struct MaxContextResponse {
    value: i64,
}

/// A single SSE `data: {...}` token event.
#[derive(Debug, Deserialize)]
struct TokenEvent {
    #[serde(default)]
    token: String,

    #[serde(default)]
    finish_reason: Option<String>,
}
