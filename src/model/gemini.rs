//! Google Generative Language streaming client
//!
//! Calls `models/{id}:streamGenerateContent?alt=sse` and maps the SSE
//! stream onto tagged [`StreamChunk`]s: parts flagged `thought` feed the
//! thinking channel, plain parts feed the answer channel. HTTP failures are
//! classified structurally by status code, never by error-text matching.

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::{ChunkStream, GenerateRequest, GenerativeClient, ModelError, ModelSpec, StreamChunk};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const USER_AGENT: &str = concat!("pixelbot/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the Generative Language API.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, timeout_seconds: u64) -> Result<Self, ModelError> {
        if api_key.is_empty() {
            return Err(ModelError::Fatal("empty API key".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ModelError::Fatal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
        })
    }

    fn endpoint_url(&self, model_id: &str) -> String {
        format!("{BASE_URL}/models/{model_id}:streamGenerateContent?alt=sse&key={}", self.api_key)
    }

    fn build_body(spec: &ModelSpec, request: &GenerateRequest) -> serde_json::Value {
        let mut parts = vec![json!({ "text": request.prompt })];
        if let Some(png) = &request.reference_png {
            parts.push(json!({
                "inline_data": {
                    "mime_type": "image/png",
                    "data": base64::engine::general_purpose::STANDARD.encode(png),
                }
            }));
        }

        let mut generation_config = json!({
            "maxOutputTokens": spec.max_output_tokens,
            "responseMimeType": "application/json",
        });
        if spec.thinking {
            generation_config["thinkingConfig"] = json!({ "includeThoughts": true });
        }

        json!({
            "systemInstruction": { "parts": [{ "text": request.system }] },
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": generation_config,
        })
    }
}

fn classify_status(status: StatusCode, body: &str) -> ModelError {
    match status.as_u16() {
        429 | 500..=504 => ModelError::Transient(format!("{status}: {body}")),
        400 => ModelError::ConfigRejected(format!("{status}: {body}")),
        _ => ModelError::Fatal(format!("{status}: {body}")),
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn stream_generate(
        &self,
        spec: &ModelSpec,
        request: &GenerateRequest,
    ) -> Result<ChunkStream, ModelError> {
        let url = self.endpoint_url(&spec.id);
        let body = Self::build_body(spec, request);

        debug!("Streaming generation from model {}", spec.id);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ModelError::Transient(e.to_string())
                } else {
                    ModelError::Fatal(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Model {} returned {}", spec.id, status);
            return Err(classify_status(status, &text));
        }

        let mut bytes = response.bytes_stream();

        let output = stream! {
            let mut buffer = String::new();

            while let Some(chunk_result) = bytes.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        buffer.push_str(&String::from_utf8_lossy(&chunk));

                        // Process complete SSE events
                        while let Some(pos) = buffer.find("\n\n") {
                            let event = buffer[..pos].to_string();
                            buffer = buffer[pos + 2..].to_string();

                            for item in parse_sse_event(&event) {
                                yield item;
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(ModelError::Transient(e.to_string()));
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(output))
    }
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(default, rename = "blockReason")]
    block_reason: Option<String>,
}

fn parse_sse_event(event: &str) -> Vec<Result<StreamChunk, ModelError>> {
    let mut data = None;
    for line in event.lines() {
        if let Some(value) = line.strip_prefix("data: ") {
            data = Some(value);
        }
    }
    let Some(data) = data else {
        return Vec::new();
    };

    let Ok(response) = serde_json::from_str::<StreamResponse>(data) else {
        return Vec::new();
    };

    if let Some(feedback) = &response.prompt_feedback {
        if let Some(reason) = &feedback.block_reason {
            return vec![Err(ModelError::Blocked(format!("prompt blocked: {reason}")))];
        }
    }

    let mut items = Vec::new();
    for candidate in &response.candidates {
        if matches!(
            candidate.finish_reason.as_deref(),
            Some("SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST")
        ) {
            items.push(Err(ModelError::Blocked(format!(
                "response blocked: {}",
                candidate.finish_reason.as_deref().unwrap_or_default()
            ))));
            continue;
        }

        let Some(content) = &candidate.content else {
            continue;
        };
        for part in &content.parts {
            if let Some(text) = &part.text {
                if text.is_empty() {
                    continue;
                }
                let chunk = if part.thought {
                    StreamChunk::Thinking(text.clone())
                } else {
                    StreamChunk::Answer(text.clone())
                };
                items.push(Ok(chunk));
            }
        }
    }
    items
}
