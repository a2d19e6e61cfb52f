//! Generative model channel
//!
//! The model is an untrusted, fallible black box: it receives system
//! instructions, an optional reference image of the current canvas, and the
//! user's prompt, and streams back text chunks tagged as either reasoning
//! ("thinking") or payload ("answer"). Failures are classified structurally
//! so the orchestrator can decide between retry, fallback, and abort
//! without sniffing error strings.

mod config;
mod gemini;
mod orchestrator;

pub use config::{ModelSpec, OrchestratorConfig};
pub use gemini::GeminiClient;
pub use orchestrator::{Orchestrator, RunOutcome};

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

/// One streamed fragment of a model response, tagged by logical channel.
///
/// Thinking text is diagnostic only and is never parsed as data; answer
/// text accumulates into the sole candidate for structured parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Thinking(String),
    Answer(String),
}

/// Typed failure classes for the model channel.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// Service-unavailable class; worth retrying with backoff.
    #[error("model temporarily unavailable: {0}")]
    Transient(String),

    /// The model rejected the request shape; retrying is pointless, but a
    /// differently configured candidate may accept it.
    #[error("request configuration rejected: {0}")]
    ConfigRejected(String),

    /// The model's safety layer refused the prompt or the response.
    #[error("blocked by the model: {0}")]
    Blocked(String),

    /// Anything else; aborts the whole orchestration.
    #[error("model call failed: {0}")]
    Fatal(String),
}

/// Stream of tagged chunks from one model attempt.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ModelError>> + Send>>;

/// Request handed to the model channel.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// System instructions: canvas dimensions, palette, response schema.
    pub system: String,
    /// The requester's free text.
    pub prompt: String,
    /// Pre-rendered PNG of the current canvas, when the integration
    /// supplies one.
    pub reference_png: Option<Vec<u8>>,
}

/// A client able to stream one generation attempt for a candidate model.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn stream_generate(
        &self,
        spec: &ModelSpec,
        request: &GenerateRequest,
    ) -> Result<ChunkStream, ModelError>;
}
