//! Candidate-model orchestration
//!
//! Drives an ordered list of candidate models through a streaming call.
//! Transient failures are retried on the same candidate with exponential
//! backoff; a rejected request shape skips straight to the next candidate;
//! a safety block becomes a refusal for the whole request; anything else
//! aborts the orchestration. The first candidate to stream any answer text
//! wins.

use futures::StreamExt;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::{PixelbotError, Result};
use crate::progress::ProgressReporter;

use super::{GenerateRequest, GenerativeClient, ModelError, OrchestratorConfig, StreamChunk};

/// How one orchestration run ended, short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A model streamed answer text; this is the sole candidate for
    /// structured parsing.
    Completed(String),
    /// The model's safety layer declined the request.
    Refused,
}

/// What one consumed stream produced.
struct Consumed {
    answer: String,
}

pub struct Orchestrator<'a> {
    client: &'a dyn GenerativeClient,
    config: &'a OrchestratorConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(client: &'a dyn GenerativeClient, config: &'a OrchestratorConfig) -> Self {
        Self { client, config }
    }

    /// Run the request against each candidate in order until one produces
    /// answer text. Progress notifications flow through `reporter` as
    /// thinking text accumulates; they are best-effort and never abort the
    /// run.
    pub async fn run(
        &self,
        request: &GenerateRequest,
        reporter: &mut ProgressReporter,
    ) -> Result<RunOutcome> {
        let mut last_failure = String::new();

        'candidates: for spec in &self.config.candidates {
            let mut attempt = 1;
            loop {
                debug!(
                    "Model {} attempt {} of {}",
                    spec.id, attempt, self.config.max_attempts
                );

                let result = match self.client.stream_generate(spec, request).await {
                    Ok(stream) => self.consume(stream, reporter).await,
                    Err(e) => Err(e),
                };

                match result {
                    Ok(consumed) if !consumed.answer.is_empty() => {
                        info!("Model {} answered on attempt {}", spec.id, attempt);
                        return Ok(RunOutcome::Completed(consumed.answer));
                    }
                    Ok(_) => {
                        // A thinking-only stream has nothing to parse.
                        warn!("Model {} completed without answer text", spec.id);
                        last_failure = format!("{}: empty answer", spec.id);
                        continue 'candidates;
                    }
                    Err(ModelError::Blocked(reason)) => {
                        info!("Model {} declined the request: {}", spec.id, reason);
                        return Ok(RunOutcome::Refused);
                    }
                    Err(ModelError::Transient(reason)) => {
                        warn!(
                            "Model {} attempt {} unavailable: {}",
                            spec.id, attempt, reason
                        );
                        last_failure = format!("{}: {reason}", spec.id);
                        if attempt >= self.config.max_attempts {
                            continue 'candidates;
                        }
                        self.backoff(attempt).await;
                        attempt += 1;
                    }
                    Err(ModelError::ConfigRejected(reason)) => {
                        // Not retryable on this candidate; the next one
                        // may accept the request shape.
                        warn!("Model {} rejected request shape: {}", spec.id, reason);
                        last_failure = format!("{}: {reason}", spec.id);
                        continue 'candidates;
                    }
                    Err(ModelError::Fatal(reason)) => {
                        return Err(PixelbotError::ModelApiError(format!(
                            "{}: {reason}",
                            spec.id
                        )));
                    }
                }
            }
        }

        Err(PixelbotError::ModelsExhausted(last_failure))
    }

    /// Consume one attempt's stream, separating the thinking channel from
    /// the answer channel and marking the thinking phase complete exactly
    /// once when answer content first appears.
    async fn consume(
        &self,
        mut stream: super::ChunkStream,
        reporter: &mut ProgressReporter,
    ) -> std::result::Result<Consumed, ModelError> {
        let mut thinking = String::new();
        let mut answer = String::new();
        let mut answer_started = false;

        while let Some(item) = stream.next().await {
            match item? {
                StreamChunk::Thinking(text) => {
                    thinking.push_str(&text);
                    if !answer_started {
                        reporter.note_thinking(&thinking).await;
                    }
                }
                StreamChunk::Answer(text) => {
                    if !answer_started {
                        answer_started = true;
                        reporter.note_thinking(&thinking).await;
                        reporter.begin_applying().await;
                    }
                    answer.push_str(&text);
                }
            }
        }

        Ok(Consumed { answer })
    }

    /// Attempt-indexed exponential backoff with jitter.
    async fn backoff(&self, attempt: u32) {
        let base = self.config.initial_backoff_ms.saturating_mul(1 << (attempt - 1));
        let jitter = 0.8 + 0.4 * rand::random::<f64>();
        let delay = Duration::from_millis((base as f64 * jitter) as u64);
        debug!("Backing off {:?} before retry", delay);
        tokio::time::sleep(delay).await;
    }
}
