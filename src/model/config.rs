//! Candidate model configuration

use std::env;

/// Configuration for one candidate model.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    /// Model identifier as sent to the API.
    pub id: String,
    /// Whether to request the reasoning sub-stream. Not every model
    /// supports it; a candidate that rejects the request shape is skipped
    /// rather than retried.
    pub thinking: bool,
    /// Output token budget for the structured answer.
    pub max_output_tokens: u32,
}

impl ModelSpec {
    pub fn new(id: &str, thinking: bool) -> Self {
        Self {
            id: id.to_string(),
            thinking,
            max_output_tokens: 8192,
        }
    }
}

/// Ordered candidate list plus retry tuning for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Candidates in preference order: primary first, then fallback(s).
    pub candidates: Vec<ModelSpec>,
    /// Attempts per candidate for transient failures.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per attempt.
    pub initial_backoff_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            candidates: vec![
                ModelSpec::new("gemini-2.5-pro", true),
                ModelSpec::new("gemini-2.5-flash", false),
            ],
            max_attempts: 3,
            initial_backoff_ms: 1000,
        }
    }
}

impl OrchestratorConfig {
    /// Defaults, with `PIXELBOT_MODEL` / `PIXELBOT_FALLBACK_MODEL`
    /// overriding the candidate ids.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(id) = env::var("PIXELBOT_MODEL") {
            if !id.is_empty() {
                config.candidates[0].id = id;
            }
        }
        if let Ok(id) = env::var("PIXELBOT_FALLBACK_MODEL") {
            if !id.is_empty() {
                config.candidates[1].id = id;
            }
        }
        config
    }
}
