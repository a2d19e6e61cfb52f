//! Progress reporting side-channel
//!
//! One externally visible comment per natural-language request, created as
//! a placeholder and edited in place as the model streams. Every operation
//! here is best-effort: a progress failure is logged and swallowed, never
//! propagated into the pipeline outcome.

mod github;

pub use github::GithubCommentChannel;

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use tracing::warn;

use crate::errors::Result;

/// Minimum gap between cadence-limited updates while thinking streams.
const UPDATE_INTERVAL: Duration = Duration::from_secs(2);

/// External channel holding the mutable progress message.
#[async_trait]
pub trait ProgressChannel: Send + Sync {
    /// Create the message; returns an opaque handle.
    async fn create(&self, body: &str) -> Result<u64>;

    /// Replace the message body.
    async fn update(&self, id: u64, body: &str) -> Result<()>;
}

/// Visible phase of the progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Thinking,
    Applying,
    Done,
}

/// Publishes and edits the single progress message for one request.
///
/// With no channel configured every call is a no-op, so callers never need
/// to branch on availability.
pub struct ProgressReporter {
    channel: Option<Box<dyn ProgressChannel>>,
    message_id: Option<u64>,
    thinking: String,
    phase: Phase,
    last_publish: Option<Instant>,
}

impl ProgressReporter {
    pub fn new(channel: Option<Box<dyn ProgressChannel>>) -> Self {
        Self {
            channel,
            message_id: None,
            thinking: String::new(),
            phase: Phase::Thinking,
            last_publish: None,
        }
    }

    /// A reporter with no external channel; all operations are no-ops.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Full thinking text gathered so far, unsanitized.
    pub fn thinking_text(&self) -> &str {
        &self.thinking
    }

    /// Create the placeholder message. Without a configured channel, or if
    /// creation fails, subsequent updates silently do nothing.
    pub async fn open(&mut self) {
        let Some(channel) = &self.channel else {
            return;
        };
        match channel.create("\u{1f9e0} Thinking\u{2026}").await {
            Ok(id) => self.message_id = Some(id),
            Err(e) => warn!("Failed to create progress message: {e}"),
        }
    }

    /// Record accumulated thinking text and republish it on a bounded
    /// cadence. `full_text` replaces what was previously gathered; the
    /// visible message is replaced wholesale, not appended to.
    pub async fn note_thinking(&mut self, full_text: &str) {
        self.thinking = full_text.to_string();
        if self.phase != Phase::Thinking {
            return;
        }
        if let Some(last) = self.last_publish {
            if last.elapsed() < UPDATE_INTERVAL {
                return;
            }
        }
        self.publish("\u{1f9e0} Thinking\u{2026}").await;
    }

    /// Transition the visible phase from thinking to applying, exactly
    /// once, carrying the complete thinking text gathered so far. Fires
    /// immediately, outside the cadence limit.
    pub async fn begin_applying(&mut self) {
        if self.phase != Phase::Thinking {
            return;
        }
        self.phase = Phase::Applying;
        self.publish("\u{1f58c}\u{fe0f} Applying changes\u{2026}").await;
    }

    /// Publish the terminal message for this request. Not cadence-limited.
    pub async fn finish(&mut self, message: &str) {
        if self.phase == Phase::Done {
            return;
        }
        self.phase = Phase::Done;
        self.publish(message).await;
    }

    async fn publish(&mut self, headline: &str) {
        let (Some(channel), Some(id)) = (&self.channel, self.message_id) else {
            return;
        };
        let body = render_body(headline, &self.thinking);
        match channel.update(id, &body).await {
            Ok(()) => self.last_publish = Some(Instant::now()),
            Err(e) => warn!("Failed to update progress message: {e}"),
        }
    }
}

/// Compose the message body: headline, then the sanitized thinking text in
/// a foldable block when any has accumulated.
fn render_body(headline: &str, thinking: &str) -> String {
    let thinking = sanitize(thinking);
    let thinking = thinking.trim();
    if thinking.is_empty() {
        headline.to_string()
    } else {
        format!("{headline}\n\n<details><summary>Model reasoning</summary>\n\n{thinking}\n\n</details>")
    }
}

/// Strip structural markup able to escape the foldable-details wrapper.
///
/// The text comes from an untrusted model whose output is itself
/// conditioned on untrusted user text, so anything that could close or
/// reopen the container is removed before display.
pub fn sanitize(text: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        let re = Regex::new(r"(?i)</?\s*(details|summary)[^>]*>|<!--").unwrap();
        re
    });
    tags.replace_all(text, "").into_owned()
}
