//! End-to-end request pipeline
//!
//! Composes the classifier, usage ledger, model orchestrator, response
//! validator, and canvas mutator into the per-request flow, and reduces
//! every run to a single terminal outcome.

use tracing::{debug, info};

use crate::canvas::{load_canvas, save_canvas, Canvas, PixelEdit, GRID_SIZE};
use crate::config::AppConfig;
use crate::errors::Result;
use crate::ledger::{load_ledger, save_ledger, QuotaCheck};
use crate::model::{GenerateRequest, GenerativeClient, Orchestrator, RunOutcome};
use crate::progress::{ProgressChannel, ProgressReporter};
use crate::request::{classify, Request, RequestKind};
use crate::schema::{validate, Validated};

/// Terminal outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A direct placement was applied.
    AppliedDirect(PixelEdit),
    /// A model-proposed batch was applied; the count is per edit
    /// processed, as reported to the requester.
    AppliedDrawing { changed: usize },
    /// The model declined the request.
    RefusedByModel,
    /// A quota tier refused the request before any model call.
    RefusedByQuota(QuotaCheck),
    /// The model answered but nothing usable survived validation.
    RejectedMalformed,
}

impl Outcome {
    /// The one human-readable status line for this run.
    pub fn status_line(&self) -> String {
        match self {
            Outcome::AppliedDirect(edit) => {
                format!("Placed {} at ({}, {})", edit.color, edit.x, edit.y)
            }
            Outcome::AppliedDrawing { changed } => {
                format!("Applied {changed} pixel changes")
            }
            Outcome::RefusedByModel => "The model declined this request".to_string(),
            Outcome::RefusedByQuota(QuotaCheck::DailyLimitExceeded) => {
                "Skipping: the canvas reached its daily request limit".to_string()
            }
            Outcome::RefusedByQuota(_) => {
                "Skipping: daily per-user request limit reached".to_string()
            }
            Outcome::RejectedMalformed => {
                "Model response contained no usable pixel edits".to_string()
            }
        }
    }

    /// Whether derived artifacts (image, page) should be regenerated.
    pub fn mutated_canvas(&self) -> bool {
        matches!(self, Outcome::AppliedDirect(_) | Outcome::AppliedDrawing { .. })
    }
}

pub struct Pipeline<'a> {
    config: &'a AppConfig,
    client: &'a dyn GenerativeClient,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a AppConfig, client: &'a dyn GenerativeClient) -> Self {
        Self { config, client }
    }

    /// Process one request end to end.
    ///
    /// `progress` is the optional external progress channel for
    /// natural-language requests; `reference_png` is the pre-rendered
    /// canvas image handed to the model when available.
    pub async fn run(
        &self,
        request: &Request,
        progress: Option<Box<dyn ProgressChannel>>,
        reference_png: Option<Vec<u8>>,
    ) -> Result<Outcome> {
        let mut canvas = load_canvas(&self.config.grid_path)?;

        match classify(&request.title) {
            RequestKind::Place(edit) => {
                let changed = canvas.apply(&[edit]);
                save_canvas(&self.config.grid_path, &canvas)?;
                info!(
                    "Direct placement by {}: {} at ({}, {}), {} change",
                    request.requester, edit.color, edit.x, edit.y, changed
                );
                Ok(Outcome::AppliedDirect(edit))
            }
            RequestKind::Draw => {
                self.run_drawing(request, canvas, progress, reference_png)
                    .await
            }
        }
    }

    async fn run_drawing(
        &self,
        request: &Request,
        mut canvas: Canvas,
        progress: Option<Box<dyn ProgressChannel>>,
        reference_png: Option<Vec<u8>>,
    ) -> Result<Outcome> {
        let today = request.arrived_at.date_naive();
        let mut ledger = load_ledger(&self.config.usage_path, today)?;

        let mut reporter = ProgressReporter::new(progress);
        reporter.open().await;

        // Quota gates fail fast: no model call is ever attempted for a
        // refused request, and refusals consume no quota.
        let check = ledger.check(today, &request.requester, &self.config.quota);
        if check != QuotaCheck::Allowed {
            info!("Quota refusal for {}: {:?}", request.requester, check);
            reporter
                .finish("\u{23f3} Daily request limit reached \u{2014} try again tomorrow.")
                .await;
            return Ok(Outcome::RefusedByQuota(check));
        }

        let generate = GenerateRequest {
            system: build_system_context(&canvas),
            prompt: request.prompt(),
            reference_png,
        };

        let orchestrator = Orchestrator::new(self.client, &self.config.orchestrator);
        let answer = match orchestrator.run(&generate, &mut reporter).await {
            Ok(RunOutcome::Completed(answer)) => answer,
            Ok(RunOutcome::Refused) => {
                reporter
                    .finish("\u{1f6ab} The model declined this request.")
                    .await;
                return Ok(Outcome::RefusedByModel);
            }
            Err(e) => {
                reporter
                    .finish("\u{1f4a5} Something went wrong while processing this request.")
                    .await;
                return Err(e);
            }
        };

        let edits = match validate(&answer) {
            Ok(Validated::Edits(edits)) => edits,
            Ok(Validated::Refused) => {
                reporter
                    .finish("\u{1f6ab} The model declined this request.")
                    .await;
                return Ok(Outcome::RefusedByModel);
            }
            Err(e) => {
                debug!("Validation failed: {e}");
                reporter
                    .finish("\u{26a0}\u{fe0f} The model response couldn't be applied.")
                    .await;
                return Ok(Outcome::RejectedMalformed);
            }
        };

        // All-or-nothing: the canvas snapshot and the quota charge are
        // only written once the whole batch has been applied in memory.
        let changed = canvas.apply(&edits);
        save_canvas(&self.config.grid_path, &canvas)?;
        ledger.record(today, &request.requester);
        save_ledger(&self.config.usage_path, &ledger)?;

        info!(
            "Applied {} pixel changes for {} ({} today)",
            changed,
            request.requester,
            ledger.count_for(&request.requester)
        );
        reporter
            .finish(&format!("\u{2705} Applied {changed} pixel changes."))
            .await;
        Ok(Outcome::AppliedDrawing { changed })
    }
}

/// System instructions for the model: canvas geometry, palette, the
/// current grid contents, and the required reply shape.
fn build_system_context(canvas: &Canvas) -> String {
    let palette = crate::canvas::Color::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let rows: Vec<Vec<&str>> = canvas
        .rows()
        .map(|row| row.iter().map(|c| c.as_str()).collect())
        .collect();
    let grid_json = serde_json::to_string(&rows).unwrap_or_default();

    format!(
        "You edit a shared {size}x{size} pixel canvas. Coordinates are zero-based \
with (0, 0) at the top left; x grows right and y grows down. The only valid \
colors are: {palette}.\n\n\
The current canvas, row by row (grid[y][x]): {grid_json}\n\n\
Interpret the user's request as pixel edits. Reply with JSON only, in the \
shape {{\"refused\": false, \"pixels\": [{{\"x\": 0, \"y\": 0, \"color\": \"red\"}}]}}. \
If the request is inappropriate or impossible, reply {{\"refused\": true, \
\"pixels\": []}}.",
        size = GRID_SIZE,
    )
}
