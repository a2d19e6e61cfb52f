//! End-to-end pipeline tests
//!
//! These drive the full request flow over temp-dir canvas and ledger
//! stores, with the generative model and the progress channel replaced by
//! in-process fakes.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;

use pixelbot::canvas::{load_canvas, save_canvas, Canvas, Color, GRID_SIZE};
use pixelbot::config::AppConfig;
use pixelbot::ledger::{load_ledger, save_ledger, QuotaCheck, UsageLedger};
use pixelbot::model::{
    ChunkStream, GenerateRequest, GenerativeClient, ModelError, ModelSpec, StreamChunk,
};
use pixelbot::pipeline::{Outcome, Pipeline};
use pixelbot::progress::ProgressChannel;
use pixelbot::request::Request;

/// Fake model: returns a fixed chunk sequence and counts calls.
struct FakeModel {
    chunks: Vec<Result<StreamChunk, ModelError>>,
    calls: Arc<Mutex<u32>>,
}

impl FakeModel {
    fn answering(answer: &str) -> Self {
        Self {
            chunks: vec![
                Ok(StreamChunk::Thinking("planning the drawing".to_string())),
                Ok(StreamChunk::Answer(answer.to_string())),
            ],
            calls: Arc::new(Mutex::new(0)),
        }
    }

    fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl GenerativeClient for FakeModel {
    async fn stream_generate(
        &self,
        _spec: &ModelSpec,
        _request: &GenerateRequest,
    ) -> Result<ChunkStream, ModelError> {
        *self.calls.lock().unwrap() += 1;
        let chunks = self.chunks.clone();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Fake progress channel recording every published body.
#[derive(Clone, Default)]
struct FakeChannel {
    bodies: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ProgressChannel for FakeChannel {
    async fn create(&self, body: &str) -> pixelbot::Result<u64> {
        self.bodies.lock().unwrap().push(body.to_string());
        Ok(1)
    }

    async fn update(&self, _id: u64, body: &str) -> pixelbot::Result<()> {
        self.bodies.lock().unwrap().push(body.to_string());
        Ok(())
    }
}

fn setup(temp: &TempDir) -> AppConfig {
    let grid_path = temp.path().join("grid.json");
    save_canvas(&grid_path, &Canvas::blank()).unwrap();
    AppConfig::new(grid_path, temp.path().join("usage.json"))
}

fn request(title: &str) -> Request {
    Request::new(title, None, "alice", Utc::now())
}

fn assert_canvas_blank(path: &Path) {
    assert_eq!(load_canvas(path).unwrap(), Canvas::blank());
}

#[tokio::test]
async fn test_direct_placement_applies_one_cell() {
    let temp = TempDir::new().unwrap();
    let config = setup(&temp);
    let model = FakeModel::answering("unused");

    let outcome = Pipeline::new(&config, &model)
        .run(&request("place 2 3 red"), None, None)
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::AppliedDirect(_)));
    assert_eq!(outcome.status_line(), "Placed red at (2, 3)");

    let canvas = load_canvas(&config.grid_path).unwrap();
    assert_eq!(canvas.get(2, 3), Color::Red);

    // No model call, no quota charge for direct placements.
    assert_eq!(model.call_count(), 0);
    assert!(!config.usage_path.exists());
}

#[tokio::test]
async fn test_near_miss_placement_goes_to_the_model() {
    let temp = TempDir::new().unwrap();
    let config = setup(&temp);
    let answer = r#"{"refused": false, "pixels": [{"x": 0, "y": 0, "color": "blue"}]}"#;
    let model = FakeModel::answering(answer);

    // Out-of-range coordinates make this a drawing request, not an error.
    let outcome = Pipeline::new(&config, &model)
        .run(&request(&format!("place {GRID_SIZE} 0 red")), None, None)
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::AppliedDrawing { changed: 1 }));
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn test_drawing_request_applies_edits_and_charges_quota() {
    let temp = TempDir::new().unwrap();
    let config = setup(&temp);
    let model = FakeModel::answering(
        r#"{"refused": false, "pixels": [
            {"x": 0, "y": 0, "color": "red"},
            {"x": 0, "y": 0, "color": "blue"},
            {"x": 40, "y": 1, "color": "green"}
        ]}"#,
    );
    let channel = FakeChannel::default();

    let outcome = Pipeline::new(&config, &model)
        .run(&request("draw something nice"), Some(Box::new(channel.clone())), None)
        .await
        .unwrap();

    // Two valid edits processed (the out-of-range one is dropped); the
    // duplicate coordinate counts per edit and last write wins.
    assert_eq!(outcome, Outcome::AppliedDrawing { changed: 2 });
    let canvas = load_canvas(&config.grid_path).unwrap();
    assert_eq!(canvas.get(0, 0), Color::Blue);

    let today = Utc::now().date_naive();
    let ledger = load_ledger(&config.usage_path, today).unwrap();
    assert_eq!(ledger.count_for("alice"), 1);

    let bodies = channel.bodies.lock().unwrap();
    assert!(bodies.first().unwrap().contains("Thinking"));
    assert!(bodies.last().unwrap().contains("Applied 2 pixel changes"));
}

#[tokio::test]
async fn test_model_refusal_leaves_canvas_and_ledger_untouched() {
    let temp = TempDir::new().unwrap();
    let config = setup(&temp);
    let model = FakeModel::answering(r#"{"refused": true, "pixels": []}"#);
    let channel = FakeChannel::default();

    let outcome = Pipeline::new(&config, &model)
        .run(&request("draw something rude"), Some(Box::new(channel.clone())), None)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::RefusedByModel);
    assert_canvas_blank(&config.grid_path);

    // A refusal consumes no quota.
    let today = Utc::now().date_naive();
    let ledger = load_ledger(&config.usage_path, today).unwrap();
    assert_eq!(ledger.count_for("alice"), 0);

    assert!(channel.bodies.lock().unwrap().last().unwrap().contains("declined"));
}

#[tokio::test]
async fn test_quota_refusal_never_calls_the_model() {
    let temp = TempDir::new().unwrap();
    let config = setup(&temp);
    let model = FakeModel::answering("unused");

    let today = Utc::now().date_naive();
    let mut ledger = UsageLedger::for_day(today);
    for _ in 0..config.quota.per_user_cap {
        ledger.record(today, "alice");
    }
    save_ledger(&config.usage_path, &ledger).unwrap();

    let outcome = Pipeline::new(&config, &model)
        .run(&request("draw a castle"), None, None)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::RefusedByQuota(QuotaCheck::UserLimitExceeded)
    );
    assert_eq!(model.call_count(), 0);
    assert_canvas_blank(&config.grid_path);

    // The refused request itself is not charged.
    let reloaded = load_ledger(&config.usage_path, today).unwrap();
    assert_eq!(reloaded.count_for("alice"), config.quota.per_user_cap);
}

#[tokio::test]
async fn test_malformed_answer_is_rejected_without_mutation() {
    let temp = TempDir::new().unwrap();
    let config = setup(&temp);
    let model = FakeModel::answering("a lovely poem about pixels");

    let outcome = Pipeline::new(&config, &model)
        .run(&request("draw a poem"), None, None)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::RejectedMalformed);
    assert_canvas_blank(&config.grid_path);
    assert!(!config.usage_path.exists());
}

#[tokio::test]
async fn test_all_invalid_pixels_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = setup(&temp);
    let model = FakeModel::answering(
        r#"{"refused": false, "pixels": [{"x": 400, "y": 2, "color": "red"}]}"#,
    );

    let outcome = Pipeline::new(&config, &model)
        .run(&request("draw off the canvas"), None, None)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::RejectedMalformed);
    assert_canvas_blank(&config.grid_path);
}

#[tokio::test]
async fn test_missing_grid_file_fails_the_run() {
    let temp = TempDir::new().unwrap();
    let config = AppConfig::new(
        temp.path().join("absent.json"),
        temp.path().join("usage.json"),
    );
    let model = FakeModel::answering("unused");

    let result = Pipeline::new(&config, &model)
        .run(&request("place 0 0 red"), None, None)
        .await;

    assert!(result.is_err());
}
