//! # pixelbot
//!
//! Request pipeline for a public AI-editable pixel canvas. Each run
//! processes one inbound request: either a deterministic `place x y color`
//! command applied directly to the grid, or free text handed to a
//! generative model that proposes a batch of pixel edits, validated and
//! applied atomically. The surrounding integration owns rendering,
//! persistence triggers, and request delivery.

pub mod canvas;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod request;
pub mod schema;

pub use errors::{PixelbotError, Result};
pub use pipeline::{Outcome, Pipeline};
