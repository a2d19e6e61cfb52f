//! Inbound request intake and classification

use chrono::{DateTime, Utc};

use crate::canvas::{Color, PixelEdit};

/// Command word that begins a direct placement title.
pub const PLACE_COMMAND: &str = "place";

/// Maximum retained length of a request title, in characters.
pub const MAX_TITLE_LEN: usize = 256;

/// Maximum retained length of a request body, in characters.
pub const MAX_BODY_LEN: usize = 2000;

/// One inbound canvas request. Exists only for the duration of a single
/// pipeline run.
#[derive(Debug, Clone)]
pub struct Request {
    pub title: String,
    pub body: Option<String>,
    pub requester: String,
    pub arrived_at: DateTime<Utc>,
}

impl Request {
    /// Build a request, truncating over-long title and body rather than
    /// rejecting them.
    pub fn new(
        title: &str,
        body: Option<&str>,
        requester: &str,
        arrived_at: DateTime<Utc>,
    ) -> Self {
        let body = body
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(|b| truncate_chars(b, MAX_BODY_LEN));
        Self {
            title: truncate_chars(title.trim(), MAX_TITLE_LEN),
            body,
            requester: requester.to_string(),
            arrived_at,
        }
    }

    /// The text handed to the generative model: title, plus body joined by a
    /// blank-line separator when present.
    pub fn prompt(&self) -> String {
        match &self.body {
            Some(body) => format!("{}\n\n{}", self.title, body),
            None => self.title.clone(),
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// What kind of request the title describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// An explicit single-pixel placement, no model involved.
    Place(PixelEdit),
    /// Free text interpreted by the generative model.
    Draw,
}

/// Classify a request title.
///
/// A title is a direct placement iff, after trimming, it splits on
/// whitespace into exactly four tokens: the literal `place`, two in-bounds
/// integers, and a palette color name. Everything else (wrong token count,
/// unparsable or out-of-range coordinates, unknown color) is routed to the
/// drawing path. There is no partial-match fallback: a near-miss placement
/// is a drawing request, not an error.
pub fn classify(title: &str) -> RequestKind {
    let tokens: Vec<&str> = title.split_whitespace().collect();

    let [command, x_str, y_str, color_str] = tokens.as_slice() else {
        return RequestKind::Draw;
    };
    if *command != PLACE_COMMAND {
        return RequestKind::Draw;
    }

    let (Ok(x), Ok(y)) = (x_str.parse::<i64>(), y_str.parse::<i64>()) else {
        return RequestKind::Draw;
    };
    let Some(color) = Color::parse(color_str) else {
        return RequestKind::Draw;
    };

    match PixelEdit::checked(x, y, color) {
        Some(edit) => RequestKind::Place(edit),
        None => RequestKind::Draw,
    }
}
