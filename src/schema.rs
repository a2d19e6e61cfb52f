//! Model response validation
//!
//! The model's final answer text is expected to be JSON of the shape
//! `{ "refused": bool, "pixels": [ { "x", "y", "color" } … ] }`. The text
//! comes from an untrusted model, so candidates are filtered one by one:
//! an entry with out-of-range coordinates or a color outside the palette
//! is dropped silently rather than failing the response. Only a response
//! with nothing usable left is rejected.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::canvas::{Color, PixelEdit};
use crate::errors::{PixelbotError, Result};

/// A structurally valid, filtered model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validated {
    /// The model set the refusal flag; any edits present are ignored.
    Refused,
    /// At least one candidate survived filtering.
    Edits(Vec<PixelEdit>),
}

#[derive(Debug, Deserialize)]
struct RawReply {
    #[serde(default)]
    refused: bool,
    #[serde(default)]
    pixels: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawPixel {
    x: i64,
    y: i64,
    color: String,
}

/// Validate and normalize the raw answer text.
///
/// Returns [`Validated::Refused`] when the refusal flag is set,
/// [`Validated::Edits`] when at least one candidate survives filtering,
/// and a [`PixelbotError::MalformedResponse`] when the text cannot be
/// parsed or no candidate survives. Partial validity survives; total
/// invalidity fails.
pub fn validate(raw_answer: &str) -> Result<Validated> {
    let payload = strip_fences(raw_answer);

    let reply: RawReply = serde_json::from_str(payload)
        .or_else(|_| {
            // Some models wrap the JSON in prose; take the outermost
            // object if one is present.
            extract_object(payload)
                .ok_or(())
                .and_then(|obj| serde_json::from_str(obj).map_err(|_| ()))
        })
        .map_err(|()| {
            PixelbotError::MalformedResponse(format!(
                "not a structured reply: {}",
                preview(raw_answer)
            ))
        })?;

    if reply.refused {
        debug!("Model set the refusal flag");
        return Ok(Validated::Refused);
    }

    let total = reply.pixels.len();
    let mut edits = Vec::with_capacity(total);
    for candidate in &reply.pixels {
        match RawPixel::deserialize(candidate) {
            Ok(pixel) => {
                let Some(color) = Color::parse(&pixel.color) else {
                    warn!("Dropping candidate with unknown color {:?}", pixel.color);
                    continue;
                };
                match PixelEdit::checked(pixel.x, pixel.y, color) {
                    Some(edit) => edits.push(edit),
                    None => {
                        warn!("Dropping out-of-range candidate ({}, {})", pixel.x, pixel.y);
                    }
                }
            }
            Err(e) => warn!("Dropping malformed candidate: {e}"),
        }
    }

    if edits.is_empty() {
        return Err(PixelbotError::MalformedResponse(format!(
            "no valid pixels among {total} candidates"
        )));
    }

    debug!("Validated {} of {} candidate edits", edits.len(), total);
    Ok(Validated::Edits(edits))
}

/// Strip a surrounding markdown code fence, if any.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// The outermost `{ … }` span, if the text contains one.
fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > 80 {
        let head: String = trimmed.chars().take(80).collect();
        format!("{head}\u{2026}")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_reply() {
        let raw = r#"{"refused": false, "pixels": [{"x": 1, "y": 2, "color": "red"}]}"#;
        let validated = validate(raw).unwrap();
        assert_eq!(
            validated,
            Validated::Edits(vec![PixelEdit::checked(1, 2, Color::Red).unwrap()])
        );
    }

    #[test]
    fn test_refusal_flag_wins_over_edits() {
        let raw = r#"{"refused": true, "pixels": [{"x": 1, "y": 2, "color": "red"}]}"#;
        assert_eq!(validate(raw).unwrap(), Validated::Refused);
    }

    #[test]
    fn test_invalid_candidates_are_dropped_silently() {
        let raw = r#"{
            "refused": false,
            "pixels": [
                {"x": 1, "y": 2, "color": "red"},
                {"x": 99, "y": 2, "color": "red"},
                {"x": 1, "y": 2, "color": "mauve"},
                {"x": 1, "y": 2},
                "nonsense"
            ]
        }"#;
        let validated = validate(raw).unwrap();
        assert_eq!(
            validated,
            Validated::Edits(vec![PixelEdit::checked(1, 2, Color::Red).unwrap()])
        );
    }

    #[test]
    fn test_all_invalid_candidates_fail() {
        let raw = r#"{"refused": false, "pixels": [{"x": 99, "y": 99, "color": "red"}]}"#;
        let err = validate(raw).unwrap_err();
        assert!(matches!(err, PixelbotError::MalformedResponse(_)));
    }

    #[test]
    fn test_empty_pixel_list_fails() {
        let err = validate(r#"{"refused": false, "pixels": []}"#).unwrap_err();
        assert!(matches!(err, PixelbotError::MalformedResponse(_)));
    }

    #[test]
    fn test_unparsable_text_fails() {
        assert!(validate("I drew you a nice tree!").is_err());
        assert!(validate("").is_err());
    }

    #[test]
    fn test_fenced_reply_is_accepted() {
        let raw = "```json\n{\"refused\": false, \"pixels\": [{\"x\": 0, \"y\": 0, \"color\": \"blue\"}]}\n```";
        let validated = validate(raw).unwrap();
        assert_eq!(
            validated,
            Validated::Edits(vec![PixelEdit::checked(0, 0, Color::Blue).unwrap()])
        );
    }

    #[test]
    fn test_reply_wrapped_in_prose_is_accepted() {
        let raw = "Here you go: {\"refused\": false, \"pixels\": [{\"x\": 3, \"y\": 3, \"color\": \"green\"}]} enjoy!";
        let validated = validate(raw).unwrap();
        assert_eq!(
            validated,
            Validated::Edits(vec![PixelEdit::checked(3, 3, Color::Green).unwrap()])
        );
    }

    #[test]
    fn test_color_names_parse_case_insensitively() {
        let raw = r#"{"refused": false, "pixels": [{"x": 0, "y": 0, "color": "RED"}]}"#;
        let validated = validate(raw).unwrap();
        assert_eq!(
            validated,
            Validated::Edits(vec![PixelEdit::checked(0, 0, Color::Red).unwrap()])
        );
    }

    #[test]
    fn test_missing_refused_flag_defaults_to_false() {
        let raw = r#"{"pixels": [{"x": 5, "y": 5, "color": "black"}]}"#;
        assert!(matches!(validate(raw).unwrap(), Validated::Edits(_)));
    }
}
