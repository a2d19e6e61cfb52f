//! The closed canvas palette

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the eight placeable colors.
///
/// The palette is closed: values outside it are invalid input and never
/// reach canvas state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
}

impl Color {
    /// Every palette member, in display order.
    pub const ALL: [Color; 8] = [
        Color::White,
        Color::Black,
        Color::Red,
        Color::Blue,
        Color::Green,
        Color::Yellow,
        Color::Purple,
        Color::Orange,
    ];

    /// Lowercase wire name, as stored in `grid.json`.
    pub fn as_str(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Purple => "purple",
            Color::Orange => "orange",
        }
    }

    /// Parse a color name, case-insensitively. `None` for anything outside
    /// the palette.
    pub fn parse(name: &str) -> Option<Color> {
        match name.to_ascii_lowercase().as_str() {
            "white" => Some(Color::White),
            "black" => Some(Color::Black),
            "red" => Some(Color::Red),
            "blue" => Some(Color::Blue),
            "green" => Some(Color::Green),
            "yellow" => Some(Color::Yellow),
            "purple" => Some(Color::Purple),
            "orange" => Some(Color::Orange),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Color {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Color::parse(s).ok_or(())
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::White
    }
}
