//! Canvas snapshot persistence
//!
//! The canvas is stored as `grid.json`: a `GRID_SIZE`-row array of
//! `GRID_SIZE`-element arrays of lowercase color names, row-major
//! (`grid[y][x]`). The full snapshot is loaded before each pipeline run and
//! written back once after a successful mutation.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::errors::{PixelbotError, Result};

use super::color::Color;
use super::grid::{Canvas, GRID_SIZE};

/// Load a full canvas snapshot from `path`.
///
/// Fails when the file is unreadable, the grid is not `GRID_SIZE` by
/// `GRID_SIZE`, or any cell names a color outside the palette.
pub fn load_canvas(path: &Path) -> Result<Canvas> {
    let content = fs::read_to_string(path).map_err(|e| PixelbotError::CanvasLoadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let raw: Vec<Vec<String>> =
        serde_json::from_str(&content).map_err(|e| PixelbotError::CanvasLoadError {
            path: path.to_path_buf(),
            message: format!("invalid grid JSON: {e}"),
        })?;

    if raw.len() != GRID_SIZE {
        return Err(PixelbotError::CanvasLoadError {
            path: path.to_path_buf(),
            message: format!("expected {GRID_SIZE} rows, found {}", raw.len()),
        });
    }

    let mut cells = [[Color::default(); GRID_SIZE]; GRID_SIZE];
    for (y, row) in raw.iter().enumerate() {
        if row.len() != GRID_SIZE {
            return Err(PixelbotError::CanvasLoadError {
                path: path.to_path_buf(),
                message: format!("row {y} has {} cells, expected {GRID_SIZE}", row.len()),
            });
        }
        for (x, name) in row.iter().enumerate() {
            cells[y][x] = Color::parse(name).ok_or_else(|| PixelbotError::CanvasLoadError {
                path: path.to_path_buf(),
                message: format!("unknown color {name:?} at ({x}, {y})"),
            })?;
        }
    }

    debug!("Loaded canvas from {:?}", path);
    Ok(Canvas::from_rows(cells))
}

/// Write the full canvas snapshot to `path` in the wire format above.
pub fn save_canvas(path: &Path, canvas: &Canvas) -> Result<()> {
    let rows: Vec<Vec<&str>> = canvas
        .rows()
        .map(|row| row.iter().map(|c| c.as_str()).collect())
        .collect();

    let content =
        serde_json::to_string(&rows).map_err(|e| PixelbotError::SerializationError(e.to_string()))?;

    fs::write(path, content).map_err(|e| PixelbotError::CanvasSaveError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    debug!("Saved canvas to {:?}", path);
    Ok(())
}
