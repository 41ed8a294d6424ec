//! Domain errors that callers may want to match on.
//!
//! Loading and initialization boundaries use `anyhow::Result`; these variants
//! are the structured failures underneath them.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    #[error(
        "Invalid rounded box (thickness {thickness}, radius {corner_radius}, {width}x{height}): {reason}"
    )]
    InvalidRoundedBox {
        thickness: f64,
        corner_radius: f64,
        width: f64,
        height: f64,
        reason: &'static str,
    },

    #[error("CSG {operation} produced an empty solid")]
    EmptySolid { operation: &'static str },

    #[error("Submesh `{name}` not found in the imported asset")]
    MissingSubmesh { name: String },

    #[error("Animation clip `{name}` not found in the imported asset")]
    MissingAnimation { name: String },

    #[error("Scene node {0} does not exist")]
    MissingNode(usize),

    #[error("Node {child} cannot be parented under its own descendant {parent}")]
    CyclicParent { child: usize, parent: usize },

    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),

    #[error("Failed to load font: {0}")]
    Font(String),
}
