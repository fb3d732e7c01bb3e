//! Errors surfaced by tree construction and render job setup.

use thiserror::Error;

/// Errors that can occur before a render starts.
///
/// Per-pixel numerical problems never show up here; they resolve to a
/// miss or a black sample inside the hot loops.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RayTraceError {
    #[error("Scene contains no triangles")]
    EmptyScene,

    #[error("Invalid render options: {0}")]
    InvalidOptions(String),

    #[error("Invalid viewport size {width}x{height}")]
    InvalidViewport { width: u32, height: u32 },

    #[error("Pixel ({x}, {y}) is outside the {width}x{height} viewport")]
    PixelOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("A render worker panicked")]
    WorkerPanicked,
}

/// Result type for ray tracer operations.
pub type Result<T> = std::result::Result<T, RayTraceError>;
