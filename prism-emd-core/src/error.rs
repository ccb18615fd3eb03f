//! Error types for prism-emd-core.

use thiserror::Error;

/// Result type alias for prism-emd core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Buffer length does not match the declared shape.
    #[error("shape mismatch: shape {shape:?} holds {expected} elements, buffer has {actual}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    /// Axis order is not a permutation of the input axes.
    #[error("invalid axis order {order:?} for rank {rank}")]
    InvalidAxisOrder { order: Vec<usize>, rank: usize },

    /// Output geometry is inconsistent with the requested allocation.
    #[error("geometry error: {0}")]
    GeometryError(String),
}
