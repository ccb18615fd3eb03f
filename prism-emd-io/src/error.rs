//! I/O error types.

use thiserror::Error;

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Container error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Schema violation: double initialization, missing layout, shape mismatch.
    #[error("storage error: {0}")]
    Storage(String),

    /// Group, dataset or attribute absent on read.
    #[error("not found: '{name}' in '{path}'")]
    NotFound { path: String, name: String },

    /// Underlying HDF5 failure.
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] prism_emd_core::Error),
}

impl Error {
    /// Reports a schema violation detected while preparing a write.
    pub(crate) fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub(crate) fn not_found(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            path: path.into(),
            name: name.into(),
        }
    }
}
