//! prism-emd-core: Core types for EMD simulation output.
//!
//! This crate provides the pieces of the output pipeline that do not touch
//! HDF5: axis restriding between the simulation's and the file's array
//! layouts, output geometry with the reciprocal crop window, and the run
//! parameter bundle.
//!

pub mod error;
pub mod geometry;
pub mod params;
pub mod restride;

pub use error::{Error, Result};
pub use geometry::{fftshift, linear_axis, Algorithm, CropPolicy, OutputGeometry, ReciprocalWindow};
pub use params::SimulationParameters;
pub use restride::{permuted_shape, restride, swap_last_two_axes};

/// Floating-point element type of every numeric dataset.
#[cfg(not(feature = "f64"))]
pub type Real = f32;

/// Floating-point element type of every numeric dataset.
#[cfg(feature = "f64")]
pub type Real = f64;
