//! Output geometry handed over by the simulation, and the reciprocal-space
//! window that decides how much of each diffraction pattern is stored.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use crate::{Error, Real, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Simulation algorithm that produced the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Algorithm {
    /// Interpolated plane-wave (PRISM) algorithm.
    #[default]
    Prism,
    /// Conventional multislice, used for thick samples.
    Multislice,
}

impl Algorithm {
    /// One-letter code stored in the run metadata.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Prism => "p",
            Self::Multislice => "m",
        }
    }
}

/// How the reciprocal extent of stored diffraction patterns is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CropPolicy {
    /// Keep the algorithm's natural output window.
    #[default]
    Full,
    /// Keep only frequencies below `max_angle / lambda` (angle in rad).
    MaxAngle(Real),
}

/// Coordinates and calibration vectors for one simulation run.
///
/// All vectors are in the simulation's units: positions in Å, spatial
/// frequencies in 1/Å (FFT order, zero frequency first), angles in mrad.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutputGeometry {
    /// Probe positions along x.
    pub xp: Vec<Real>,
    /// Probe positions along y.
    pub yp: Vec<Real>,
    /// Reciprocal grid along x, unshifted.
    pub qx: Vec<Real>,
    /// Reciprocal grid along y, unshifted.
    pub qy: Vec<Real>,
    /// Extent of the zero-padded probe array `(x, y)`.
    pub probe_dims: (usize, usize),
    /// Electron wavelength in Å.
    pub lambda: Real,
    /// Outer angle of each virtual-detector bin.
    pub detector_angles: Vec<Real>,
    /// Thickness at which each output layer was recorded.
    pub depths: Vec<Real>,
}

impl OutputGeometry {
    /// Scan extent `(x, y)`.
    #[must_use]
    pub fn scan_shape(&self) -> (usize, usize) {
        (self.xp.len(), self.yp.len())
    }

    /// Checks that `num_layers` output depths are known.
    ///
    /// # Errors
    /// Returns [`Error::GeometryError`] when depths are missing.
    pub fn require_layers(&self, num_layers: usize) -> Result<()> {
        if self.depths.len() < num_layers {
            return Err(Error::GeometryError(format!(
                "{num_layers} output layers requested but only {} depths known",
                self.depths.len()
            )));
        }
        Ok(())
    }

    /// Reciprocal windows `(x, y)` for the stored diffraction patterns.
    ///
    /// # Errors
    /// Returns [`Error::GeometryError`] if the grid is empty.
    pub fn reciprocal_windows(
        &self,
        algorithm: Algorithm,
        crop: CropPolicy,
    ) -> Result<(ReciprocalWindow, ReciprocalWindow)> {
        let x = ReciprocalWindow::new(&self.qx, self.probe_dims.0, self.lambda, algorithm, crop)?;
        let y = ReciprocalWindow::new(&self.qy, self.probe_dims.1, self.lambda, algorithm, crop)?;
        Ok((x, y))
    }
}

/// Portion of a reciprocal axis written to a datacube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReciprocalWindow {
    /// Number of stored frequencies.
    pub extent: usize,
    /// First stored index in the (possibly shifted) calibration axis.
    pub offset: usize,
    /// Whether the calibration axis is frequency-shifted.
    pub shifted: bool,
}

impl ReciprocalWindow {
    /// Computes the window for one reciprocal axis.
    ///
    /// Only multislice calibration axes are frequency-shifted. A cropped
    /// multislice window is centred on zero frequency of the shifted axis,
    /// while a cropped PRISM window starts at the first grid entry.
    /// Uncropped multislice output keeps the central half of the probe
    /// array; uncropped PRISM output keeps the whole grid.
    ///
    /// # Errors
    /// Returns [`Error::GeometryError`] if `q` is empty or the window does
    /// not fit inside the grid.
    pub fn new(
        q: &[Real],
        probe_dim: usize,
        lambda: Real,
        algorithm: Algorithm,
        crop: CropPolicy,
    ) -> Result<Self> {
        if q.is_empty() {
            return Err(Error::GeometryError("empty reciprocal grid".to_string()));
        }

        let window = match (crop, algorithm) {
            (CropPolicy::MaxAngle(max_angle), _) => {
                let q_max = max_angle / lambda;
                let below = q.iter().take_while(|&&v| v < q_max).count();
                let extent = (below * 2).min(q.len());
                let shifted = algorithm == Algorithm::Multislice;
                Self {
                    extent,
                    offset: if shifted { q.len() / 2 - extent / 2 } else { 0 },
                    shifted,
                }
            }
            (CropPolicy::Full, Algorithm::Multislice) => Self {
                extent: probe_dim / 2,
                offset: probe_dim / 4,
                shifted: true,
            },
            (CropPolicy::Full, Algorithm::Prism) => Self {
                extent: q.len(),
                offset: 0,
                shifted: false,
            },
        };

        if window.extent == 0 || window.offset + window.extent > q.len() {
            return Err(Error::GeometryError(format!(
                "reciprocal window {}..{} outside grid of {}",
                window.offset,
                window.offset + window.extent,
                q.len()
            )));
        }
        Ok(window)
    }

    /// Calibration values for the stored window.
    #[must_use]
    pub fn calibration(&self, q: &[Real]) -> Vec<Real> {
        let axis = if self.shifted { fftshift(q) } else { q.to_vec() };
        axis[self.offset..self.offset + self.extent].to_vec()
    }
}

/// Moves the zero-frequency entry of an FFT-ordered axis to the centre.
#[must_use]
pub fn fftshift<T: Clone>(values: &[T]) -> Vec<T> {
    let mut shifted = values.to_vec();
    shifted.rotate_right(values.len() / 2);
    shifted
}

/// Evenly spaced coordinates `0, step, 2 * step, ...`.
#[must_use]
pub fn linear_axis(len: usize, step: Real) -> Vec<Real> {
    (0..len).map(|i| i as Real * step).collect()
}
