//! Run configuration recorded in the container's metadata group.
#![allow(clippy::struct_excessive_bools)]

use crate::geometry::{Algorithm, CropPolicy};
use crate::Real;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Scalar and vector configuration of one simulation run.
///
/// Values are held in the simulation's internal units (Å, eV, rad). The
/// metadata writer converts to the stored units.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulationParameters {
    /// Atomic coordinate file the potential was built from.
    pub filename_atoms: String,
    pub algorithm: Algorithm,
    /// PRISM interpolation factors `(x, y)`.
    pub interpolation_factor: (i32, i32),
    /// Number of frozen phonon passes.
    pub num_fp: i32,
    /// Number of slices between intermediate outputs (0 = only the exit).
    pub num_slices: i32,
    pub include_thermal_effects: bool,
    pub include_occupancy: bool,
    pub save_2d_output: bool,
    pub save_3d_output: bool,
    pub save_4d_output: bool,
    pub save_dpc_com: bool,
    pub save_potential_slices: bool,
    pub nyquist_sampling: bool,
    /// Real-space pixel size `(y, x)` in Å.
    pub realspace_pixel_size: (Real, Real),
    /// Potential integration bound in Å.
    pub pot_bound: Real,
    pub slice_thickness: Real,
    /// Depth of the first intermediate output.
    pub z_start: Real,
    /// Beam energy in eV.
    pub e0: Real,
    /// Maximum scattering angle in rad.
    pub alpha_beam_max: Real,
    pub probe_step: (Real, Real),
    pub probe_defocus: Real,
    pub c3: Real,
    pub c5: Real,
    /// Probe convergence semiangle in rad.
    pub probe_semiangle: Real,
    /// Virtual detector bin width in rad.
    pub detector_angle_step: Real,
    /// Probe tilt `(x, y)` in rad.
    pub probe_tilt: (Real, Real),
    /// Unit cell `(z, y, x)` in Å.
    pub cell_dim: [Real; 3],
    /// Tiling factors `(x, y, z)`.
    pub tile: [i32; 3],
    /// Fractional scan window along x.
    pub scan_window_x: (Real, Real),
    /// Fractional scan window along y.
    pub scan_window_y: (Real, Real),
    /// Real-space scan window along x in Å; overrides the fractional one.
    pub scan_window_x_real: Option<(Real, Real)>,
    /// Real-space scan window along y in Å; overrides the fractional one.
    pub scan_window_y_real: Option<(Real, Real)>,
    /// Annular integration window in rad, stored when `save_2d_output` is set.
    pub integration_angle: (Real, Real),
    pub crop: CropPolicy,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            filename_atoms: String::new(),
            algorithm: Algorithm::Prism,
            interpolation_factor: (4, 4),
            num_fp: 1,
            num_slices: 0,
            include_thermal_effects: true,
            include_occupancy: true,
            save_2d_output: false,
            save_3d_output: true,
            save_4d_output: false,
            save_dpc_com: false,
            save_potential_slices: false,
            nyquist_sampling: false,
            realspace_pixel_size: (0.1, 0.1),
            pot_bound: 2.0,
            slice_thickness: 2.0,
            z_start: 0.0,
            e0: 80e3,
            alpha_beam_max: 24.0 / 1000.0,
            probe_step: (0.25, 0.25),
            probe_defocus: 0.0,
            c3: 0.0,
            c5: 0.0,
            probe_semiangle: 20.0 / 1000.0,
            detector_angle_step: 1.0 / 1000.0,
            probe_tilt: (0.0, 0.0),
            cell_dim: [20.0, 20.0, 20.0],
            tile: [1, 1, 1],
            scan_window_x: (0.0, 0.99999),
            scan_window_y: (0.0, 0.99999),
            scan_window_x_real: None,
            scan_window_y_real: None,
            integration_angle: (0.0, 1.0 / 1000.0),
            crop: CropPolicy::Full,
        }
    }
}

impl SimulationParameters {
    /// Set the atomic coordinate file name.
    #[must_use]
    pub fn with_filename_atoms(mut self, name: impl Into<String>) -> Self {
        self.filename_atoms = name.into();
        self
    }

    /// Set the algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the number of frozen phonon passes (clamped to at least 1).
    #[must_use]
    pub fn with_num_fp(mut self, num_fp: i32) -> Self {
        self.num_fp = num_fp.max(1);
        self
    }

    /// Enable annular output with the integration window in rad.
    #[must_use]
    pub fn with_2d_output(mut self, min: Real, max: Real) -> Self {
        self.save_2d_output = true;
        self.integration_angle = (min, max);
        self
    }

    /// Set real-space scan windows in Å.
    #[must_use]
    pub fn with_real_space_window(
        mut self,
        x: Option<(Real, Real)>,
        y: Option<(Real, Real)>,
    ) -> Self {
        self.scan_window_x_real = x;
        self.scan_window_y_real = y;
        self
    }

    /// Set the 4D crop policy.
    #[must_use]
    pub fn with_crop(mut self, crop: CropPolicy) -> Self {
        self.crop = crop;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let params = SimulationParameters::default()
            .with_filename_atoms("SI100.XYZ")
            .with_algorithm(Algorithm::Multislice)
            .with_num_fp(0)
            .with_2d_output(0.0, 0.02);

        assert_eq!(params.filename_atoms, "SI100.XYZ");
        assert_eq!(params.algorithm.code(), "m");
        assert_eq!(params.num_fp, 1);
        assert!(params.save_2d_output);
        assert!(params.scan_window_x_real.is_none());
    }
}
