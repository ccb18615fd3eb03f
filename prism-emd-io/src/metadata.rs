//! Run configuration stored as attributes of
//! `metadata/metadata_0/original/simulation_parameters`.

use crate::container::EmdContainer;
use crate::layout::{
    write_int_attr, write_int_vec_attr, write_real_attr, write_real_vec_attr, write_str_attr,
    METADATA_ORIGINAL, SIMULATION_PARAMETERS,
};
use crate::{Error, Result};
use log::info;
use prism_emd_core::{Real, SimulationParameters};

/// Attribute keys of the run metadata record.
pub mod keys {
    pub const ATOMS_FILE: &str = "i";
    pub const ALGORITHM: &str = "a";
    pub const INTERPOLATION_X: &str = "fx";
    pub const INTERPOLATION_Y: &str = "fy";
    pub const NUM_FP: &str = "F";
    pub const NUM_SLICES: &str = "ns";
    pub const THERMAL_EFFECTS: &str = "te";
    pub const OCCUPANCY: &str = "oc";
    pub const SAVE_3D: &str = "3D";
    pub const SAVE_4D: &str = "4D";
    pub const SAVE_DPC: &str = "DPC";
    pub const SAVE_POTENTIAL: &str = "ps";
    pub const NYQUIST: &str = "nqs";
    pub const PIXEL_SIZE_X: &str = "px";
    pub const PIXEL_SIZE_Y: &str = "py";
    pub const POT_BOUND: &str = "P";
    pub const SLICE_THICKNESS: &str = "s";
    pub const Z_START: &str = "zs";
    pub const ENERGY: &str = "E";
    pub const ALPHA_MAX: &str = "A";
    pub const PROBE_STEP_X: &str = "rx";
    pub const PROBE_STEP_Y: &str = "ry";
    pub const DEFOCUS: &str = "df";
    pub const C3: &str = "C3";
    pub const C5: &str = "C5";
    pub const SEMIANGLE: &str = "sa";
    pub const DETECTOR_STEP: &str = "d";
    pub const TILT_X: &str = "tx";
    pub const TILT_Y: &str = "ty";
    pub const CELL_DIM: &str = "c";
    pub const TILE: &str = "t";
    pub const SCAN_WINDOW_X: &str = "wx";
    pub const SCAN_WINDOW_Y: &str = "wy";
    pub const SCAN_WINDOW_X_REAL: &str = "wxr";
    pub const SCAN_WINDOW_Y_REAL: &str = "wyr";
    pub const INTEGRATION_WINDOW: &str = "2D";
}

const MRAD_PER_RAD: Real = 1000.0;
const EV_PER_KEV: Real = 1000.0;

impl EmdContainer {
    /// Records the run configuration, once per container.
    ///
    /// Angles are stored in mrad and the beam energy in keV.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] when the container is not initialized or
    /// the metadata record already exists.
    pub fn write_run_metadata(&self, params: &SimulationParameters) -> Result<()> {
        let original = self.require_group(METADATA_ORIGINAL)?;
        if original.link_exists(SIMULATION_PARAMETERS) {
            return Err(Error::Storage(format!(
                "run metadata already written to '{METADATA_ORIGINAL}/{SIMULATION_PARAMETERS}'"
            )));
        }
        let group = original.create_group(SIMULATION_PARAMETERS)?;

        write_str_attr(&group, keys::ATOMS_FILE, &params.filename_atoms)?;
        write_str_attr(&group, keys::ALGORITHM, params.algorithm.code())?;

        let ints = [
            (keys::INTERPOLATION_X, params.interpolation_factor.0),
            (keys::INTERPOLATION_Y, params.interpolation_factor.1),
            (keys::NUM_FP, params.num_fp),
            (keys::NUM_SLICES, params.num_slices),
            (keys::THERMAL_EFFECTS, i32::from(params.include_thermal_effects)),
            (keys::OCCUPANCY, i32::from(params.include_occupancy)),
            (keys::SAVE_3D, i32::from(params.save_3d_output)),
            (keys::SAVE_4D, i32::from(params.save_4d_output)),
            (keys::SAVE_DPC, i32::from(params.save_dpc_com)),
            (keys::SAVE_POTENTIAL, i32::from(params.save_potential_slices)),
            (keys::NYQUIST, i32::from(params.nyquist_sampling)),
        ];
        for (key, value) in ints {
            write_int_attr(&group, key, value)?;
        }

        let reals = [
            (keys::PIXEL_SIZE_X, params.realspace_pixel_size.1),
            (keys::PIXEL_SIZE_Y, params.realspace_pixel_size.0),
            (keys::POT_BOUND, params.pot_bound),
            (keys::SLICE_THICKNESS, params.slice_thickness),
            (keys::Z_START, params.z_start),
            (keys::ENERGY, params.e0 / EV_PER_KEV),
            (keys::ALPHA_MAX, params.alpha_beam_max * MRAD_PER_RAD),
            (keys::PROBE_STEP_X, params.probe_step.0),
            (keys::PROBE_STEP_Y, params.probe_step.1),
            (keys::DEFOCUS, params.probe_defocus),
            (keys::C3, params.c3),
            (keys::C5, params.c5),
            (keys::SEMIANGLE, params.probe_semiangle * MRAD_PER_RAD),
            (keys::DETECTOR_STEP, params.detector_angle_step * MRAD_PER_RAD),
            (keys::TILT_X, params.probe_tilt.0 * MRAD_PER_RAD),
            (keys::TILT_Y, params.probe_tilt.1 * MRAD_PER_RAD),
        ];
        for (key, value) in reals {
            write_real_attr(&group, key, value)?;
        }

        write_real_vec_attr(&group, keys::CELL_DIM, &params.cell_dim)?;
        write_int_vec_attr(&group, keys::TILE, &params.tile)?;
        write_real_vec_attr(
            &group,
            keys::SCAN_WINDOW_X,
            &[params.scan_window_x.0, params.scan_window_x.1],
        )?;
        write_real_vec_attr(
            &group,
            keys::SCAN_WINDOW_Y,
            &[params.scan_window_y.0, params.scan_window_y.1],
        )?;
        if let Some((min, max)) = params.scan_window_x_real {
            write_real_vec_attr(&group, keys::SCAN_WINDOW_X_REAL, &[min, max])?;
        }
        if let Some((min, max)) = params.scan_window_y_real {
            write_real_vec_attr(&group, keys::SCAN_WINDOW_Y_REAL, &[min, max])?;
        }
        if params.save_2d_output {
            let (min, max) = params.integration_angle;
            write_real_vec_attr(
                &group,
                keys::INTEGRATION_WINDOW,
                &[min * MRAD_PER_RAD, max * MRAD_PER_RAD],
            )?;
        }

        self.flush()?;
        info!("Wrote run metadata for {}", params.filename_atoms);
        Ok(())
    }
}
