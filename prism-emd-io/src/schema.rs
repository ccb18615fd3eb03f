//! Skeleton creation and per-run storage allocation.
//!
//! Allocation happens once per run, before any pass is accumulated. Every
//! result group is created with its primary dataset sized from the output
//! geometry and one calibration dataset per axis.

use crate::container::EmdContainer;
use crate::layout::{
    create_dataset, create_result_group, indexed_name, write_dimensions, write_int_attr,
    write_real_attr, DimensionScale, GroupKind, ANGLE_UNITS, ANGSTROM_UNITS, ANNULAR_BASENAME,
    DATA, DATACUBE, DATACUBES, DATACUBE_BASENAME, DATA_AREAS, DEPTH, DPC_BASENAME, DPC_LABELS,
    EMD_GROUP_TYPE, LENGTH_UNITS, LOG, METADATA, METADATA_0, METADATA_ORIGINAL,
    METADATA_SUBGROUPS, NO_UNITS, ORIGINAL_SUBGROUPS, OUTPUT_DEPTH, POTENTIAL_BASENAME,
    REALSLICE, REALSLICES, RECIPROCAL_UNITS, SIMULATION_ROOT, SMATRIX_BASENAME, VERSION_MAJOR,
    VERSION_MINOR, VIRTUAL_DETECTOR_BASENAME,
};
use crate::{Error, Result};
use hdf5::Group;
use log::{debug, info};
use ndarray::ArrayViewD;
use ndarray::IxDyn;
use num_complex::Complex;
use prism_emd_core::{linear_axis, restride, Algorithm, CropPolicy, OutputGeometry, Real};

impl EmdContainer {
    /// Creates the fixed EMD skeleton and the simulation record attributes.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] if the container is already initialized.
    pub fn initialize(&self) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::Storage(format!(
                "'{SIMULATION_ROOT}' already exists in '{}'",
                self.file().filename()
            )));
        }

        let root = self.file().create_group(SIMULATION_ROOT)?;
        write_int_attr(&root, "version_major", VERSION_MAJOR)?;
        write_int_attr(&root, "version_minor", VERSION_MINOR)?;
        write_int_attr(&root, EMD_GROUP_TYPE, GroupKind::Root.code())?;

        let data = self.file().create_group(DATA)?;
        for area in DATA_AREAS {
            data.create_group(area)?;
        }
        self.file().create_group(LOG)?;
        self.file().create_group(METADATA)?;
        let metadata_0 = self.file().create_group(METADATA_0)?;
        let original = self.file().create_group(METADATA_ORIGINAL)?;
        for name in ORIGINAL_SUBGROUPS {
            original.create_group(name)?;
        }
        for name in METADATA_SUBGROUPS {
            metadata_0.create_group(name)?;
        }

        info!("Initialized EMD skeleton in {}", self.file().filename());
        Ok(())
    }

    /// Allocates one 4D datacube per output layer.
    ///
    /// The stored reciprocal extent of each diffraction pattern is decided
    /// by `algorithm` and `crop`, see [`prism_emd_core::ReciprocalWindow`].
    ///
    /// # Errors
    /// Returns [`Error::Storage`] when the container is not initialized, a
    /// layer group already exists, or the geometry is incomplete.
    pub fn allocate_4d(
        &self,
        num_layers: usize,
        geometry: &OutputGeometry,
        algorithm: Algorithm,
        crop: CropPolicy,
    ) -> Result<()> {
        let datacubes = self.require_group(DATACUBES)?;
        let (sx, sy) = checked_scan_shape(geometry, num_layers)?;
        let (wx, wy) = geometry
            .reciprocal_windows(algorithm, crop)
            .map_err(Error::storage)?;

        let dims = [
            DimensionScale::real("R_x", LENGTH_UNITS, geometry.xp.clone()),
            DimensionScale::real("R_y", LENGTH_UNITS, geometry.yp.clone()),
            DimensionScale::real("Q_x", RECIPROCAL_UNITS, wx.calibration(&geometry.qx)),
            DimensionScale::real("Q_y", RECIPROCAL_UNITS, wy.calibration(&geometry.qy)),
        ];
        let shape = [sx, sy, wx.extent, wy.extent];

        for (layer, &depth) in geometry.depths.iter().take(num_layers).enumerate() {
            let group = create_result_group(
                &datacubes,
                &indexed_name(DATACUBE_BASENAME, layer),
                GroupKind::Primary,
            )?;
            write_real_attr(&group, OUTPUT_DEPTH, depth)?;
            create_dataset::<Real>(&group, DATACUBE, &shape, Some([1, 1, wx.extent, wy.extent]))?;
            write_dimensions(&group, &dims)?;
            debug!("Allocated {} with shape {shape:?}", group.name());
        }
        Ok(())
    }

    /// Allocates one `(scanX, scanY, bins)` virtual-detector slice per layer.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] when the container is not initialized,
    /// the scan is empty, fewer than `num_layers` depths are known or a
    /// layer group already exists.
    pub fn allocate_virtual_detector(
        &self,
        num_layers: usize,
        geometry: &OutputGeometry,
    ) -> Result<()> {
        let dims = [
            DimensionScale::real("R_x", LENGTH_UNITS, geometry.xp.clone()),
            DimensionScale::real("R_y", LENGTH_UNITS, geometry.yp.clone()),
            DimensionScale::real("bin_outer_angle", ANGLE_UNITS, geometry.detector_angles.clone()),
        ];
        self.allocate_realslices(VIRTUAL_DETECTOR_BASENAME, num_layers, geometry, &dims, |_| Ok(()))
    }

    /// Allocates one `(scanX, scanY)` annular image per layer.
    ///
    /// # Errors
    /// Same conditions as [`EmdContainer::allocate_virtual_detector`].
    pub fn allocate_annular(&self, num_layers: usize, geometry: &OutputGeometry) -> Result<()> {
        let dims = [
            DimensionScale::real("R_x", LENGTH_UNITS, geometry.xp.clone()),
            DimensionScale::real("R_y", LENGTH_UNITS, geometry.yp.clone()),
        ];
        self.allocate_realslices(ANNULAR_BASENAME, num_layers, geometry, &dims, |group| {
            write_int_attr(group, DEPTH, 1)
        })
    }

    /// Allocates one `(scanX, scanY, 2)` DPC centre-of-mass field per layer.
    ///
    /// # Errors
    /// Same conditions as [`EmdContainer::allocate_virtual_detector`].
    pub fn allocate_dpc(&self, num_layers: usize, geometry: &OutputGeometry) -> Result<()> {
        let dims = [
            DimensionScale::real("R_x", LENGTH_UNITS, geometry.xp.clone()),
            DimensionScale::real("R_y", LENGTH_UNITS, geometry.yp.clone()),
            DimensionScale::labels("DPC_CoM", NO_UNITS, &DPC_LABELS),
        ];
        self.allocate_realslices(DPC_BASENAME, num_layers, geometry, &dims, |_| Ok(()))
    }

    fn allocate_realslices(
        &self,
        basename: &str,
        num_layers: usize,
        geometry: &OutputGeometry,
        dims: &[DimensionScale],
        extra: impl Fn(&Group) -> Result<()>,
    ) -> Result<()> {
        let realslices = self.require_group(REALSLICES)?;
        checked_scan_shape(geometry, num_layers)?;
        let shape: Vec<usize> = dims.iter().map(DimensionScale::len).collect();
        if shape.contains(&0) {
            return Err(Error::Storage(format!("empty axis in {basename} shape {shape:?}")));
        }

        for (layer, &depth) in geometry.depths.iter().take(num_layers).enumerate() {
            let group = create_result_group(
                &realslices,
                &indexed_name(basename, layer),
                GroupKind::Primary,
            )?;
            write_real_attr(&group, OUTPUT_DEPTH, depth)?;
            extra(&group)?;
            create_dataset::<Real>(&group, REALSLICE, &shape, None)?;
            write_dimensions(&group, dims)?;
            debug!("Allocated {} with shape {shape:?}", group.name());
        }
        Ok(())
    }

    /// Allocates the complex compact scattering matrix of one pass.
    ///
    /// `shape` is `(x, y, beams)` and `pixel_size` is `(x, y)` in Å.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] if `shape[2]` differs from `num_beams`.
    pub fn allocate_smatrix(
        &self,
        pass_index: usize,
        shape: [usize; 3],
        num_beams: usize,
        pixel_size: (Real, Real),
    ) -> Result<()> {
        if shape[2] != num_beams {
            return Err(Error::Storage(format!(
                "S-matrix shape {shape:?} does not hold {num_beams} beams"
            )));
        }
        let realslices = self.require_group(REALSLICES)?;
        let group = create_result_group(
            &realslices,
            &indexed_name(SMATRIX_BASENAME, pass_index),
            GroupKind::Primary,
        )?;
        create_dataset::<Complex<Real>>(&group, REALSLICE, &shape, None)?;

        #[allow(clippy::cast_precision_loss)]
        let beams: Vec<Real> = (0..num_beams).map(|beam| beam as Real).collect();
        write_dimensions(
            &group,
            &[
                DimensionScale::real("R_x", ANGSTROM_UNITS, linear_axis(shape[0], pixel_size.0)),
                DimensionScale::real("R_y", ANGSTROM_UNITS, linear_axis(shape[1], pixel_size.1)),
                DimensionScale::real("beam_number", NO_UNITS, beams),
            ],
        )?;
        debug!("Allocated {} with shape {shape:?}", group.name());
        Ok(())
    }

    /// Writes the projected potential of one pass as an `(x, y, z)` slice
    /// stack.
    ///
    /// `potential` is in `(z, y, x)` order with `image_shape = (ny, nx)`;
    /// `pixel_size` is `(y, x)`.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] if the buffer does not match the shape.
    pub fn allocate_potential_slices(
        &self,
        potential: &[Real],
        image_shape: (usize, usize),
        num_planes: usize,
        pixel_size: (Real, Real),
        slice_thickness: Real,
        pass_index: usize,
    ) -> Result<()> {
        let (ny, nx) = image_shape;
        let stored = restride(potential, &[num_planes, ny, nx], &[2, 1, 0])
            .map_err(Error::storage)?;
        let realslices = self.require_group(REALSLICES)?;

        let group = create_result_group(
            &realslices,
            &indexed_name(POTENTIAL_BASENAME, pass_index),
            GroupKind::Primary,
        )?;
        let shape = [nx, ny, num_planes];
        let dataset = create_dataset::<Real>(&group, REALSLICE, &shape, None)?;
        let view = ArrayViewD::from_shape(IxDyn(&shape), &stored)
            .map_err(Error::storage)?;
        dataset.write(view)?;

        write_dimensions(
            &group,
            &[
                DimensionScale::real("R_x", LENGTH_UNITS, linear_axis(nx, pixel_size.1)),
                DimensionScale::real("R_y", LENGTH_UNITS, linear_axis(ny, pixel_size.0)),
                DimensionScale::real("R_z", LENGTH_UNITS, linear_axis(num_planes, slice_thickness)),
            ],
        )?;
        debug!("Wrote {} with shape {shape:?}", group.name());
        Ok(())
    }
}

fn checked_scan_shape(geometry: &OutputGeometry, num_layers: usize) -> Result<(usize, usize)> {
    geometry
        .require_layers(num_layers)
        .map_err(Error::storage)?;
    let (sx, sy) = geometry.scan_shape();
    if sx == 0 || sy == 0 {
        return Err(Error::Storage(format!("empty scan grid {sx}x{sy}")));
    }
    Ok((sx, sy))
}
