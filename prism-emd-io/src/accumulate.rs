//! Writes of simulation results into allocated storage.
//!
//! 4D datacubes are averaged over frozen-phonon passes: every pass adds its
//! own contribution scaled by `1 / pass_count` into the stored values. The
//! read-modify-write cycle runs under the container's [`WriteLock`].
//!
//! [`WriteLock`]: crate::WriteLock

use crate::container::EmdContainer;
use crate::layout::{create_dataset, region, DATACUBE, REALSLICE};
use crate::{Error, Result};
use hdf5::Dataset;
use log::debug;
use ndarray::{Array4, ArrayViewD, IxDyn};
use num_complex::Complex;
use prism_emd_core::restride::check_len;
use prism_emd_core::{swap_last_two_axes, Real};
use rayon::prelude::*;

impl EmdContainer {
    /// Adds one pass's diffraction patterns into `<group_path>/datacube`.
    ///
    /// `buffer` is row-major with extent `shape` in the simulation's order,
    /// where the last two axes are swapped relative to the file. The stored
    /// region starting at `offset` becomes `stored + buffer / pass_count`.
    ///
    /// Concurrent callers sharing this container are serialized; the file is
    /// flushed before the lock is released.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] before touching the file if the buffer
    /// does not match `shape`, the region falls outside the dataset, or
    /// `pass_count` is zero.
    pub fn accumulate_4d(
        &self,
        group_path: &str,
        buffer: &[Real],
        shape: [usize; 4],
        offset: [usize; 4],
        pass_count: usize,
    ) -> Result<()> {
        if pass_count == 0 {
            return Err(Error::Storage("pass count must be at least 1".to_string()));
        }
        check_len(buffer.len(), &shape).map_err(Error::storage)?;

        // simulation buffers hold (x, y, qY, qX)
        let simulation_shape = [shape[0], shape[1], shape[3], shape[2]];
        #[allow(clippy::cast_precision_loss)]
        let count = pass_count as Real;
        let scaled: Vec<Real> = buffer.par_iter().map(|&v| v / count).collect();
        let contribution =
            swap_last_two_axes(&scaled, &simulation_shape).map_err(Error::storage)?;
        let mut contribution =
            Array4::from_shape_vec(shape, contribution).map_err(Error::storage)?;

        let _guard = self.write_lock().acquire();

        let dataset = self.require_dataset(group_path, DATACUBE)?;
        check_region(&dataset, &shape, &offset)?;
        let selection = region(&offset, &shape);

        let stored: Array4<Real> = dataset.read_slice(selection.clone())?;
        contribution += &stored;
        dataset.write_slice(&contribution, selection)?;
        self.flush()?;

        debug!("Accumulated {shape:?} at {offset:?} into {group_path}");
        Ok(())
    }

    /// Writes a complete 3D slice stack to `<group_path>/realslice`.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] if `shape` differs from the dataset's.
    pub fn write_datacube_3d(
        &self,
        group_path: &str,
        buffer: &[Real],
        shape: [usize; 3],
    ) -> Result<()> {
        let dataset = self.require_dataset(group_path, REALSLICE)?;
        write_full(&dataset, buffer, &shape)
    }

    /// Writes a complete 2D image to `<group_path>/realslice`.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] if `shape` differs from the dataset's.
    pub fn write_real_slice(
        &self,
        group_path: &str,
        buffer: &[Real],
        shape: [usize; 2],
    ) -> Result<()> {
        let dataset = self.require_dataset(group_path, REALSLICE)?;
        write_full(&dataset, buffer, &shape)
    }

    /// Writes a complex buffer to `<group_path>/<name>`, creating the
    /// dataset when it does not exist yet.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] if the buffer does not match `shape` or an
    /// existing dataset has a different shape.
    pub fn write_complex_dataset(
        &self,
        group_path: &str,
        name: &str,
        buffer: &[Complex<Real>],
        shape: &[usize],
    ) -> Result<()> {
        let group = self.require_group(group_path)?;
        let dataset = if group.link_exists(name) {
            group.dataset(name)?
        } else {
            create_dataset::<Complex<Real>>(&group, name, shape, None)?
        };
        write_full(&dataset, buffer, shape)
    }
}

fn check_region(dataset: &Dataset, shape: &[usize], offset: &[usize]) -> Result<()> {
    let extent = dataset.shape();
    let inside = extent.len() == shape.len()
        && extent
            .iter()
            .zip(shape.iter().zip(offset))
            .all(|(&dim, (&len, &start))| start.checked_add(len).is_some_and(|end| end <= dim));
    if !inside {
        return Err(Error::Storage(format!(
            "region {shape:?} at {offset:?} outside '{}' of shape {extent:?}",
            dataset.name()
        )));
    }
    Ok(())
}

fn write_full<T: hdf5::H5Type>(dataset: &Dataset, buffer: &[T], shape: &[usize]) -> Result<()> {
    if dataset.shape() != shape {
        return Err(Error::Storage(format!(
            "'{}' has shape {:?}, got {shape:?}",
            dataset.name(),
            dataset.shape()
        )));
    }
    let view = ArrayViewD::from_shape(IxDyn(shape), buffer).map_err(Error::storage)?;
    dataset.write(view)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{DATACUBES, REALSLICES};
    use prism_emd_core::{Algorithm, CropPolicy, OutputGeometry};
    use tempfile::NamedTempFile;

    const CUBE: &str = "4DSTEM_simulation/data/datacubes/CBED_array_depth0000";

    fn container_with_cube() -> (NamedTempFile, EmdContainer) {
        let file = NamedTempFile::new().unwrap();
        let container = EmdContainer::create(file.path()).unwrap();
        container.initialize().unwrap();
        let geometry = OutputGeometry {
            xp: vec![0.0, 1.0],
            yp: vec![0.0, 1.0],
            qx: vec![0.0, 1.0, -2.0, -1.0],
            qy: vec![0.0, 1.0, -1.0],
            probe_dims: (4, 3),
            lambda: 0.02,
            detector_angles: vec![1.0],
            depths: vec![5.0],
        };
        container
            .allocate_4d(1, &geometry, Algorithm::Prism, CropPolicy::Full)
            .unwrap();
        (file, container)
    }

    #[test]
    fn test_accumulate_swaps_reciprocal_axes() {
        let (_file, container) = container_with_cube();
        // one probe position, simulation pattern (qY=3, qX=4)
        #[allow(clippy::cast_precision_loss)]
        let buffer: Vec<Real> = (0..12).map(|v| v as Real).collect();
        container
            .accumulate_4d(CUBE, &buffer, [1, 1, 4, 3], [1, 0, 0, 0], 1)
            .unwrap();

        let dataset = container.file().dataset(&format!("{CUBE}/{DATACUBE}")).unwrap();
        let stored: Array4<Real> = dataset.read().unwrap();
        assert_eq!(stored.shape(), &[2, 2, 4, 3]);
        for qx in 0..4 {
            for qy in 0..3 {
                assert!((stored[[1, 0, qx, qy]] - buffer[qy * 4 + qx]).abs() < Real::EPSILON);
            }
        }
        assert!(stored.slice(ndarray::s![0, .., .., ..]).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_accumulate_averages_passes() {
        let (_file, container) = container_with_cube();
        let ones = vec![1.0; 2 * 2 * 4 * 3];
        for _ in 0..4 {
            container
                .accumulate_4d(CUBE, &ones, [2, 2, 4, 3], [0, 0, 0, 0], 4)
                .unwrap();
        }
        let dataset = container.file().dataset(&format!("{CUBE}/{DATACUBE}")).unwrap();
        let stored = dataset.read_raw::<Real>().unwrap();
        assert!(stored.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_accumulate_rejects_bad_shapes() {
        let (_file, container) = container_with_cube();
        let short = vec![1.0; 5];
        assert!(matches!(
            container.accumulate_4d(CUBE, &short, [1, 1, 4, 3], [0, 0, 0, 0], 1),
            Err(Error::Storage(_))
        ));

        let pattern = vec![1.0; 12];
        assert!(matches!(
            container.accumulate_4d(CUBE, &pattern, [1, 1, 4, 3], [2, 0, 0, 0], 1),
            Err(Error::Storage(_))
        ));
        assert!(matches!(
            container.accumulate_4d(CUBE, &pattern, [1, 1, 4, 3], [0, 0, 0, 0], 0),
            Err(Error::Storage(_))
        ));
        assert!(!container.write_lock().is_held());
    }

    #[test]
    fn test_accumulate_rejects_overflowing_offset() {
        let (_file, container) = container_with_cube();
        let pattern = vec![1.0; 12];
        assert!(matches!(
            container.accumulate_4d(CUBE, &pattern, [1, 1, 4, 3], [usize::MAX, 0, 0, 0], 1),
            Err(Error::Storage(_))
        ));
        assert!(!container.write_lock().is_held());
    }

    #[test]
    fn test_accumulate_missing_group() {
        let (_file, container) = container_with_cube();
        let pattern = vec![1.0; 12];
        let missing = format!("{DATACUBES}/CBED_array_depth0001");
        assert!(container
            .accumulate_4d(&missing, &pattern, [1, 1, 4, 3], [0, 0, 0, 0], 1)
            .is_err());
        assert!(!container.write_lock().is_held());
    }

    #[test]
    fn test_write_real_slice_shape_checked() {
        let file = NamedTempFile::new().unwrap();
        let container = EmdContainer::create(file.path()).unwrap();
        container.initialize().unwrap();
        let geometry = OutputGeometry {
            xp: vec![0.0, 1.0, 2.0],
            yp: vec![0.0, 1.0],
            depths: vec![1.0],
            ..OutputGeometry::default()
        };
        container.allocate_annular(1, &geometry).unwrap();
        let path = format!("{REALSLICES}/annular_detector_depth0000");

        assert!(container.write_real_slice(&path, &[0.0; 6], [2, 3]).is_err());
        let image: Vec<Real> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        container.write_real_slice(&path, &image, [3, 2]).unwrap();

        let stored = container
            .file()
            .dataset(&format!("{path}/{REALSLICE}"))
            .unwrap()
            .read_raw::<Real>()
            .unwrap();
        assert_eq!(stored, image);
    }

    #[test]
    fn test_write_complex_dataset_create_or_open() {
        let file = NamedTempFile::new().unwrap();
        let container = EmdContainer::create(file.path()).unwrap();
        container.initialize().unwrap();

        let values = vec![Complex::new(1.0, -1.0), Complex::new(0.5, 2.0)];
        container
            .write_complex_dataset(REALSLICES, "probe", &values, &[2])
            .unwrap();
        let updated = vec![Complex::new(3.0, 0.0), Complex::new(0.0, 3.0)];
        container
            .write_complex_dataset(REALSLICES, "probe", &updated, &[2])
            .unwrap();
        assert!(container
            .write_complex_dataset(REALSLICES, "probe", &updated, &[1, 2])
            .is_err());

        let stored = container
            .file()
            .dataset(&format!("{REALSLICES}/probe"))
            .unwrap()
            .read_raw::<Complex<Real>>()
            .unwrap();
        assert_eq!(stored, updated);
    }
}
