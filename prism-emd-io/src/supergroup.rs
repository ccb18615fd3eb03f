//! Supergroups: virtual datasets that stack a family of result groups
//! along one or more new axes without copying their data.

use crate::container::EmdContainer;
use crate::copy::copy_dataset;
use crate::layout::{
    dimension_name, indexed_name, region, write_dimension, write_int_attr, DimensionScale,
    GroupKind, ANGSTROM_UNITS, DEPTH_SERIES, DIM_PREFIX, EMD_GROUP_TYPE, METADATA_INDEX,
    OUTPUT_DEPTH, REALSLICE, REALSLICES, SGDIM_PREFIX, SUPERGROUP, SUPERGROUPS,
    VIRTUAL_DETECTOR_BASENAME,
};
use crate::{Error, Result};
use hdf5::types::H5Type;
use hdf5::{Dataset, Group, Selection};
use log::info;
use prism_emd_core::Real;

/// Number of consecutive groups `basename0000`, `basename0001`, ... in
/// `group`. Counting stops at the first missing index.
#[must_use]
pub fn count_data_groups(group: &Group, basename: &str) -> usize {
    (0..)
        .take_while(|&index| group.link_exists(&indexed_name(basename, index)))
        .count()
}

/// Number of consecutive `{prefix}1`, `{prefix}2`, ... objects in `group`.
#[must_use]
pub fn count_dimensions(group: &Group, prefix: &str) -> usize {
    (0..)
        .take_while(|&axis| group.link_exists(&dimension_name(prefix, axis)))
        .count()
}

/// Creates a virtual dataset that places each member at its index tuple.
///
/// The result has the members' common shape followed by one axis per index
/// component, each as long as the largest index plus one. Unmapped
/// positions read as zero. Members may live in other files; each mapping
/// records the member's own file and path.
///
/// # Errors
/// Returns [`Error::Storage`] for an empty member list, index tuples of
/// differing or zero length, or members whose shape or element type do
/// not agree with `T`.
pub fn write_virtual_dataset<T: H5Type>(
    target: &Group,
    name: &str,
    datasets: &[Dataset],
    indices: &[Vec<usize>],
) -> Result<Dataset> {
    let Some(first) = datasets.first() else {
        return Err(Error::Storage(format!("virtual dataset '{name}' has no members")));
    };
    if datasets.len() != indices.len() {
        return Err(Error::Storage(format!(
            "{} members but {} index tuples",
            datasets.len(),
            indices.len()
        )));
    }
    let new_rank = indices[0].len();
    if new_rank == 0 || indices.iter().any(|index| index.len() != new_rank) {
        return Err(Error::Storage(format!(
            "index tuples of '{name}' must share a non-zero length"
        )));
    }

    let member_shape = first.shape();
    let expected_type = T::type_descriptor();
    for dataset in datasets {
        if dataset.shape() != member_shape {
            return Err(Error::Storage(format!(
                "member '{}' has shape {:?}, expected {member_shape:?}",
                dataset.name(),
                dataset.shape()
            )));
        }
        if dataset.dtype()?.to_descriptor()? != expected_type {
            return Err(Error::Storage(format!(
                "member '{}' has a different element type",
                dataset.name()
            )));
        }
    }

    let mut shape = member_shape.clone();
    for axis in 0..new_rank {
        let extent = indices.iter().map(|index| index[axis]).max().unwrap_or(0) + 1;
        shape.push(extent);
    }

    let block: Vec<usize> = member_shape
        .iter()
        .copied()
        .chain(std::iter::repeat(1).take(new_rank))
        .collect();

    let target_file = target.filename();
    let mut builder = target.new_dataset::<T>().shape(shape.clone());
    for (dataset, index) in datasets.iter().zip(indices) {
        let offset: Vec<usize> = std::iter::repeat(0)
            .take(member_shape.len())
            .chain(index.iter().copied())
            .collect();
        let source_file = dataset.filename();
        builder = builder.virtual_map(
            if source_file == target_file {
                "."
            } else {
                source_file.as_str()
            },
            dataset.name(),
            member_shape.clone(),
            Selection::All,
            shape.clone(),
            region(&offset, &block),
        );
    }
    Ok(builder.create(name)?)
}

/// Tags `supergroup` as EMD type 3, copies the calibration datasets of
/// `representative` and writes one `sgdim` per aggregation axis.
///
/// # Errors
/// Returns [`Error::Hdf5`] if a calibration dataset cannot be copied or
/// written, e.g. because `supergroup` already holds one of that name.
pub fn configure_supergroup(
    supergroup: &Group,
    representative: &Group,
    sgdims: &[DimensionScale],
) -> Result<()> {
    write_int_attr(supergroup, EMD_GROUP_TYPE, GroupKind::Supergroup.code())?;
    write_int_attr(supergroup, METADATA_INDEX, 0)?;

    for axis in 0..count_dimensions(representative, DIM_PREFIX) {
        let dim = representative.dataset(&dimension_name(DIM_PREFIX, axis))?;
        copy_dataset(supergroup, &dim)?;
    }
    for (axis, scale) in sgdims.iter().enumerate() {
        write_dimension(supergroup, &dimension_name(SGDIM_PREFIX, axis), scale)?;
    }
    Ok(())
}

/// A family of result groups to stack along one new axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesPlan<'a> {
    /// Data area holding the family, e.g. `4DSTEM_simulation/data/realslices`.
    pub area: &'a str,
    /// Family basename; members are `{basename}{NNNN}`.
    pub basename: &'a str,
    /// Primary dataset inside every member.
    pub dataset: &'a str,
    /// Real attribute of each member giving its coordinate on the new axis.
    pub coordinate_attr: &'a str,
    /// Name of the supergroup created under `data/supergroups`.
    pub target: &'a str,
    pub axis_name: &'a str,
    pub axis_units: &'a str,
}

impl SeriesPlan<'static> {
    /// Virtual-detector slices stacked by output depth.
    #[must_use]
    pub const fn virtual_detector_depth() -> Self {
        Self {
            area: REALSLICES,
            basename: VIRTUAL_DETECTOR_BASENAME,
            dataset: REALSLICE,
            coordinate_attr: OUTPUT_DEPTH,
            target: DEPTH_SERIES,
            axis_name: "Depth",
            axis_units: ANGSTROM_UNITS,
        }
    }
}

impl EmdContainer {
    /// Builds a supergroup over every member of a family.
    ///
    /// Member `n` is mapped to index `n` on the new axis, whose calibration
    /// holds each member's coordinate attribute.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] when the family is empty or the target
    /// supergroup already exists, and [`Error::NotFound`] when a member
    /// lacks its coordinate attribute.
    pub fn build_series(&self, series: &SeriesPlan<'_>) -> Result<Group> {
        let area = self.require_group(series.area)?;
        let supergroups = self.require_group(SUPERGROUPS)?;

        let count = count_data_groups(&area, series.basename);
        if count == 0 {
            return Err(Error::Storage(format!(
                "no '{}' groups in '{}'",
                series.basename, series.area
            )));
        }
        if supergroups.link_exists(series.target) {
            return Err(Error::Storage(format!(
                "supergroup '{}' already exists",
                series.target
            )));
        }

        let mut datasets = Vec::with_capacity(count);
        let mut indices = Vec::with_capacity(count);
        let mut coordinates = Vec::with_capacity(count);
        for index in 0..count {
            let member = area.group(&indexed_name(series.basename, index))?;
            datasets.push(member.dataset(series.dataset)?);
            indices.push(vec![index]);
            let coordinate = member
                .attr(series.coordinate_attr)
                .map_err(|_| Error::not_found(member.name(), series.coordinate_attr))?
                .read_scalar::<Real>()?;
            coordinates.push(coordinate);
        }

        let supergroup = supergroups.create_group(series.target)?;
        write_virtual_dataset::<Real>(&supergroup, SUPERGROUP, &datasets, &indices)?;
        let representative = area.group(&indexed_name(series.basename, 0))?;
        configure_supergroup(
            &supergroup,
            &representative,
            &[DimensionScale::real(series.axis_name, series.axis_units, coordinates)],
        )?;

        self.flush()?;
        info!("Built supergroup {} over {count} members", supergroup.name());
        Ok(supergroup)
    }

    /// Stacks the virtual-detector slices of all output depths into
    /// `supergroups/vd_depth_series`.
    ///
    /// # Errors
    /// As [`EmdContainer::build_series`].
    pub fn build_depth_series(&self) -> Result<Group> {
        self.build_series(&SeriesPlan::virtual_detector_depth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdf5::File;
    use ndarray::{arr1, Array2};
    use tempfile::NamedTempFile;

    fn member(group: &Group, name: &str, values: [f32; 2]) -> Dataset {
        let dataset = group.new_dataset::<f32>().shape(2).create(name).unwrap();
        dataset.write(&arr1(&values)).unwrap();
        dataset
    }

    #[test]
    fn test_count_data_groups_stops_at_gap() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path()).unwrap();
        for index in [0, 2, 3] {
            file.create_group(&indexed_name("layer", index)).unwrap();
        }
        assert_eq!(count_data_groups(&file, "layer"), 1);
        assert_eq!(count_data_groups(&file, "other"), 0);
    }

    #[test]
    fn test_count_dimensions() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path()).unwrap();
        for name in ["dim1", "dim2", "sgdim1"] {
            member(&file, name, [0.0, 1.0]);
        }
        assert_eq!(count_dimensions(&file, DIM_PREFIX), 2);
        assert_eq!(count_dimensions(&file, SGDIM_PREFIX), 1);
    }

    #[test]
    fn test_virtual_dataset_fills_gaps_with_zero() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path()).unwrap();
        let a = member(&file, "a", [1.0, 2.0]);
        let b = member(&file, "b", [3.0, 4.0]);

        let vds =
            write_virtual_dataset::<f32>(&file, "stack", &[a, b], &[vec![0], vec![2]]).unwrap();
        assert_eq!(vds.shape(), vec![2, 3]);

        let values: Array2<f32> = vds.read().unwrap();
        assert_eq!(values, ndarray::arr2(&[[1.0, 0.0, 3.0], [2.0, 0.0, 4.0]]));
    }

    #[test]
    fn test_virtual_dataset_maps_members_in_other_file() {
        let members_tmp = NamedTempFile::new().unwrap();
        let stack_tmp = NamedTempFile::new().unwrap();
        {
            let members = File::create(members_tmp.path()).unwrap();
            let a = member(&members, "a", [1.0, 2.0]);
            let b = member(&members, "b", [3.0, 4.0]);
            let stack = File::create(stack_tmp.path()).unwrap();
            write_virtual_dataset::<f32>(&stack, "stack", &[a, b], &[vec![0], vec![1]]).unwrap();
        }

        let stack = File::open(stack_tmp.path()).unwrap();
        let values: Array2<f32> = stack.dataset("stack").unwrap().read().unwrap();
        assert_eq!(values, ndarray::arr2(&[[1.0, 3.0], [2.0, 4.0]]));
    }

    #[test]
    fn test_virtual_dataset_rejects_bad_members() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path()).unwrap();
        let a = member(&file, "a", [1.0, 2.0]);
        let wide = file.new_dataset::<f32>().shape(3).create("wide").unwrap();
        let ints = file.new_dataset::<i32>().shape(2).create("ints").unwrap();

        assert!(write_virtual_dataset::<f32>(&file, "v0", &[], &[]).is_err());
        assert!(write_virtual_dataset::<f32>(
            &file,
            "v1",
            &[a.clone(), wide],
            &[vec![0], vec![1]]
        )
        .is_err());
        assert!(write_virtual_dataset::<f32>(
            &file,
            "v2",
            &[a.clone(), ints],
            &[vec![0], vec![1]]
        )
        .is_err());
        assert!(
            write_virtual_dataset::<f32>(&file, "v3", &[a.clone(), a], &[vec![0], vec![0, 1]])
                .is_err()
        );
    }

    #[test]
    fn test_depth_series_requires_members() {
        let tmp = NamedTempFile::new().unwrap();
        let container = EmdContainer::create(tmp.path()).unwrap();
        container.initialize().unwrap();
        assert!(matches!(
            container.build_depth_series(),
            Err(Error::Storage(_))
        ));
    }
}
