//! EMD 0.5 layout: fixed paths, group naming, and the attribute and
//! dimension-scale helpers every writer shares.

use crate::{Error, Result};
use hdf5::types::{FixedUnicode, H5Type};
use hdf5::{Dataset, Group, Hyperslab, Location, Selection, SliceOrIndex};
use ndarray::ArrayView1;
use prism_emd_core::Real;
use std::str::FromStr;

pub const SIMULATION_ROOT: &str = "4DSTEM_simulation";
pub const DATA: &str = "4DSTEM_simulation/data";
pub const DATACUBES: &str = "4DSTEM_simulation/data/datacubes";
pub const DIFFRACTION_SLICES: &str = "4DSTEM_simulation/data/diffractionslices";
pub const REALSLICES: &str = "4DSTEM_simulation/data/realslices";
pub const POINTLISTS: &str = "4DSTEM_simulation/data/pointlists";
pub const POINTLIST_ARRAYS: &str = "4DSTEM_simulation/data/pointlistarrays";
pub const SUPERGROUPS: &str = "4DSTEM_simulation/data/supergroups";
pub const LOG: &str = "4DSTEM_simulation/log";
pub const METADATA: &str = "4DSTEM_simulation/metadata";
pub const METADATA_0: &str = "4DSTEM_simulation/metadata/metadata_0";
pub const METADATA_ORIGINAL: &str = "4DSTEM_simulation/metadata/metadata_0/original";
pub const SIMULATION_PARAMETERS: &str = "simulation_parameters";

/// Groups under `metadata_0/original`.
pub const ORIGINAL_SUBGROUPS: [&str; 2] = ["shortlist", "all"];
/// Groups under `metadata_0` next to `original`.
pub const METADATA_SUBGROUPS: [&str; 5] = ["microscope", "sample", "user", "calibration", "comments"];
/// Groups under `data`.
pub const DATA_AREAS: [&str; 6] = [
    "datacubes",
    "diffractionslices",
    "realslices",
    "pointlists",
    "pointlistarrays",
    "supergroups",
];

pub const VERSION_MAJOR: i32 = 0;
pub const VERSION_MINOR: i32 = 5;

pub const DATACUBE_BASENAME: &str = "CBED_array_depth";
pub const VIRTUAL_DETECTOR_BASENAME: &str = "virtual_detector_depth";
pub const ANNULAR_BASENAME: &str = "annular_detector_depth";
pub const DPC_BASENAME: &str = "DPC_CoM_depth";
pub const SMATRIX_BASENAME: &str = "smatrix_fp";
pub const POTENTIAL_BASENAME: &str = "ppotential_fp";
pub const DEPTH_SERIES: &str = "vd_depth_series";

/// Primary dataset names.
pub const DATACUBE: &str = "datacube";
pub const REALSLICE: &str = "realslice";
pub const SUPERGROUP: &str = "supergroup";

pub const DIM_PREFIX: &str = "dim";
pub const SGDIM_PREFIX: &str = "sgdim";

pub const EMD_GROUP_TYPE: &str = "emd_group_type";
pub const METADATA_INDEX: &str = "metadata";
pub const OUTPUT_DEPTH: &str = "output_depth";
pub const DEPTH: &str = "depth";

pub const LENGTH_UNITS: &str = "[n_m]";
pub const RECIPROCAL_UNITS: &str = "[n_m^-1]";
pub const ANGLE_UNITS: &str = "[mrad]";
pub const ANGSTROM_UNITS: &str = "[Å]";
pub const NO_UNITS: &str = "[none]";

pub const DPC_LABELS: [&str; 2] = ["DPC_CoM_x", "DPC_CoM_y"];

/// Byte length of every string attribute and string dataset.
pub const STRING_LEN: usize = 256;

/// Fixed-length, null-padded string element.
pub type FixedString = FixedUnicode<STRING_LEN>;

/// EMD group kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Primary,
    Root,
    Supergroup,
}

impl GroupKind {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Primary => 1,
            Self::Root => 2,
            Self::Supergroup => 3,
        }
    }
}

/// `basename` followed by a 4-digit zero-padded index.
#[must_use]
pub fn indexed_name(basename: &str, index: usize) -> String {
    format!("{basename}{index:04}")
}

/// `dim{n}` / `sgdim{n}`, counted from 1.
#[must_use]
pub fn dimension_name(prefix: &str, axis: usize) -> String {
    format!("{prefix}{}", axis + 1)
}

/// Last component of an HDF5 path.
#[must_use]
pub fn leaf_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Values of a calibration axis.
#[derive(Debug, Clone, PartialEq)]
pub enum DimValues {
    Real(Vec<Real>),
    Labels(Vec<String>),
}

/// A 1-D calibration dataset with its `name` and `units` attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionScale {
    pub name: String,
    pub units: String,
    pub values: DimValues,
}

impl DimensionScale {
    #[must_use]
    pub fn real(name: &str, units: &str, values: Vec<Real>) -> Self {
        Self {
            name: name.to_string(),
            units: units.to_string(),
            values: DimValues::Real(values),
        }
    }

    #[must_use]
    pub fn labels(name: &str, units: &str, labels: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            units: units.to_string(),
            values: DimValues::Labels(labels.iter().map(ToString::to_string).collect()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.values {
            DimValues::Real(values) => values.len(),
            DimValues::Labels(labels) => labels.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Writes `dim1..dimN` in axis order.
pub(crate) fn write_dimensions(group: &Group, scales: &[DimensionScale]) -> Result<()> {
    for (axis, scale) in scales.iter().enumerate() {
        write_dimension(group, &dimension_name(DIM_PREFIX, axis), scale)?;
    }
    Ok(())
}

/// Writes one calibration dataset and its `name`/`units` attributes.
pub(crate) fn write_dimension(group: &Group, name: &str, scale: &DimensionScale) -> Result<Dataset> {
    let dataset = match &scale.values {
        DimValues::Real(values) => {
            let dataset = create_dataset::<Real>(group, name, &[values.len()], None)?;
            dataset.write(ArrayView1::from(values.as_slice()))?;
            dataset
        }
        DimValues::Labels(labels) => {
            let dataset = create_dataset::<FixedString>(group, name, &[labels.len()], None)?;
            let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
            write_string_array(&dataset, &labels)?;
            dataset
        }
    };
    write_str_attr(&dataset, "name", &scale.name)?;
    write_str_attr(&dataset, "units", &scale.units)?;
    Ok(dataset)
}

/// Writes a 1-D fixed-string dataset in one call.
///
/// # Errors
/// Returns an error if a label exceeds [`STRING_LEN`] bytes, the dataset
/// length differs from `labels.len()`, or HDF5 I/O fails.
pub fn write_string_array(dataset: &Dataset, labels: &[&str]) -> Result<()> {
    if dataset.shape() != [labels.len()] {
        return Err(Error::Storage(format!(
            "string dataset '{}' has shape {:?}, got {} labels",
            dataset.name(),
            dataset.shape(),
            labels.len()
        )));
    }
    let values = labels
        .iter()
        .map(|label| fixed_string(label))
        .collect::<Result<Vec<_>>>()?;
    dataset.write(ArrayView1::from(values.as_slice()))?;
    Ok(())
}

pub(crate) fn create_dataset<T: H5Type>(
    group: &Group,
    name: &str,
    shape: &[usize],
    chunk: Option<[usize; 4]>,
) -> Result<Dataset> {
    let mut builder = group.new_dataset::<T>().shape(shape.to_vec());

    if let Some(chunk_shape) = chunk {
        builder = builder.chunk(chunk_shape);
    }

    Ok(builder.create(name)?)
}

/// Creates a result group carrying the EMD header attributes.
pub(crate) fn create_result_group(area: &Group, name: &str, kind: GroupKind) -> Result<Group> {
    if area.link_exists(name) {
        return Err(Error::Storage(format!(
            "group '{name}' already exists in '{}'",
            area.name()
        )));
    }
    let group = area.create_group(name)?;
    write_int_attr(&group, EMD_GROUP_TYPE, kind.code())?;
    write_int_attr(&group, METADATA_INDEX, 0)?;
    Ok(group)
}

/// Hyperslab covering `shape` elements starting at `offset`.
pub(crate) fn region(offset: &[usize], shape: &[usize]) -> Selection {
    let slices: Vec<SliceOrIndex> = offset
        .iter()
        .zip(shape)
        .map(|(&start, &count)| SliceOrIndex::from(start..start + count))
        .collect();
    Selection::from(Hyperslab::from(slices))
}

pub(crate) fn write_int_attr(location: &Location, name: &str, value: i32) -> Result<()> {
    location
        .new_attr::<i32>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

pub(crate) fn write_real_attr(location: &Location, name: &str, value: Real) -> Result<()> {
    location
        .new_attr::<Real>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

pub(crate) fn write_str_attr(location: &Location, name: &str, value: &str) -> Result<()> {
    let value = fixed_string(value)?;
    location
        .new_attr::<FixedString>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

pub(crate) fn write_real_vec_attr(location: &Location, name: &str, values: &[Real]) -> Result<()> {
    let attr = location
        .new_attr::<Real>()
        .shape((values.len(),))
        .create(name)?;
    attr.write(ArrayView1::from(values))?;
    Ok(())
}

pub(crate) fn write_int_vec_attr(location: &Location, name: &str, values: &[i32]) -> Result<()> {
    let attr = location
        .new_attr::<i32>()
        .shape((values.len(),))
        .create(name)?;
    attr.write(ArrayView1::from(values))?;
    Ok(())
}

pub(crate) fn fixed_string(value: &str) -> Result<FixedString> {
    FixedString::from_str(value)
        .map_err(|e| Error::Storage(format!("invalid string attribute '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_name() {
        assert_eq!(indexed_name(DATACUBE_BASENAME, 0), "CBED_array_depth0000");
        assert_eq!(indexed_name(SMATRIX_BASENAME, 12), "smatrix_fp0012");
        assert_eq!(indexed_name("x", 12345), "x12345");
    }

    #[test]
    fn test_dimension_name() {
        assert_eq!(dimension_name(DIM_PREFIX, 0), "dim1");
        assert_eq!(dimension_name(SGDIM_PREFIX, 2), "sgdim3");
    }

    #[test]
    fn test_leaf_name() {
        assert_eq!(leaf_name("/4DSTEM_simulation/data/realslices/a/dim1"), "dim1");
        assert_eq!(leaf_name("dim2"), "dim2");
    }

    #[test]
    fn test_fixed_string_limits() {
        assert_eq!(fixed_string(ANGSTROM_UNITS).unwrap().as_str(), "[Å]");
        assert!(fixed_string(&"x".repeat(STRING_LEN + 1)).is_err());
    }

    #[test]
    fn test_dimension_scale_len() {
        let scale = DimensionScale::labels("CoM", NO_UNITS, &DPC_LABELS);
        assert_eq!(scale.len(), 2);
        assert!(!scale.is_empty());
        assert!(DimensionScale::real("R_x", LENGTH_UNITS, Vec::new()).is_empty());
    }

    #[test]
    fn test_group_kind_codes() {
        assert_eq!(GroupKind::Primary.code(), 1);
        assert_eq!(GroupKind::Root.code(), 2);
        assert_eq!(GroupKind::Supergroup.code(), 3);
    }
}
