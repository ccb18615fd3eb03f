//! Read access to finished containers.
//!
//! Readers open the file read-only for the duration of one call. 4D reads
//! undo the axis order the accumulating writer applies.

use crate::copy::TypedSource;
use crate::{Error, Result};
use hdf5::{Attribute, Dataset, File};
use ndarray::{Array2, Array3, Array4, Dimension};
use prism_emd_core::{permuted_shape, restride, Real};
use std::path::Path;

/// Axis order applied by [`read_array_4d`].
pub const READ_ORDER_4D: [usize; 4] = [1, 0, 3, 2];

/// Reads a 2D dataset in file axis order.
///
/// # Errors
/// Returns [`Error::NotFound`] for a missing dataset and [`Error::Storage`]
/// when its rank is not 2.
pub fn read_array_2d<P: AsRef<Path>>(path: P, dataset_path: &str) -> Result<Array2<Real>> {
    let dataset = open_dataset(path.as_ref(), dataset_path)?;
    read_ranked(&dataset)
}

/// Reads a 3D dataset in file axis order.
///
/// # Errors
/// As [`read_array_2d`], for rank 3.
pub fn read_array_3d<P: AsRef<Path>>(path: P, dataset_path: &str) -> Result<Array3<Real>> {
    let dataset = open_dataset(path.as_ref(), dataset_path)?;
    read_ranked(&dataset)
}

/// Reads a 4D datacube and permutes it with [`READ_ORDER_4D`].
///
/// A cube written by [`EmdContainer::accumulate_4d`] reads back as the
/// simulation buffer with its two scan axes exchanged.
///
/// # Errors
/// As [`read_array_4d_keep_order`].
///
/// [`EmdContainer::accumulate_4d`]: crate::EmdContainer::accumulate_4d
pub fn read_array_4d<P: AsRef<Path>>(path: P, dataset_path: &str) -> Result<Array4<Real>> {
    let stored = read_array_4d_keep_order(path, dataset_path)?;
    let dims = stored.shape().to_vec();
    let data = stored.as_standard_layout().iter().copied().collect::<Vec<_>>();
    let shape = permuted_shape(&dims, &READ_ORDER_4D)?;
    let permuted = restride(&data, &dims, &READ_ORDER_4D)?;
    Array4::from_shape_vec([shape[0], shape[1], shape[2], shape[3]], permuted)
        .map_err(Error::storage)
}

/// Reads a 4D datacube in file axis order.
///
/// # Errors
/// As [`read_array_2d`], for rank 4.
pub fn read_array_4d_keep_order<P: AsRef<Path>>(
    path: P,
    dataset_path: &str,
) -> Result<Array4<Real>> {
    let dataset = open_dataset(path.as_ref(), dataset_path)?;
    read_ranked(&dataset)
}

/// Requested attribute type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Real,
    RealVec,
    Int,
    Str,
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Real(Real),
    RealVec(Vec<Real>),
    Int(i32),
    Str(String),
}

impl AttributeValue {
    #[must_use]
    pub fn as_real(&self) -> Option<Real> {
        match self {
            Self::Real(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_real_vec(&self) -> Option<&[Real]> {
        match self {
            Self::RealVec(values) => Some(values),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real(value) => write!(f, "{value}"),
            Self::RealVec(values) => write!(f, "{values:?}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
        }
    }
}

/// Reads attribute `name` of the group (or dataset) at `group_path`.
///
/// Numeric attributes are converted to the requested type by HDF5.
///
/// # Errors
/// Returns [`Error::NotFound`] when the object or attribute is missing and
/// [`Error::Storage`] when the stored value does not fit `kind`.
pub fn read_attribute<P: AsRef<Path>>(
    path: P,
    group_path: &str,
    name: &str,
    kind: AttributeKind,
) -> Result<AttributeValue> {
    let file = File::open(path.as_ref())?;
    let attr = open_attribute(&file, group_path, name)?;

    match kind {
        AttributeKind::Real => {
            single(attr.read_raw::<Real>()?, group_path, name).map(AttributeValue::Real)
        }
        AttributeKind::Int => {
            single(attr.read_raw::<i32>()?, group_path, name).map(AttributeValue::Int)
        }
        AttributeKind::RealVec => Ok(AttributeValue::RealVec(attr.read_raw::<Real>()?)),
        AttributeKind::Str => {
            let strings = attr.read_typed()?.to_strings().ok_or_else(|| {
                Error::Storage(format!("attribute '{name}' of '{group_path}' is not a string"))
            })?;
            single(strings, group_path, name).map(AttributeValue::Str)
        }
    }
}

fn open_dataset(path: &Path, dataset_path: &str) -> Result<Dataset> {
    let file = File::open(path)?;
    let (parent, name) = dataset_path
        .rsplit_once('/')
        .unwrap_or(("/", dataset_path));
    file.dataset(dataset_path)
        .map_err(|_| Error::not_found(parent, name))
}

fn open_attribute(file: &File, object_path: &str, name: &str) -> Result<Attribute> {
    let attr = if let Ok(group) = file.group(object_path) {
        group.attr(name)
    } else if let Ok(dataset) = file.dataset(object_path) {
        dataset.attr(name)
    } else {
        return Err(Error::not_found(object_path, name));
    };
    attr.map_err(|_| Error::not_found(object_path, name))
}

fn read_ranked<D: Dimension>(dataset: &Dataset) -> Result<ndarray::Array<Real, D>> {
    if let Some(rank) = D::NDIM {
        if dataset.ndim() != rank {
            return Err(Error::Storage(format!(
                "'{}' has rank {}, expected {rank}",
                dataset.name(),
                dataset.ndim()
            )));
        }
    }
    Ok(dataset.read::<Real, D>()?)
}

fn single<T>(values: Vec<T>, path: &str, name: &str) -> Result<T> {
    let len = values.len();
    let mut values = values.into_iter();
    match (values.next(), len) {
        (Some(value), 1) => Ok(value),
        _ => Err(Error::Storage(format!(
            "attribute '{name}' of '{path}' holds {len} values, expected 1"
        ))),
    }
}
