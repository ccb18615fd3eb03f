//! Type-preserving copies of datasets and their attributes.
//!
//! The element type of a source is matched against the types a container
//! can hold, and the data travels as a typed [`TypedArray`] rather than as
//! raw bytes.

use crate::layout::{leaf_name, FixedString, STRING_LEN};
use crate::{Error, Result};
use hdf5::types::{FixedAscii, H5Type, VarLenUnicode};
use hdf5::{Attribute, Container, Dataset, Group, Location};
use log::debug;
use ndarray::ArrayD;
use num_complex::Complex;

macro_rules! typed_arrays {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// Contents of a dataset or attribute, tagged by element type.
        #[derive(Debug, Clone, PartialEq)]
        pub enum TypedArray {
            $($variant(ArrayD<$ty>),)*
        }

        impl TypedArray {
            fn read_container(container: &Container) -> Result<Self> {
                let descriptor = container.dtype()?.to_descriptor()?;
                $(
                    if descriptor == <$ty as H5Type>::type_descriptor() {
                        return Ok(Self::$variant(container.read_dyn::<$ty>()?));
                    }
                )*
                Err(Error::Storage(format!(
                    "unsupported element type {descriptor:?} in '{}'",
                    container.name()
                )))
            }

            #[must_use]
            pub fn shape(&self) -> &[usize] {
                match self {
                    $(Self::$variant(values) => values.shape(),)*
                }
            }

            /// Writes the array as a new dataset of the same type and shape.
            ///
            /// # Errors
            /// Returns [`Error::Hdf5`] if `name` exists or the write fails.
            pub fn write_dataset(&self, group: &Group, name: &str) -> Result<Dataset> {
                match self {
                    $(Self::$variant(values) => write_dataset_array(group, name, values),)*
                }
            }

            /// Writes the array as a new attribute of the same type and shape.
            ///
            /// # Errors
            /// Returns [`Error::Hdf5`] if `name` exists or the write fails.
            pub fn write_attr(&self, location: &Location, name: &str) -> Result<Attribute> {
                match self {
                    $(Self::$variant(values) => write_attr_array(location, name, values),)*
                }
            }
        }
    };
}

typed_arrays! {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Unicode(FixedString),
    Ascii(FixedAscii<STRING_LEN>),
    VarUnicode(VarLenUnicode),
    C32(Complex<f32>),
    C64(Complex<f64>),
}

impl TypedArray {
    /// String elements, if the array holds strings.
    #[must_use]
    pub fn to_strings(&self) -> Option<Vec<String>> {
        match self {
            Self::Unicode(values) => Some(values.iter().map(|v| v.as_str().to_string()).collect()),
            Self::Ascii(values) => Some(values.iter().map(|v| v.as_str().to_string()).collect()),
            Self::VarUnicode(values) => {
                Some(values.iter().map(|v| v.as_str().to_string()).collect())
            }
            _ => None,
        }
    }
}

/// Something whose contents can be read as a [`TypedArray`].
pub trait TypedSource {
    /// Reads the full contents with their element type.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] for element types outside [`TypedArray`].
    fn read_typed(&self) -> Result<TypedArray>;
}

impl TypedSource for Dataset {
    fn read_typed(&self) -> Result<TypedArray> {
        TypedArray::read_container(self)
    }
}

impl TypedSource for Attribute {
    fn read_typed(&self) -> Result<TypedArray> {
        TypedArray::read_container(self)
    }
}

/// Copies `source` and all its attributes into `target` under the same
/// name. Nested objects are not followed.
///
/// # Errors
/// Returns [`Error::Storage`] if the element type of the data or of an
/// attribute is unsupported, or HDF5 fails (e.g. the name is taken).
pub fn copy_dataset(target: &Group, source: &Dataset) -> Result<Dataset> {
    let source_name = source.name();
    let name = leaf_name(&source_name);
    let copy = source.read_typed()?.write_dataset(target, name)?;

    for attr_name in source.attr_names()? {
        let attr = source.attr(&attr_name)?;
        attr.read_typed()?.write_attr(&copy, &attr_name)?;
    }

    debug!("Copied {source_name} to {}", copy.name());
    Ok(copy)
}

fn write_dataset_array<T: H5Type>(group: &Group, name: &str, values: &ArrayD<T>) -> Result<Dataset> {
    if values.ndim() == 0 {
        let dataset = group.new_dataset::<T>().shape(()).create(name)?;
        if let Some(value) = values.first() {
            dataset.write_scalar(value)?;
        }
        return Ok(dataset);
    }
    let dataset = group
        .new_dataset::<T>()
        .shape(values.shape().to_vec())
        .create(name)?;
    dataset.write(values.view())?;
    Ok(dataset)
}

fn write_attr_array<T: H5Type>(location: &Location, name: &str, values: &ArrayD<T>) -> Result<Attribute> {
    if values.ndim() == 0 {
        let attr = location.new_attr::<T>().create(name)?;
        if let Some(value) = values.first() {
            attr.write_scalar(value)?;
        }
        return Ok(attr);
    }
    let attr = location
        .new_attr::<T>()
        .shape(values.shape().to_vec())
        .create(name)?;
    attr.write(values.view())?;
    Ok(attr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::fixed_string;
    use hdf5::File;
    use ndarray::{arr1, arr2};
    use tempfile::NamedTempFile;

    #[test]
    fn test_copy_preserves_data_and_attributes() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path()).unwrap();
        let source_group = file.create_group("a").unwrap();
        let target = file.create_group("b").unwrap();

        let source = source_group
            .new_dataset::<f64>()
            .shape((2, 3))
            .create("dim1")
            .unwrap();
        source.write(&arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])).unwrap();
        source
            .new_attr::<FixedString>()
            .create("units")
            .unwrap()
            .write_scalar(&fixed_string("[Å]").unwrap())
            .unwrap();
        source
            .new_attr::<i32>()
            .shape(3)
            .create("tile")
            .unwrap()
            .write(&arr1(&[1, 2, 3]))
            .unwrap();

        let copy = copy_dataset(&target, &source).unwrap();
        assert_eq!(copy.name(), "/b/dim1");
        assert_eq!(copy.shape(), vec![2, 3]);
        assert_eq!(copy.read_typed().unwrap(), source.read_typed().unwrap());

        let units = copy.attr("units").unwrap().read_scalar::<FixedString>().unwrap();
        assert_eq!(units.as_str(), "[Å]");
        let tile = copy.attr("tile").unwrap().read_raw::<i32>().unwrap();
        assert_eq!(tile, vec![1, 2, 3]);
    }

    #[test]
    fn test_copy_scalar_and_complex() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path()).unwrap();
        let target = file.create_group("out").unwrap();

        let scalar = file.new_dataset::<u16>().shape(()).create("count").unwrap();
        scalar.write_scalar(&7u16).unwrap();
        let copy = copy_dataset(&target, &scalar).unwrap();
        assert!(copy.shape().is_empty());
        assert_eq!(copy.read_scalar::<u16>().unwrap(), 7);

        let complex = file
            .new_dataset::<Complex<f32>>()
            .shape(2)
            .create("wave")
            .unwrap();
        complex
            .write(&arr1(&[Complex::new(1.0f32, 2.0), Complex::new(-1.0, 0.5)]))
            .unwrap();
        let copy = copy_dataset(&target, &complex).unwrap();
        assert!(matches!(copy.read_typed().unwrap(), TypedArray::C32(_)));
    }

    #[test]
    fn test_copy_into_occupied_name_fails() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path()).unwrap();
        let source = file.new_dataset::<i32>().shape(2).create("x").unwrap();
        source.write(&arr1(&[1, 2])).unwrap();
        assert!(copy_dataset(&file, &source).is_err());
    }

    #[test]
    fn test_to_strings() {
        let labels = TypedArray::Unicode(
            arr1(&[fixed_string("a").unwrap(), fixed_string("b").unwrap()]).into_dyn(),
        );
        assert_eq!(labels.to_strings(), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(TypedArray::I32(arr1(&[1]).into_dyn()).to_strings(), None);
    }
}
