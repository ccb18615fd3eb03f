//! prism-emd-io: EMD 0.5 containers for STEM simulation output.
//!
//! This crate writes and reads the HDF5 container a simulation run
//! produces: the fixed group skeleton, 4D diffraction datacubes averaged
//! over frozen-phonon passes, 2D/3D real-space slices, the run metadata
//! record, and virtual-dataset supergroups that stack result families.
//!
//! ```no_run
//! use prism_emd_core::{Algorithm, CropPolicy, OutputGeometry, SimulationParameters};
//! use prism_emd_io::EmdContainer;
//!
//! # fn main() -> prism_emd_io::Result<()> {
//! let geometry = OutputGeometry::default();
//! let container = EmdContainer::create("run.h5")?;
//! container.initialize()?;
//! container.allocate_virtual_detector(1, &geometry)?;
//! container.write_run_metadata(&SimulationParameters::default())?;
//! # Ok(())
//! # }
//! ```

mod accumulate;
mod container;
pub mod copy;
mod error;
pub mod layout;
pub mod metadata;
pub mod reader;
mod schema;
pub mod supergroup;

pub use container::{EmdContainer, WriteLock};
pub use copy::{copy_dataset, TypedArray, TypedSource};
pub use error::{Error, Result};
pub use layout::{write_string_array, DimValues, DimensionScale, GroupKind};
pub use reader::{
    read_array_2d, read_array_3d, read_array_4d, read_array_4d_keep_order, read_attribute,
    AttributeKind, AttributeValue,
};
pub use supergroup::{
    configure_supergroup, count_data_groups, count_dimensions, write_virtual_dataset, SeriesPlan,
};
