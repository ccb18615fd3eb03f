//! prism-emd CLI
//!
//! Creates, inspects and post-processes EMD simulation containers.
#![allow(clippy::uninlined_format_args)]

use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};
use prism_emd_core::{OutputGeometry, SimulationParameters};
use prism_emd_io::layout::{
    DATACUBE, DATACUBES, REALSLICE, REALSLICES, SIMULATION_ROOT, SUPERGROUP, SUPERGROUPS,
};
use prism_emd_io::{read_attribute, AttributeKind, EmdContainer};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Container error: {0}")]
    Container(#[from] prism_emd_io::Error),

    #[error("{0} already exists; pass --force to overwrite it")]
    Exists(PathBuf),

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Attribute type selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    /// Single floating-point value
    Real,
    /// Floating-point vector
    RealVec,
    /// Single 32-bit integer
    Int,
    /// Fixed-length string
    Str,
}

impl From<Kind> for AttributeKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Real => Self::Real,
            Kind::RealVec => Self::RealVec,
            Kind::Int => Self::Int,
            Kind::Str => Self::Str,
        }
    }
}

/// EMD output containers for STEM simulations.
#[derive(Parser)]
#[command(name = "prism-emd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a container, record the run parameters and allocate outputs
    Init {
        /// Output container path
        output: PathBuf,

        /// Run parameters (JSON)
        #[arg(short, long)]
        params: PathBuf,

        /// Output geometry (JSON); without it only metadata is written
        #[arg(short, long)]
        geometry: Option<PathBuf>,

        /// Overwrite an existing container
        #[arg(short, long)]
        force: bool,
    },

    /// Show the simulation record and every result group
    Info {
        /// Container path
        input: PathBuf,
    },

    /// Stack virtual-detector slices of all depths into a supergroup
    DepthSeries {
        /// Container path
        input: PathBuf,
    },

    /// Read one attribute
    Attr {
        /// Container path
        input: PathBuf,

        /// Group or dataset holding the attribute
        object: String,

        /// Attribute name
        name: String,

        /// Expected attribute type
        #[arg(short, long, value_enum, default_value = "real")]
        kind: Kind,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Init {
            output,
            params,
            geometry,
            force,
        } => {
            let params: SimulationParameters = load_json(&params)?;
            let geometry: Option<OutputGeometry> =
                geometry.as_deref().map(load_json).transpose()?;
            init_container(&output, &params, geometry.as_ref(), force)?;
            println!("Created {}", output.display());
        }

        Commands::Info { input } => print_info(&input)?,

        Commands::DepthSeries { input } => {
            let container = EmdContainer::open_rw(&input)?;
            let supergroup = container.build_depth_series()?;
            println!("Created {}", supergroup.name());
        }

        Commands::Attr {
            input,
            object,
            name,
            kind,
        } => {
            let value = read_attribute(&input, &object, &name, kind.into())?;
            println!("{value}");
        }
    }

    Ok(())
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Allocates the outputs the parameters ask for, one layer per depth.
/// An existing file is only replaced when `force` is set.
fn init_container(
    output: &Path,
    params: &SimulationParameters,
    geometry: Option<&OutputGeometry>,
    force: bool,
) -> Result<()> {
    if output.exists() {
        if !force {
            return Err(CliError::Exists(output.to_path_buf()));
        }
        warn!("Overwriting {}", output.display());
    }
    let container = EmdContainer::create(output)?;
    container.initialize()?;
    container.write_run_metadata(params)?;

    let Some(geometry) = geometry else {
        return Ok(());
    };
    let layers = geometry.depths.len();
    info!("Allocating {layers} output layer(s)");

    if params.save_3d_output {
        container.allocate_virtual_detector(layers, geometry)?;
    }
    if params.save_4d_output {
        container.allocate_4d(layers, geometry, params.algorithm, params.crop)?;
    }
    if params.save_2d_output {
        container.allocate_annular(layers, geometry)?;
    }
    if params.save_dpc_com {
        container.allocate_dpc(layers, geometry)?;
    }
    container.flush()?;
    Ok(())
}

fn print_info(input: &Path) -> Result<()> {
    let container = EmdContainer::open(input)?;
    let root = SIMULATION_ROOT;
    let major = read_attribute(input, root, "version_major", AttributeKind::Int)?;
    let minor = read_attribute(input, root, "version_minor", AttributeKind::Int)?;

    println!("File: {}", input.display());
    println!("EMD version: {major}.{minor}");

    for (area, primary) in [
        (DATACUBES, DATACUBE),
        (REALSLICES, REALSLICE),
        (SUPERGROUPS, SUPERGROUP),
    ] {
        let group = container.require_group(area)?;
        let mut names = group.member_names().map_err(prism_emd_io::Error::from)?;
        names.sort();
        debug!("{area}: {} member(s)", names.len());

        for name in names {
            let path = format!("{area}/{name}");
            match container.require_dataset(&path, primary) {
                Ok(dataset) => println!("{path}: {:?}", dataset.shape()),
                Err(_) => println!("{path}: (no {primary})"),
            }
        }
    }
    Ok(())
}
