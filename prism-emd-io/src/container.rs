//! Container handle and the write lock shared by accumulating writers.

use crate::layout::SIMULATION_ROOT;
use crate::{Error, Result};
use hdf5::{Dataset, File, Group};
use log::info;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

/// Serializes read-modify-write cycles on one container.
///
/// Cloning shares the underlying mutex, so handles built with
/// [`EmdContainer::with_lock`] exclude each other.
#[derive(Debug, Clone, Default)]
pub struct WriteLock(Arc<Mutex<()>>);

impl WriteLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock is held. The guard releases it on drop.
    ///
    /// A writer that panicked while holding the lock does not poison it for
    /// the remaining passes.
    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether another writer currently holds the lock.
    #[must_use]
    pub fn is_held(&self) -> bool {
        matches!(self.0.try_lock(), Err(TryLockError::WouldBlock))
    }
}

/// An open EMD container file plus its write lock.
///
/// The handle is `Sync`; worker threads share it by reference while
/// accumulating their passes.
#[derive(Debug)]
pub struct EmdContainer {
    file: File,
    lock: WriteLock,
}

impl EmdContainer {
    /// Creates a new container, truncating any existing file.
    ///
    /// # Errors
    /// Returns [`Error::Hdf5`] if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        info!("Created container {}", path.as_ref().display());
        Ok(Self::from_file(file))
    }

    /// Opens an existing container for reading and writing.
    ///
    /// # Errors
    /// Returns [`Error::Hdf5`] if the file is missing or not HDF5.
    pub fn open_rw<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open_rw(path.as_ref())?;
        info!("Opened container {} read/write", path.as_ref().display());
        Ok(Self::from_file(file))
    }

    /// Opens an existing container read-only.
    ///
    /// # Errors
    /// Returns [`Error::Hdf5`] if the file is missing or not HDF5.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: File) -> Self {
        Self {
            file,
            lock: WriteLock::new(),
        }
    }

    /// Replaces this handle's lock with a shared one.
    #[must_use]
    pub fn with_lock(mut self, lock: WriteLock) -> Self {
        self.lock = lock;
        self
    }

    #[must_use]
    pub fn write_lock(&self) -> &WriteLock {
        &self.lock
    }

    #[must_use]
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Whether the simulation record exists.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.file.link_exists(SIMULATION_ROOT)
    }

    /// Opens a group the schema requires, for writing.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] when the container is not initialized or
    /// the group is missing.
    pub fn require_group(&self, path: &str) -> Result<Group> {
        if !self.is_initialized() {
            return Err(Error::Storage(format!(
                "container '{}' is not initialized",
                self.file.filename()
            )));
        }
        self.file
            .group(path)
            .map_err(|_| Error::Storage(format!("missing group '{path}'")))
    }

    /// Opens `<group_path>/<name>` for writing.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] when the group or dataset is missing.
    pub fn require_dataset(&self, group_path: &str, name: &str) -> Result<Dataset> {
        self.require_group(group_path)?
            .dataset(name)
            .map_err(|_| Error::Storage(format!("missing dataset '{name}' in '{group_path}'")))
    }

    /// Flushes all pending writes of the file.
    ///
    /// # Errors
    /// Returns [`Error::Hdf5`] if the flush fails.
    pub fn flush(&self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}
