//! Filesystem type registration and mount lifecycle
//!
//! # Architecture
//!
//! - `Registry`: named filesystem types available for mounting
//! - `FileSystemType`: a name plus the fill function that builds an instance
//! - `MountController`: mounts and unmounts instances through the registry
//! - `Superblock`: one mounted instance, owning its node tree and counters
//!
//! Mounting follows single-instance semantics: while an instance of a type is
//! alive every mount of that type returns it. Once the last holder drops it,
//! the next mount fills a fresh instance with fresh counters.

mod options;
mod superblock;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::node::TreeError;

pub use options::MountOptions;
pub use superblock::{
    fill_root, join_path, OpenError, StatFs, Superblock, BLOCK_SIZE, NAME_MAX, PIKAQFS_MAGIC,
};

/// Registered name of the counter filesystem
pub const FS_NAME: &str = "pikaqfs";

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("unknown filesystem type '{0}'")]
    UnknownFilesystem(String),
    #[error("filesystem type '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("filesystem type '{0}' has a live instance")]
    Busy(String),
    #[error("failed to fill superblock: {0}")]
    Fill(#[from] TreeError),
}

/// Builds a fresh instance from parsed options
pub type FillFn = fn(&MountOptions) -> Result<Superblock, TreeError>;

/// A mountable filesystem type
pub struct FileSystemType {
    name: &'static str,
    fill: FillFn,
    /// The live instance, if any holder still references it
    active: Mutex<Weak<Superblock>>,
    next_instance: AtomicU64,
}

impl FileSystemType {
    pub fn new(name: &'static str, fill: FillFn) -> Self {
        Self {
            name,
            fill,
            active: Mutex::new(Weak::new()),
            next_instance: AtomicU64::new(1),
        }
    }

    /// The counter filesystem type
    pub fn pikaqfs() -> Self {
        Self::new(FS_NAME, fill_root)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Return the live instance, or fill and publish a new one
    pub fn mount_single(&self, options: &MountOptions) -> Result<Arc<Superblock>, MountError> {
        let mut active = self.active.lock();

        if let Some(sb) = active.upgrade() {
            tracing::debug!(
                "{}: reusing live instance {}, options ignored",
                self.name,
                sb.instance()
            );
            return Ok(sb);
        }

        let mut sb = (self.fill)(options)?;
        sb.instance = self.next_instance.fetch_add(1, Ordering::SeqCst);
        let sb = Arc::new(sb);
        *active = Arc::downgrade(&sb);

        tracing::info!("{}: filled instance {}", self.name, sb.instance());
        Ok(sb)
    }

    /// Whether an instance of this type is currently alive
    pub fn is_active(&self) -> bool {
        self.active.lock().strong_count() > 0
    }
}

impl std::fmt::Debug for FileSystemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemType")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Table of filesystem types available for mounting
#[derive(Debug, Default)]
pub struct Registry {
    types: Mutex<BTreeMap<&'static str, Arc<FileSystemType>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the counter filesystem already registered
    pub fn with_pikaqfs() -> Self {
        let registry = Self::new();
        registry
            .types
            .lock()
            .insert(FS_NAME, Arc::new(FileSystemType::pikaqfs()));
        registry
    }

    pub fn register(&self, fs_type: FileSystemType) -> Result<Arc<FileSystemType>, MountError> {
        let mut types = self.types.lock();
        if types.contains_key(fs_type.name()) {
            tracing::warn!("register {} failed: already registered", fs_type.name());
            return Err(MountError::AlreadyRegistered(fs_type.name().to_string()));
        }

        let fs_type = Arc::new(fs_type);
        types.insert(fs_type.name(), fs_type.clone());
        tracing::info!("registered filesystem type {}", fs_type.name());
        Ok(fs_type)
    }

    /// Remove a type; fails while one of its instances is alive
    pub fn unregister(&self, name: &str) -> Result<Arc<FileSystemType>, MountError> {
        let mut types = self.types.lock();
        let busy = match types.get(name) {
            Some(fs_type) => fs_type.is_active(),
            None => return Err(MountError::UnknownFilesystem(name.to_string())),
        };
        if busy {
            return Err(MountError::Busy(name.to_string()));
        }

        tracing::info!("unregistered filesystem type {}", name);
        types
            .remove(name)
            .ok_or_else(|| MountError::UnknownFilesystem(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<Arc<FileSystemType>> {
        self.types.lock().get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.types.lock().keys().copied().collect()
    }
}

/// Mounts and unmounts filesystem instances
#[derive(Debug)]
pub struct MountController {
    registry: Registry,
}

impl Default for MountController {
    fn default() -> Self {
        Self::new()
    }
}

impl MountController {
    /// Controller over a registry holding the counter filesystem
    pub fn new() -> Self {
        Self::with_registry(Registry::with_pikaqfs())
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mount an instance of `fs_name`.
    ///
    /// `device` is informational only; `data` is the mount option string.
    pub fn mount(
        &self,
        fs_name: &str,
        device: &str,
        data: &str,
    ) -> Result<Arc<Superblock>, MountError> {
        tracing::info!("mount {} from {}", fs_name, device);

        let fs_type = self
            .registry
            .get(fs_name)
            .ok_or_else(|| MountError::UnknownFilesystem(fs_name.to_string()))?;
        let options = MountOptions::parse(data);

        fs_type.mount_single(&options)
    }

    /// Release one holder of an instance.
    ///
    /// The tree and counters are dropped once no holder remains.
    pub fn unmount(&self, sb: Arc<Superblock>) {
        let instance = sb.instance();
        let last = Arc::strong_count(&sb) == 1;
        drop(sb);

        if last {
            tracing::info!("unmounted instance {}, released", instance);
        } else {
            tracing::info!("unmounted instance {}, still referenced", instance);
        }
    }
}
