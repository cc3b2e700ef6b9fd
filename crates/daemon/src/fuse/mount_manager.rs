//! Live FUSE mounts of the counter filesystem
//!
//! Every mount goes through the core [`MountController`], so all mount points
//! served by one manager share the single live instance and its counters.
//! Dropping the last mount releases the instance; the next mount starts
//! fresh at zero.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fuser::{BackgroundSession, MountOption};
use parking_lot::Mutex;
use uuid::Uuid;

use common::mount::{MountController, Superblock, FS_NAME};

use super::counter_fs::CounterFs;

/// Options applied to every FUSE session
#[derive(Debug, Clone)]
pub struct MountManagerConfig {
    /// Let users other than the mounter access the tree
    pub allow_other: bool,
    /// Ask the FUSE helper to unmount when the process exits
    pub auto_unmount: bool,
}

impl Default for MountManagerConfig {
    fn default() -> Self {
        Self {
            allow_other: false,
            auto_unmount: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("mount point does not exist or is not a directory: {0}")]
    MountPointMissing(PathBuf),
    #[error("mount point already in use: {0}")]
    AlreadyMounted(PathBuf),
    #[error("mount not found: {0}")]
    NotFound(Uuid),
    #[error("filesystem error: {0}")]
    Filesystem(#[from] common::mount::MountError),
    #[error("FUSE error: {0}")]
    Fuse(#[from] std::io::Error),
}

/// A mounted FUSE session
pub struct LiveMount {
    pub mount_id: Uuid,
    pub mount_point: PathBuf,
    pub mounted_at: DateTime<Utc>,
    superblock: Arc<Superblock>,
    session: BackgroundSession,
}

impl LiveMount {
    pub fn superblock(&self) -> &Arc<Superblock> {
        &self.superblock
    }

    pub fn info(&self) -> MountInfo {
        MountInfo {
            mount_id: self.mount_id,
            mount_point: self.mount_point.clone(),
            mounted_at: self.mounted_at,
            instance: self.superblock.instance(),
        }
    }
}

/// Summary of a live mount
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MountInfo {
    pub mount_id: Uuid,
    pub mount_point: PathBuf,
    pub mounted_at: DateTime<Utc>,
    pub instance: u64,
}

/// Manages the live FUSE sessions of one process
pub struct MountManager {
    controller: MountController,
    config: MountManagerConfig,
    mounts: Mutex<HashMap<Uuid, LiveMount>>,
}

impl MountManager {
    pub fn new(config: MountManagerConfig) -> Self {
        Self::with_controller(MountController::new(), config)
    }

    pub fn with_controller(controller: MountController, config: MountManagerConfig) -> Self {
        Self {
            controller,
            config,
            mounts: Mutex::new(HashMap::new()),
        }
    }

    pub fn controller(&self) -> &MountController {
        &self.controller
    }

    fn session_options(&self) -> Vec<MountOption> {
        let mut options = vec![
            MountOption::FSName(FS_NAME.to_string()),
            MountOption::Subtype(FS_NAME.to_string()),
            MountOption::RW,
            MountOption::DefaultPermissions,
        ];
        if self.config.allow_other {
            options.push(MountOption::AllowOther);
        }
        if self.config.auto_unmount {
            options.push(MountOption::AutoUnmount);
        }
        options
    }

    /// Mount the counter filesystem at `mount_point` with option string `data`
    pub fn mount(&self, mount_point: &Path, data: &str) -> Result<Uuid, MountError> {
        if !mount_point.is_dir() {
            return Err(MountError::MountPointMissing(mount_point.to_path_buf()));
        }
        if self
            .mounts
            .lock()
            .values()
            .any(|m| m.mount_point == mount_point)
        {
            return Err(MountError::AlreadyMounted(mount_point.to_path_buf()));
        }

        let superblock = self.controller.mount(FS_NAME, "none", data)?;
        let fs = CounterFs::new(superblock.clone());

        let session = match fuser::spawn_mount2(fs, mount_point, &self.session_options()) {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("failed to mount {}: {}", mount_point.display(), e);
                self.controller.unmount(superblock);
                return Err(MountError::Fuse(e));
            }
        };

        let mount_id = Uuid::new_v4();
        tracing::info!(
            "mounted pikaqfs instance {} at {} ({})",
            superblock.instance(),
            mount_point.display(),
            mount_id
        );

        self.mounts.lock().insert(
            mount_id,
            LiveMount {
                mount_id,
                mount_point: mount_point.to_path_buf(),
                mounted_at: Utc::now(),
                superblock,
                session,
            },
        );
        Ok(mount_id)
    }

    /// Tear down one mount, blocking until its session loop exits
    pub fn unmount(&self, mount_id: &Uuid) -> Result<(), MountError> {
        let live = self
            .mounts
            .lock()
            .remove(mount_id)
            .ok_or(MountError::NotFound(*mount_id))?;

        self.release(live);
        Ok(())
    }

    pub fn unmount_all(&self) {
        let mounts: Vec<LiveMount> = self.mounts.lock().drain().map(|(_, m)| m).collect();
        for live in mounts {
            self.release(live);
        }
    }

    fn release(&self, live: LiveMount) {
        let LiveMount {
            mount_id,
            mount_point,
            superblock,
            session,
            ..
        } = live;

        session.join();
        tracing::info!("unmounted {} ({})", mount_point.display(), mount_id);
        self.controller.unmount(superblock);
    }

    pub fn list(&self) -> Vec<MountInfo> {
        let mut mounts: Vec<MountInfo> = self.mounts.lock().values().map(LiveMount::info).collect();
        mounts.sort_by_key(|m| m.mounted_at);
        mounts
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.lock().is_empty()
    }
}

impl Drop for MountManager {
    fn drop(&mut self) {
        self.unmount_all();
    }
}
