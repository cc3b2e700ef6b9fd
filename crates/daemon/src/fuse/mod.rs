//! FUSE surface of the pikaqfs counter filesystem
//!
//! This module exposes a mounted counter instance to the kernel so that
//! ordinary tools (`cat`, `echo >`, `ls -l`) drive the counter protocol.
//!
//! # Architecture
//!
//! - `MountManager`: Manages live mounts and their lifecycle
//! - `CounterFs`: FUSE filesystem implementation using fuser
//! - `InodeTable`: Bidirectional inode ↔ path mapping
//! - `ToErrno`: Maps core errors onto errno replies

mod counter_fs;
mod errno;
mod inode_table;
mod mount_manager;

pub use counter_fs::{CounterFs, DirEntry};
pub use errno::ToErrno;
pub use inode_table::InodeTable;
pub use mount_manager::{LiveMount, MountError, MountInfo, MountManager, MountManagerConfig};
