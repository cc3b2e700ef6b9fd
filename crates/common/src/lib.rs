//! Core of the pikaqfs counter filesystem
//!
//! A mounted instance exposes a fixed tree of counter files. Reading a counter
//! file returns its value and advances it; writing decimal text replaces it.
//! This crate holds everything except the kernel-facing surface: the
//! counters, the node tree, the per-open read/write protocol and the mount
//! lifecycle.

pub mod counter_file;
pub mod counter_store;
pub mod mount;
pub mod node;
pub mod tree;

pub use counter_file::{CounterFileError, CounterHandle, TransferError, STAGING_CAPACITY};
pub use counter_store::{CounterEntry, CounterId, CounterStore};
pub use mount::{MountController, MountError, MountOptions, Registry, Superblock, FS_NAME};
pub use node::{AllocationError, Node, NodeFactory, NodeId, NodeKind, TreeError, ROOT_ID};
pub use tree::TreeBuilder;
