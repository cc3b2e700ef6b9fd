//! Construction of the fixed counter tree
//!
//! ```text
//! /
//! ├── mycounter
//! └── mysubdir/
//!     └── mysubcounter
//! ```

use crate::counter_store::CounterStore;
use crate::node::{Node, NodeFactory, TreeError, DIR_MODE};

/// Primary counter file in the root directory
pub const COUNTER_FILE: &str = "mycounter";
/// Sub-directory in the root directory
pub const SUB_DIR: &str = "mysubdir";
/// Secondary counter file inside [`SUB_DIR`]
pub const SUB_COUNTER_FILE: &str = "mysubcounter";

/// Builds nodes and binds fresh counters to them
pub struct TreeBuilder<'a> {
    factory: &'a NodeFactory,
    counters: &'a mut CounterStore,
    dir_mode: u32,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(factory: &'a NodeFactory, counters: &'a mut CounterStore) -> Self {
        Self {
            factory,
            counters,
            dir_mode: DIR_MODE,
        }
    }

    /// Mode used for directories created below the root
    pub fn dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// Create a counter file named `name` in `parent`, starting at `initial`
    pub fn create_file<'n>(
        &mut self,
        parent: &'n mut Node,
        name: &str,
        initial: i64,
    ) -> Result<&'n mut Node, TreeError> {
        let dir = parent
            .as_dir_mut()
            .ok_or_else(|| TreeError::NotADirectory(name.to_string()))?;
        let counter = self.counters.create(initial);
        let node = self.factory.make_file(counter)?;
        tracing::debug!("created counter file '{}' bound to {}", name, counter);
        dir.insert(name, node)
    }

    /// Create an empty directory named `name` in `parent`
    pub fn create_dir<'n>(
        &mut self,
        parent: &'n mut Node,
        name: &str,
    ) -> Result<&'n mut Node, TreeError> {
        let dir = parent
            .as_dir_mut()
            .ok_or_else(|| TreeError::NotADirectory(name.to_string()))?;
        let node = self.factory.make_dir(self.dir_mode)?;
        tracing::debug!("created directory '{}' with mode {:o}", name, node.mode());
        dir.insert(name, node)
    }

    /// Populate `root` with the fixed counter tree
    pub fn populate(&mut self, root: &mut Node) -> Result<(), TreeError> {
        self.create_file(root, COUNTER_FILE, 0)?;

        let subdir = self.create_dir(root, SUB_DIR)?;
        self.create_file(subdir, SUB_COUNTER_FILE, 0)?;

        Ok(())
    }
}
