use crate::counter_file::{CounterFileError, CounterHandle};
use crate::counter_store::CounterStore;
use crate::node::{Node, NodeFactory, NodeId, TreeError, DIR_MODE, LEGACY_DIR_MODE};
use crate::tree::TreeBuilder;

use super::MountOptions;

/// Magic number reported for mounted instances
pub const PIKAQFS_MAGIC: u32 = 0x1990_0616;
/// Block size reported by statfs
pub const BLOCK_SIZE: u32 = 4096;
/// Longest entry name accepted by the directory layer
pub const NAME_MAX: u32 = 255;

/// Filesystem statistics of one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFs {
    pub magic: u32,
    pub block_size: u32,
    pub blocks: u64,
    pub files: u64,
    pub name_max: u32,
}

/// A mounted instance: the node tree plus the counters it is bound to
#[derive(Debug)]
pub struct Superblock {
    pub(crate) instance: u64,
    options: MountOptions,
    root: Node,
    counters: CounterStore,
    node_count: u64,
}

/// Allocate the root directory and populate it with the counter tree
pub fn fill_root(options: &MountOptions) -> Result<Superblock, TreeError> {
    tracing::info!("pikaqfs fill_super called");

    let factory = NodeFactory::new().max_nodes(options.max_nodes);

    let mut counters = CounterStore::new();
    let mut root = factory.make_dir(DIR_MODE)?;

    let dir_mode = if options.legacy_dir_mode {
        tracing::warn!("legacy_dir_mode set: sub-directories use mode {:o}", LEGACY_DIR_MODE);
        LEGACY_DIR_MODE
    } else {
        DIR_MODE
    };
    TreeBuilder::new(&factory, &mut counters)
        .dir_mode(dir_mode)
        .populate(&mut root)?;

    Ok(Superblock {
        instance: 0,
        options: options.clone(),
        root,
        counters,
        node_count: factory.allocated(),
    })
}

impl Superblock {
    /* Getters */

    /// Sequence number of the instance within its filesystem type
    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn magic(&self) -> u32 {
        PIKAQFS_MAGIC
    }

    pub fn block_size(&self) -> u32 {
        BLOCK_SIZE
    }

    pub fn options(&self) -> &MountOptions {
        &self.options
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn counters(&self) -> &CounterStore {
        &self.counters
    }

    /* Lookup */

    /// Find the node at an absolute or relative `path`
    pub fn resolve(&self, path: &str) -> Option<&Node> {
        path.split('/')
            .filter(|component| !component.is_empty())
            .try_fold(&self.root, |node, component| node.as_dir()?.get(component))
    }

    /// Find a node by id
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        let mut pending = vec![&self.root];
        while let Some(node) = pending.pop() {
            if node.id() == id {
                return Some(node);
            }
            if let Some(dir) = node.as_dir() {
                pending.extend(dir.iter().map(|(_, child)| child));
            }
        }
        None
    }

    /// Every node with its absolute path, parents before children
    pub fn walk(&self) -> Vec<(String, &Node)> {
        let mut out = Vec::new();
        let mut pending = vec![("/".to_string(), &self.root)];

        while let Some((path, node)) = pending.pop() {
            if let Some(dir) = node.as_dir() {
                // Reversed so children come out in insertion order
                for (name, child) in dir.iter().collect::<Vec<_>>().into_iter().rev() {
                    pending.push((join_path(&path, name), child));
                }
            }
            out.push((path, node));
        }

        out
    }

    /// Open the counter file at `path`
    pub fn open(&self, path: &str) -> Result<CounterHandle, OpenError> {
        let node = self
            .resolve(path)
            .ok_or_else(|| OpenError::NotFound(path.to_string()))?;
        Ok(self.open_node(node)?)
    }

    pub fn open_node(&self, node: &Node) -> Result<CounterHandle, CounterFileError> {
        CounterHandle::open(node, &self.counters)
    }

    pub fn statfs(&self) -> StatFs {
        StatFs {
            magic: PIKAQFS_MAGIC,
            block_size: BLOCK_SIZE,
            blocks: 0,
            files: self.node_count,
            name_max: NAME_MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpenError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error(transparent)]
    CounterFile(#[from] CounterFileError),
}

/// Join a directory path and an entry name
pub fn join_path(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}
