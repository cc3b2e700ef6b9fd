//! Filesystem nodes and the factory that allocates them
//!
//! A [`Node`] is either a counter file or a directory. The kind is a closed
//! variant: files carry the id of the counter they are bound to, directories
//! carry their named children in insertion order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::counter_store::CounterId;

/// File type bits
pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;

/// Counter files: rw-r--r--
pub const FILE_MODE: u32 = S_IFREG | 0o644;
/// Directories: rwxr-xr-x
pub const DIR_MODE: u32 = S_IFDIR | 0o755;
/// Historic sub-directory mode: owner rw but no search bit.
/// Only used when the `legacy_dir_mode` mount option is set.
pub const LEGACY_DIR_MODE: u32 = S_IFDIR | 0o644;

pub type NodeId = u64;

/// The root directory always gets the first id
pub const ROOT_ID: NodeId = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("node allocation failed: {allocated} of {limit} nodes in use")]
pub struct AllocationError {
    pub allocated: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error("an entry named '{0}' already exists")]
    DuplicateName(String),
    #[error("invalid entry name '{0}'")]
    InvalidName(String),
    #[error("cannot create '{0}': parent is not a directory")]
    NotADirectory(String),
}

/// Ownership, mode and timestamps shared by every node kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMetadata {
    pub id: NodeId,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// Always 0, nothing is backed by storage
    pub blocks: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub crtime: SystemTime,
}

#[derive(Debug)]
pub enum NodeKind {
    File(CounterId),
    Directory(Directory),
}

impl NodeKind {
    fn type_bits(&self) -> u32 {
        match self {
            NodeKind::File(_) => S_IFREG,
            NodeKind::Directory(_) => S_IFDIR,
        }
    }
}

#[derive(Debug)]
pub struct Node {
    meta: NodeMetadata,
    kind: NodeKind,
}

impl Node {
    /* Getters */

    pub fn id(&self) -> NodeId {
        self.meta.id
    }

    pub fn metadata(&self) -> &NodeMetadata {
        &self.meta
    }

    pub fn mode(&self) -> u32 {
        self.meta.mode
    }

    /// Permission bits without the file type
    pub fn perm(&self) -> u16 {
        (self.meta.mode & 0o7777) as u16
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    /// Counter bound to this node, if it is a file
    pub fn counter(&self) -> Option<CounterId> {
        match self.kind {
            NodeKind::File(id) => Some(id),
            NodeKind::Directory(_) => None,
        }
    }

    pub fn as_dir(&self) -> Option<&Directory> {
        match &self.kind {
            NodeKind::Directory(dir) => Some(dir),
            NodeKind::File(_) => None,
        }
    }

    pub fn as_dir_mut(&mut self) -> Option<&mut Directory> {
        match &mut self.kind {
            NodeKind::Directory(dir) => Some(dir),
            NodeKind::File(_) => None,
        }
    }

    /// Owner can both read and write the node
    pub fn is_owner_read_write(&self) -> bool {
        self.meta.mode & 0o600 == 0o600
    }
}

/// Children of a directory node, kept in insertion order
#[derive(Debug, Default)]
pub struct Directory {
    entries: Vec<(String, Node)>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `node` under `name`, returning a reference to the stored child
    pub fn insert(&mut self, name: &str, node: Node) -> Result<&mut Node, TreeError> {
        validate_name(name)?;
        if self.get(name).is_some() {
            return Err(TreeError::DuplicateName(name.to_string()));
        }

        let idx = self.entries.len();
        self.entries.push((name.to_string(), node));
        Ok(&mut self.entries[idx].1)
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, node)| node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_name(name: &str) -> Result<(), TreeError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(TreeError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Allocates nodes with fixed ownership for one mounted instance
#[derive(Debug)]
pub struct NodeFactory {
    uid: u32,
    gid: u32,
    /// Next id to hand out (starts at 1, the root)
    next_id: AtomicU64,
    /// Maximum number of nodes this factory may allocate
    max_nodes: Option<u64>,
}

impl Default for NodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeFactory {
    /// Factory owning nodes as the current process user and group
    pub fn new() -> Self {
        // SAFETY: getuid/getgid cannot fail and touch no memory
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self::with_owner(uid, gid)
    }

    pub fn with_owner(uid: u32, gid: u32) -> Self {
        Self {
            uid,
            gid,
            next_id: AtomicU64::new(ROOT_ID),
            max_nodes: None,
        }
    }

    pub fn max_nodes(mut self, limit: Option<u64>) -> Self {
        self.max_nodes = limit;
        self
    }

    /// Allocate a node of `kind`; the type bits of `mode` follow the kind
    pub fn make_node(&self, mode: u32, kind: NodeKind) -> Result<Node, AllocationError> {
        let id = self.reserve_id()?;
        let now = SystemTime::now();

        Ok(Node {
            meta: NodeMetadata {
                id,
                mode: (mode & !S_IFMT) | kind.type_bits(),
                uid: self.uid,
                gid: self.gid,
                blocks: 0,
                atime: now,
                mtime: now,
                ctime: now,
                crtime: now,
            },
            kind,
        })
    }

    pub fn make_file(&self, counter: CounterId) -> Result<Node, AllocationError> {
        self.make_node(FILE_MODE, NodeKind::File(counter))
    }

    pub fn make_dir(&self, mode: u32) -> Result<Node, AllocationError> {
        self.make_node(mode, NodeKind::Directory(Directory::new()))
    }

    /* Getters */

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn gid(&self) -> u32 {
        self.gid
    }

    /// Number of nodes handed out so far
    pub fn allocated(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst) - ROOT_ID
    }

    fn reserve_id(&self) -> Result<NodeId, AllocationError> {
        let limit = self.max_nodes;
        self.next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| match limit {
                Some(limit) if next - ROOT_ID >= limit => None,
                _ => Some(next + 1),
            })
            .map_err(|next| AllocationError {
                allocated: next - ROOT_ID,
                limit: limit.unwrap_or(u64::MAX),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter_store::CounterStore;

    fn counter() -> CounterId {
        CounterStore::new().create(0)
    }

    #[test]
    fn test_make_file() {
        let factory = NodeFactory::with_owner(1000, 100);
        let node = factory.make_file(counter()).unwrap();

        assert_eq!(node.id(), ROOT_ID);
        assert_eq!(node.mode(), FILE_MODE);
        assert_eq!(node.perm(), 0o644);
        assert_eq!(node.metadata().uid, 1000);
        assert_eq!(node.metadata().gid, 100);
        assert_eq!(node.metadata().blocks, 0);
        assert!(!node.is_dir());
        assert!(node.is_owner_read_write());
        assert!(node.counter().is_some());
    }

    #[test]
    fn test_timestamps_match() {
        let factory = NodeFactory::with_owner(0, 0);
        let node = factory.make_dir(DIR_MODE).unwrap();
        let meta = node.metadata();

        assert_eq!(meta.atime, meta.mtime);
        assert_eq!(meta.mtime, meta.ctime);
    }

    #[test]
    fn test_type_bits_follow_kind() {
        let factory = NodeFactory::with_owner(0, 0);
        let dir = factory.make_node(S_IFREG | 0o755, NodeKind::Directory(Directory::new()));
        assert_eq!(dir.unwrap().mode(), S_IFDIR | 0o755);

        let legacy = factory.make_dir(LEGACY_DIR_MODE).unwrap();
        assert_eq!(legacy.perm(), 0o644);
        assert!(legacy.is_dir());
    }

    #[test]
    fn test_ids_increase() {
        let factory = NodeFactory::with_owner(0, 0);
        let a = factory.make_dir(DIR_MODE).unwrap();
        let b = factory.make_dir(DIR_MODE).unwrap();

        assert_eq!(a.id(), ROOT_ID);
        assert_eq!(b.id(), ROOT_ID + 1);
        assert_eq!(factory.allocated(), 2);
    }

    #[test]
    fn test_allocation_limit() {
        let factory = NodeFactory::with_owner(0, 0).max_nodes(Some(2));
        factory.make_dir(DIR_MODE).unwrap();
        factory.make_dir(DIR_MODE).unwrap();

        let err = factory.make_dir(DIR_MODE).unwrap_err();
        assert_eq!(
            err,
            AllocationError {
                allocated: 2,
                limit: 2
            }
        );
        assert_eq!(factory.allocated(), 2);
    }

    #[test]
    fn test_directory_insert_order() {
        let factory = NodeFactory::with_owner(0, 0);
        let mut dir = Directory::new();
        dir.insert("b", factory.make_file(counter()).unwrap()).unwrap();
        dir.insert("a", factory.make_dir(DIR_MODE).unwrap()).unwrap();

        assert_eq!(dir.names(), vec!["b", "a"]);
        assert_eq!(dir.len(), 2);
        assert!(dir.get("a").unwrap().is_dir());
    }

    #[test]
    fn test_directory_duplicate_name() {
        let factory = NodeFactory::with_owner(0, 0);
        let mut dir = Directory::new();
        dir.insert("x", factory.make_file(counter()).unwrap()).unwrap();

        let err = dir
            .insert("x", factory.make_file(counter()).unwrap())
            .unwrap_err();
        assert_eq!(err, TreeError::DuplicateName("x".to_string()));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_directory_invalid_names() {
        let factory = NodeFactory::with_owner(0, 0);
        let mut dir = Directory::new();

        for name in ["", ".", "..", "a/b", "nul\0"] {
            let node = factory.make_file(counter()).unwrap();
            assert!(matches!(
                dir.insert(name, node),
                Err(TreeError::InvalidName(_))
            ));
        }
        assert!(dir.is_empty());
    }
}
