//! Bidirectional inode ↔ path mapping for the counter filesystem
//!
//! FUSE identifies files by 64-bit inode numbers. Every node of a mounted
//! instance already carries a stable id (the root is 1, like the FUSE root),
//! so the table is seeded once from the instance's tree and never changes.

use std::collections::HashMap;

use common::mount::Superblock;
use common::ROOT_ID;

/// Bidirectional mapping between inodes and paths
#[derive(Debug)]
pub struct InodeTable {
    /// Path to inode mapping
    path_to_inode: HashMap<String, u64>,
    /// Inode to path mapping
    inode_to_path: HashMap<u64, String>,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// Root inode number (always 1 in FUSE)
    pub const ROOT_INODE: u64 = ROOT_ID;

    /// Create a new inode table with only the root registered
    pub fn new() -> Self {
        let mut table = Self {
            path_to_inode: HashMap::new(),
            inode_to_path: HashMap::new(),
        };
        table.insert("/", Self::ROOT_INODE);
        table
    }

    /// Register every node of a mounted instance under its node id
    pub fn from_superblock(sb: &Superblock) -> Self {
        let mut table = Self::new();
        for (path, node) in sb.walk() {
            table.insert(&path, node.id());
        }
        table
    }

    /// Map `path` to `inode`, replacing any previous mapping of either side
    pub fn insert(&mut self, path: &str, inode: u64) {
        let normalized = Self::normalize_path(path);

        if let Some(old_path) = self.inode_to_path.insert(inode, normalized.clone()) {
            self.path_to_inode.remove(&old_path);
        }
        if let Some(old_inode) = self.path_to_inode.insert(normalized, inode) {
            if old_inode != inode {
                self.inode_to_path.remove(&old_inode);
            }
        }
    }

    /// Get the inode for a path if it exists
    pub fn get_inode(&self, path: &str) -> Option<u64> {
        let normalized = Self::normalize_path(path);
        self.path_to_inode.get(&normalized).copied()
    }

    /// Get the path for an inode if it exists
    pub fn get_path(&self, inode: u64) -> Option<&str> {
        self.inode_to_path.get(&inode).map(String::as_str)
    }

    /// Inode of the directory containing `inode` (the root is its own parent)
    pub fn parent_inode(&self, inode: u64) -> Option<u64> {
        let path = self.get_path(inode)?;
        self.get_inode(&Self::parent_path(path))
    }

    pub fn len(&self) -> usize {
        self.inode_to_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inode_to_path.is_empty()
    }

    /// Normalize a path to a consistent format
    fn normalize_path(path: &str) -> String {
        let path = path.trim();

        // Handle empty or root
        if path.is_empty() || path == "/" {
            return "/".to_string();
        }

        // Ensure leading slash, no trailing slash
        let mut normalized = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        if normalized.len() > 1 && normalized.ends_with('/') {
            normalized.pop();
        }

        normalized
    }

    /// Get the parent path of a given path
    pub fn parent_path(path: &str) -> String {
        let normalized = Self::normalize_path(path);
        if normalized == "/" {
            return "/".to_string();
        }

        match normalized.rfind('/') {
            Some(0) => "/".to_string(),
            Some(pos) => normalized[..pos].to_string(),
            None => "/".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::mount::{fill_root, MountOptions};

    #[test]
    fn test_root_inode() {
        let table = InodeTable::new();
        assert_eq!(table.get_inode("/"), Some(InodeTable::ROOT_INODE));
        assert_eq!(table.get_path(InodeTable::ROOT_INODE), Some("/"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_from_superblock() {
        let sb = fill_root(&MountOptions::default()).unwrap();
        let table = InodeTable::from_superblock(&sb);

        assert_eq!(table.len(), 4);
        for (path, node) in sb.walk() {
            assert_eq!(table.get_inode(&path), Some(node.id()));
            assert_eq!(table.get_path(node.id()), Some(path.as_str()));
        }
        assert_eq!(table.get_inode("mysubdir/"), sb.resolve("/mysubdir").map(|n| n.id()));
    }

    #[test]
    fn test_parent_inode() {
        let sb = fill_root(&MountOptions::default()).unwrap();
        let table = InodeTable::from_superblock(&sb);

        let subdir = table.get_inode("/mysubdir").unwrap();
        let subcounter = table.get_inode("/mysubdir/mysubcounter").unwrap();

        assert_eq!(table.parent_inode(subcounter), Some(subdir));
        assert_eq!(table.parent_inode(subdir), Some(InodeTable::ROOT_INODE));
        assert_eq!(
            table.parent_inode(InodeTable::ROOT_INODE),
            Some(InodeTable::ROOT_INODE)
        );
        assert_eq!(table.parent_inode(999), None);
    }

    #[test]
    fn test_insert_replaces() {
        let mut table = InodeTable::new();
        table.insert("/a", 5);
        table.insert("/b", 5);

        assert!(table.get_inode("/a").is_none());
        assert_eq!(table.get_inode("/b"), Some(5));
        assert_eq!(table.get_path(5), Some("/b"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(InodeTable::normalize_path(""), "/");
        assert_eq!(InodeTable::normalize_path("/"), "/");
        assert_eq!(InodeTable::normalize_path("foo"), "/foo");
        assert_eq!(InodeTable::normalize_path("/foo"), "/foo");
        assert_eq!(InodeTable::normalize_path("/foo/"), "/foo");
        assert_eq!(InodeTable::normalize_path("/foo/bar"), "/foo/bar");
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(InodeTable::parent_path("/"), "/");
        assert_eq!(InodeTable::parent_path("/mycounter"), "/");
        assert_eq!(InodeTable::parent_path("/mysubdir/mysubcounter"), "/mysubdir");
    }
}
