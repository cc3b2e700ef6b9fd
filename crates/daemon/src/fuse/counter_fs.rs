//! FUSE filesystem over one mounted counter instance
//!
//! The kernel-facing callbacks are thin: each resolves the inode, calls one
//! of the helper methods below and turns the result into a reply. The helpers
//! carry the logic and are what the tests exercise.
//!
//! Counter files report a size of 0, so every open handle is direct-io:
//! reads bypass the page cache and always reach the counter protocol.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use fuser::consts::FOPEN_DIRECT_IO;
use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
    TimeOrNow,
};
use libc::c_int;

use common::counter_file::{CounterHandle, STAGING_CAPACITY};
use common::mount::Superblock;
use common::node::Node;

use super::errno::ToErrno;
use super::inode_table::InodeTable;

/// How long the kernel may cache attributes and entries
const ATTR_TTL: Duration = Duration::from_secs(1);

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: u64,
    pub kind: FileType,
    pub name: String,
}

/// FUSE filesystem serving one counter instance
pub struct CounterFs {
    sb: Arc<Superblock>,
    inodes: InodeTable,
    /// Open counter files by file handle
    handles: HashMap<u64, CounterHandle>,
    next_fh: u64,
}

impl CounterFs {
    pub fn new(sb: Arc<Superblock>) -> Self {
        let inodes = InodeTable::from_superblock(&sb);
        Self {
            sb,
            inodes,
            handles: HashMap::new(),
            next_fh: 1,
        }
    }

    pub fn superblock(&self) -> &Arc<Superblock> {
        &self.sb
    }

    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    fn node(&self, ino: u64) -> Result<&Node, c_int> {
        self.sb.node(ino).ok_or(libc::ENOENT)
    }

    /// Attributes reported for `node`
    pub fn attr_for(&self, node: &Node) -> FileAttr {
        let meta = node.metadata();
        let (kind, nlink) = match node.as_dir() {
            Some(dir) => {
                let subdirs = dir.iter().filter(|(_, child)| child.is_dir()).count();
                (FileType::Directory, 2 + subdirs as u32)
            }
            None => (FileType::RegularFile, 1),
        };

        FileAttr {
            ino: meta.id,
            size: 0,
            blocks: meta.blocks,
            atime: meta.atime,
            mtime: meta.mtime,
            ctime: meta.ctime,
            crtime: meta.crtime,
            kind,
            perm: node.perm(),
            nlink,
            uid: meta.uid,
            gid: meta.gid,
            rdev: 0,
            blksize: self.sb.block_size(),
            flags: 0,
        }
    }

    pub fn attr(&self, ino: u64) -> Result<FileAttr, c_int> {
        self.node(ino).map(|node| self.attr_for(node))
    }

    /// Look `name` up in the directory `parent`
    pub fn lookup_child(&self, parent: u64, name: &str) -> Result<FileAttr, c_int> {
        let dir = self.node(parent)?.as_dir().ok_or(libc::ENOTDIR)?;
        let child = dir.get(name).ok_or(libc::ENOENT)?;
        Ok(self.attr_for(child))
    }

    /// Entries of directory `ino`, starting with `.` and `..`
    pub fn list_dir(&self, ino: u64) -> Result<Vec<DirEntry>, c_int> {
        let dir = self.node(ino)?.as_dir().ok_or(libc::ENOTDIR)?;
        let parent = self
            .inodes
            .parent_inode(ino)
            .unwrap_or(InodeTable::ROOT_INODE);

        let mut entries = vec![
            DirEntry {
                inode: ino,
                kind: FileType::Directory,
                name: ".".to_string(),
            },
            DirEntry {
                inode: parent,
                kind: FileType::Directory,
                name: "..".to_string(),
            },
        ];
        entries.extend(dir.iter().map(|(name, child)| DirEntry {
            inode: child.id(),
            kind: if child.is_dir() {
                FileType::Directory
            } else {
                FileType::RegularFile
            },
            name: name.to_string(),
        }));

        Ok(entries)
    }

    /// Open the counter file `ino`, returning a new file handle
    pub fn open_file(&mut self, ino: u64) -> Result<u64, c_int> {
        let node = self.node(ino)?;
        let handle = self.sb.open_node(node).map_err(|e| e.to_errno())?;

        let fh = self.next_fh;
        self.next_fh += 1;
        self.handles.insert(fh, handle);
        Ok(fh)
    }

    /// Read up to `size` bytes at `offset` through handle `fh`
    pub fn read_handle(&mut self, fh: u64, offset: i64, size: u32) -> Result<Vec<u8>, c_int> {
        let handle = self.handles.get_mut(&fh).ok_or(libc::EBADF)?;
        let offset = u64::try_from(offset).map_err(|_| libc::EINVAL)?;

        let mut data = Vec::with_capacity(STAGING_CAPACITY.min(size as usize));
        handle.seek(offset);
        handle
            .read(&mut data, size as usize)
            .map_err(|e| e.to_errno())?;
        Ok(data)
    }

    /// Write `data` at `offset` through handle `fh`
    pub fn write_handle(&mut self, fh: u64, offset: i64, data: &[u8]) -> Result<u32, c_int> {
        let handle = self.handles.get_mut(&fh).ok_or(libc::EBADF)?;
        let offset = u64::try_from(offset).map_err(|_| libc::EINVAL)?;

        handle.seek(offset);
        let written = handle.write(data).map_err(|e| e.to_errno())?;
        Ok(written as u32)
    }

    pub fn release_handle(&mut self, fh: u64) -> Result<(), c_int> {
        self.handles.remove(&fh).map(|_| ()).ok_or(libc::EBADF)
    }
}

impl Filesystem for CounterFs {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        tracing::info!("pikaqfs instance {} attached", self.sb.instance());
        Ok(())
    }

    fn destroy(&mut self) {
        tracing::info!(
            "pikaqfs instance {} detached, dropping {} open handles",
            self.sb.instance(),
            self.handles.len()
        );
        self.handles.clear();
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(libc::ENOENT);
            return;
        };
        tracing::trace!(parent, name, "lookup");

        match self.lookup_child(parent, name) {
            Ok(attr) => reply.entry(&ATTR_TTL, &attr, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        tracing::trace!(ino, "getattr");
        match self.attr(ino) {
            Ok(attr) => reply.attr(&ATTR_TTL, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    /// Truncation is accepted and ignored so shell redirection works;
    /// ownership and mode are fixed.
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        tracing::trace!(ino, ?size, "setattr");
        if mode.is_some() || uid.is_some() || gid.is_some() {
            tracing::warn!(ino, "setattr: mode and ownership are fixed");
            reply.error(libc::EPERM);
            return;
        }

        match self.attr(ino) {
            Ok(attr) => reply.attr(&ATTR_TTL, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        tracing::trace!(ino, flags, "open");
        match self.open_file(ino) {
            Ok(fh) => reply.opened(fh, FOPEN_DIRECT_IO),
            Err(errno) => reply.error(errno),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        tracing::trace!(ino, fh, offset, size, "read");
        match self.read_handle(fh, offset, size) {
            Ok(data) => reply.data(&data),
            Err(errno) => reply.error(errno),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        tracing::trace!(ino, fh, offset, size = data.len(), "write");
        match self.write_handle(fh, offset, data) {
            Ok(written) => reply.written(written),
            Err(errno) => {
                tracing::warn!(ino, offset, size = data.len(), errno, "write rejected");
                reply.error(errno)
            }
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        tracing::trace!(ino, fh, "release");
        match self.release_handle(fh) {
            Ok(()) => reply.ok(),
            Err(errno) => reply.error(errno),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.node(ino) {
            Ok(node) if node.is_dir() => reply.opened(0, 0),
            Ok(_) => reply.error(libc::ENOTDIR),
            Err(errno) => reply.error(errno),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        tracing::trace!(ino, offset, "readdir");
        let entries = match self.list_dir(ino) {
            Ok(entries) => entries,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (idx, entry) in entries.iter().enumerate().skip(skip) {
            // The offset handed back is the index of the next entry
            if reply.add(entry.inode, (idx + 1) as i64, entry.kind, &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let stats = self.sb.statfs();
        reply.statfs(
            stats.blocks,
            0,
            0,
            stats.files,
            0,
            stats.block_size,
            stats.name_max,
            stats.block_size,
        );
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        tracing::warn!(parent, ?name, "create rejected: tree is fixed");
        reply.error(libc::EPERM);
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        tracing::warn!(parent, ?name, "mkdir rejected: tree is fixed");
        reply.error(libc::EPERM);
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        tracing::warn!(parent, ?name, "unlink rejected: tree is fixed");
        reply.error(libc::EPERM);
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        tracing::warn!(parent, ?name, "rmdir rejected: tree is fixed");
        reply.error(libc::EPERM);
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _newparent: u64,
        _newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        tracing::warn!(parent, ?name, "rename rejected: tree is fixed");
        reply.error(libc::EPERM);
    }
}
