//! Adapts `fuser`'s inode-based lowlevel API to [`colafs_fs::FileSystem`]'s
//! path-based one.
//!
//! Everything here is plumbing: turn an inode into a path, call the
//! facade, turn the facade's answer back into a `fuser` reply. None of
//! the filesystem's own invariants live in this file — they live in
//! `colafs_fs`, which this module never second-guesses.

use std::ffi::OsStr;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use colafs_err::{Error, FsError};
use colafs_fs::{ColaFs, EntryKind, FileSystem};
use colafs_store::DataStorage;
use fuser::{
    Errno, FileAttr, FileHandle, FileType, FopenFlags, INodeNo, OpenFlags, ReadFlags, Request,
    WriteFlags,
};

use crate::inode::InodeTable;

const TTL: Duration = Duration::from_secs(1);

pub struct Bridge<DS: DataStorage> {
    fs: ColaFs<DS>,
    inodes: Mutex<InodeTable>,
    block_size: u32,
}

impl<DS: DataStorage> Bridge<DS> {
    pub fn new(fs: ColaFs<DS>) -> Self {
        let block_size = fs.store().block_size() as u32;
        Bridge { fs, inodes: Mutex::new(InodeTable::new()), block_size }
    }

    fn path_of(&self, ino: INodeNo) -> Option<String> {
        self.inodes.lock().unwrap().path(u64::from(ino)).map(str::to_string)
    }

    fn intern_child(&self, parent: INodeNo, name: &OsStr) -> Option<(u64, String)> {
        let parent_path = self.path_of(parent)?;
        let name = name.to_str()?;
        let path = InodeTable::child_path(&parent_path, name);
        let ino = self.inodes.lock().unwrap().intern(&path);
        Some((ino, path))
    }

    fn attr_for(&self, ino: u64, path: &str) -> Result<FileAttr, Errno> {
        let attr = self.fs.getattr(path).map_err(to_errno)?;
        let now = SystemTime::now();
        Ok(FileAttr {
            ino: INodeNo::from(ino),
            size: attr.size,
            blocks: attr.size.div_ceil(512),
            atime: now,
            mtime: now,
            ctime: now,
            crtime: now,
            kind: match attr.kind {
                EntryKind::Dir => FileType::Directory,
                EntryKind::File => FileType::RegularFile,
            },
            perm: attr.mode as u16,
            nlink: attr.nlink,
            uid: 0,
            gid: 0,
            rdev: 0,
            blksize: self.block_size,
            flags: 0,
        })
    }
}

fn to_errno(err: Error) -> Errno {
    match err {
        Error::Fs(FsError::NotFound) => Errno::ENOENT,
        Error::Fs(FsError::AlreadyExists) => Errno::EEXIST,
        Error::Fs(FsError::AccessDenied) => Errno::EACCES,
        Error::Fs(FsError::OutOfSpace) => Errno::ENOSPC,
        Error::Fs(FsError::NoMemory) => Errno::ENOMEM,
        Error::Io(_) => Errno::EIO,
    }
}

impl<DS: DataStorage + 'static> fuser::Filesystem for Bridge<DS> {
    fn lookup(&self, _req: &Request, parent: INodeNo, name: &OsStr, reply: fuser::ReplyEntry) {
        let Some((ino, path)) = self.intern_child(parent, name) else {
            reply.error(Errno::ENOENT);
            return;
        };
        match self.attr_for(ino, &path) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e),
        }
    }

    fn getattr(&self, _req: &Request, ino: INodeNo, _fh: Option<FileHandle>, reply: fuser::ReplyAttr) {
        let Some(path) = self.path_of(ino) else {
            reply.error(Errno::ENOENT);
            return;
        };
        match self.attr_for(u64::from(ino), &path) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(e),
        }
    }

    fn setattr(
        &self,
        _req: &Request,
        ino: INodeNo,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<FileHandle>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<fuser::BsdFileFlags>,
        reply: fuser::ReplyAttr,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(Errno::ENOENT);
            return;
        };
        if let Some(size) = size {
            if let Err(e) = self.fs.truncate(&path, size) {
                reply.error(to_errno(e));
                return;
            }
        }
        match self.attr_for(u64::from(ino), &path) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(e),
        }
    }

    fn mknod(
        &self,
        _req: &Request,
        parent: INodeNo,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: fuser::ReplyEntry,
    ) {
        let Some((ino, path)) = self.intern_child(parent, name) else {
            reply.error(Errno::EINVAL);
            return;
        };
        if let Err(e) = self.fs.mknod(&path) {
            reply.error(to_errno(e));
            return;
        }
        match self.attr_for(ino, &path) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e),
        }
    }

    fn mkdir(
        &self,
        _req: &Request,
        parent: INodeNo,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: fuser::ReplyEntry,
    ) {
        let Some((ino, path)) = self.intern_child(parent, name) else {
            reply.error(Errno::EINVAL);
            return;
        };
        if let Err(e) = self.fs.mkdir(&path) {
            reply.error(to_errno(e));
            return;
        }
        match self.attr_for(ino, &path) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e),
        }
    }

    fn open(&self, _req: &Request, ino: INodeNo, _flags: OpenFlags, reply: fuser::ReplyOpen) {
        let Some(path) = self.path_of(ino) else {
            reply.error(Errno::ENOENT);
            return;
        };
        match self.fs.open(&path) {
            Ok(()) => reply.opened(FileHandle::from(0), FopenFlags::empty()),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn read(
        &self,
        _req: &Request,
        ino: INodeNo,
        _fh: FileHandle,
        offset: u64,
        size: u32,
        _read_flags: ReadFlags,
        _flags: u32,
        _lock_owner: Option<fuser::LockOwner>,
        reply: fuser::ReplyData,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(Errno::ENOENT);
            return;
        };
        let mut buf = vec![0u8; size as usize];
        match self.fs.read(&path, offset, &mut buf) {
            Ok(n) => reply.data(&buf[..n]),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn write(
        &self,
        _req: &Request,
        ino: INodeNo,
        _fh: FileHandle,
        offset: i64,
        data: &[u8],
        _write_flags: WriteFlags,
        _flags: OpenFlags,
        _lock_owner: Option<fuser::LockOwner>,
        reply: fuser::ReplyWrite,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(Errno::ENOENT);
            return;
        };
        if offset < 0 {
            reply.error(Errno::EINVAL);
            return;
        }
        match self.fs.write(&path, offset as u64, data) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(to_errno(e)),
        }
    }

    fn readdir(
        &self,
        _req: &Request,
        ino: INodeNo,
        _fh: FileHandle,
        offset: u64,
        mut reply: fuser::ReplyDirectory,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(Errno::ENOENT);
            return;
        };
        let names = match self.fs.readdir(&path) {
            Ok(names) => names,
            Err(e) => {
                reply.error(to_errno(e));
                return;
            }
        };

        for (i, name) in names.iter().enumerate().skip(offset as usize) {
            let child_path = match name.as_str() {
                "." => path.clone(),
                ".." => path.clone(),
                child => InodeTable::child_path(&path, child),
            };
            let child_ino = self.inodes.lock().unwrap().intern(&child_path);
            let kind = match self.fs.getattr(&child_path) {
                Ok(attr) if attr.kind == EntryKind::Dir => FileType::Directory,
                _ => FileType::RegularFile,
            };
            if reply.add(INodeNo::from(child_ino), (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }
}

