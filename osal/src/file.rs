// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The portable file seam: handle-based descriptors with uniform blocking,
//! polled, and timed transfer semantics across back-ends.
//!
//! Handles come in two kinds. *Selectable* handles (pipes, ttys, sockets)
//! support readiness waits, so timed transfers wait for readiness first and
//! a poll maps "not ready" to [`Error::WouldBlock`]. Non-selectable handles
//! (regular files) are always ready; their transfers go straight to the
//! back-end and the timeout is ignored.

use std::time::Instant;

use bitflags::bitflags;
use handle_table::SharedToken;

use crate::backend::{Backend, FileImpl, Platform};
use crate::config::MAX_PATH_LEN;
use crate::error::{Error, Result};
use crate::id::{ObjectId, ObjectType};
use crate::select::SelectFlags;
use crate::state::tables;
use crate::task::current_creator;
use crate::time::Timeout;

bitflags! {
    /// Open-time behaviour flags, combined with an [`AccessMode`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const CREATE = 1 << 0;
        const TRUNCATE = 1 << 1;
        const EXCL = 1 << 2;
        const APPEND = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// Origin for [`seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekBase {
    Set,
    Current,
    End,
}

/// Filesystem metadata returned by [`stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub is_file: bool,
    pub is_dir: bool,
    pub mtime_secs: i64,
}

pub(crate) struct FileObj {
    pub(crate) file: <Platform as Backend>::File,
}

pub(crate) fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidPointer);
    }
    if path.len() > MAX_PATH_LEN {
        return Err(Error::NameTooLong);
    }
    Ok(())
}

fn token(id: ObjectId) -> Result<SharedToken<'static, FileObj>> {
    let key = id.key_as(ObjectType::File).ok_or(Error::InvalidId)?;
    Ok(tables().files.shared(key)?)
}

/// Opens (optionally creating) `path`. The handle is named by the path, so
/// an open path can be found again with [`get_id_by_name`].
pub fn open(path: &str, flags: OpenFlags, access: AccessMode) -> Result<ObjectId> {
    validate_path(path)?;
    let reservation = tables().files.reserve(path, current_creator())?;
    let file = <Platform as Backend>::File::open(path, flags, access)?;
    let key = reservation.commit(FileObj { file });
    let id = ObjectId::from_parts(ObjectType::File, key);
    tracing::debug!(?id, path, "file opened");
    Ok(id)
}

pub fn close(id: ObjectId) -> Result<()> {
    let key = id.key_as(ObjectType::File).ok_or(Error::InvalidId)?;
    let pending = tables().files.begin_delete(key)?;
    match pending.payload().file.destroy() {
        Ok(()) | Err(Error::InvalidId) => {
            pending.finish();
            Ok(())
        }
        Err(err) => {
            pending.cancel();
            Err(err)
        }
    }
}

/// Blocking read.
pub fn read(id: ObjectId, buf: &mut [u8]) -> Result<usize> {
    timed_read(id, buf, Timeout::Forever)
}

/// Blocking write of the whole buffer.
pub fn write(id: ObjectId, data: &[u8]) -> Result<usize> {
    timed_write(id, data, Timeout::Forever)
}

/// Reads once the handle is ready, waiting at most `timeout` on selectable
/// handles. Non-selectable handles read directly; the timeout is ignored.
pub fn timed_read(id: ObjectId, buf: &mut [u8], timeout: Timeout) -> Result<usize> {
    if buf.is_empty() {
        return Err(Error::InvalidSize);
    }
    let token = token(id)?;
    if token.file.selectable() {
        Platform::select_single(&token.file, SelectFlags::READABLE, timeout)?;
    }
    token.file.read(buf)
}

/// Writes the whole buffer, retrying partial writes until it is written, the
/// timeout expires, or the back-end reports a hard error. Returns the byte
/// count actually transferred, which is only short on expiry.
pub fn timed_write(id: ObjectId, data: &[u8], timeout: Timeout) -> Result<usize> {
    if data.is_empty() {
        return Err(Error::InvalidSize);
    }
    let token = token(id)?;
    let deadline = match timeout {
        Timeout::After(d) => Some(Instant::now() + d),
        _ => None,
    };

    let mut written = 0;
    while written < data.len() {
        if token.file.selectable() {
            let remaining = match (timeout, deadline) {
                (Timeout::Poll, _) => Timeout::Poll,
                (Timeout::Forever, _) => Timeout::Forever,
                (_, Some(deadline)) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        break;
                    }
                    Timeout::After(left)
                }
                (_, None) => Timeout::Forever,
            };
            match Platform::select_single(&token.file, SelectFlags::WRITABLE, remaining) {
                Ok(_) => {}
                Err(Error::Timeout | Error::WouldBlock) if written > 0 => break,
                Err(err) => return Err(err),
            }
        }
        match token.file.write(&data[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(err) if written == 0 => return Err(err),
            Err(_) => break,
        }
    }

    if written == 0 {
        return Err(Error::Timeout);
    }
    Ok(written)
}

/// Moves the stream position of a regular file. Other handle kinds fail
/// with `InvalidId`.
pub fn seek(id: ObjectId, offset: i64, whence: SeekBase) -> Result<u64> {
    token(id)?.file.seek(offset, whence)
}

pub fn remove(path: &str) -> Result<()> {
    validate_path(path)?;
    Platform::fs_remove(path)
}

pub fn rename(old: &str, new: &str) -> Result<()> {
    validate_path(old)?;
    validate_path(new)?;
    Platform::fs_rename(old, new)
}

pub fn chmod(path: &str, access: AccessMode) -> Result<()> {
    validate_path(path)?;
    Platform::fs_chmod(path, access)
}

pub fn stat(path: &str) -> Result<FileStat> {
    validate_path(path)?;
    Platform::fs_stat(path)
}

pub fn get_id_by_name(path: &str) -> Result<ObjectId> {
    if path.len() > MAX_PATH_LEN {
        return Err(Error::NameTooLong);
    }
    tables()
        .files
        .find_by_name(path)
        .map(|key| ObjectId::from_parts(ObjectType::File, key))
        .ok_or(Error::NameNotFound)
}

#[derive(Debug, Clone)]
pub struct FileInfo {
    /// The path the handle was opened with.
    pub path: String,
    pub creator: ObjectId,
    pub selectable: bool,
}

pub fn get_info(id: ObjectId) -> Result<FileInfo> {
    let key = id.key_as(ObjectType::File).ok_or(Error::InvalidId)?;
    let token = tables().files.shared(key)?;
    let entry = tables().files.info(key)?;
    Ok(FileInfo {
        path: entry.name,
        creator: ObjectId::from_u32(entry.creator),
        selectable: token.file.selectable(),
    })
}
