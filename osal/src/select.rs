// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Readiness waits over one handle or sets of handles.
//!
//! Back-ends without a readiness primitive report `NotImplemented` for both
//! entry points; the flags and set types still exist so portable code can
//! compile everywhere.

use bitflags::bitflags;

use crate::backend::{Backend, Platform};
use crate::error::{Error, Result};
use crate::id::{ObjectId, ObjectType};
use crate::state::tables;
use crate::time::Timeout;

bitflags! {
    /// Conditions a handle can be waited on for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SelectFlags: u32 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 1;
        const EXCEPTIONAL = 1 << 2;
    }
}

/// A set of file handles for [`select_multiple`].
#[derive(Debug, Clone, Default)]
pub struct FdSet {
    members: Vec<ObjectId>,
}

impl FdSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: ObjectId) {
        if !self.members.contains(&id) {
            self.members.push(id);
        }
    }

    pub fn remove(&mut self, id: ObjectId) {
        self.members.retain(|m| *m != id);
    }

    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.members.contains(&id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    fn retain_mask(&mut self, mask: u64) {
        let mut position = 0;
        self.members.retain(|_| {
            let keep = mask & (1 << position) != 0;
            position += 1;
            keep
        });
    }
}

/// Waits until `id` satisfies one of `flags`, returning the subset that is
/// actually ready.
pub fn select_single(id: ObjectId, flags: SelectFlags, timeout: Timeout) -> Result<SelectFlags> {
    if flags.is_empty() {
        return Err(Error::InvalidSize);
    }
    let key = id.key_as(ObjectType::File).ok_or(Error::InvalidId)?;
    let token = tables().files.shared(key)?;
    Platform::select_single(&token.file, flags, timeout)
}

/// Waits until any member of `read_set` is readable or any member of
/// `write_set` is writable, then shrinks both sets to their ready members.
/// The sets are left untouched on error.
pub fn select_multiple(
    read_set: &mut FdSet,
    write_set: &mut FdSet,
    timeout: Timeout,
) -> Result<()> {
    if read_set.is_empty() && write_set.is_empty() {
        return Err(Error::InvalidSize);
    }
    let read_tokens = read_set
        .members
        .iter()
        .map(|id| {
            let key = id.key_as(ObjectType::File).ok_or(Error::InvalidId)?;
            Ok(tables().files.shared(key)?)
        })
        .collect::<Result<Vec<_>>>()?;
    let write_tokens = write_set
        .members
        .iter()
        .map(|id| {
            let key = id.key_as(ObjectType::File).ok_or(Error::InvalidId)?;
            Ok(tables().files.shared(key)?)
        })
        .collect::<Result<Vec<_>>>()?;

    let read_files: Vec<_> = read_tokens.iter().map(|t| &t.file).collect();
    let write_files: Vec<_> = write_tokens.iter().map(|t| &t.file).collect();

    let (read_ready, write_ready) = Platform::select_multiple(&read_files, &write_files, timeout)?;

    read_set.retain_mask(read_ready);
    write_set.retain_mask(write_ready);
    Ok(())
}
