// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Directory creation, removal, and handle-based iteration.

use handle_table::SharedToken;

use crate::backend::{Backend, DirImpl, Platform};
use crate::error::{Error, Result};
use crate::file::validate_path;
use crate::id::{ObjectId, ObjectType};
use crate::state::tables;
use crate::task::current_creator;

pub(crate) struct DirObj {
    dir: <Platform as Backend>::Dir,
}

fn token(id: ObjectId) -> Result<SharedToken<'static, DirObj>> {
    let key = id.key_as(ObjectType::Dir).ok_or(Error::InvalidId)?;
    Ok(tables().dirs.shared(key)?)
}

pub fn mkdir(path: &str) -> Result<()> {
    validate_path(path)?;
    Platform::fs_mkdir(path)
}

pub fn rmdir(path: &str) -> Result<()> {
    validate_path(path)?;
    Platform::fs_rmdir(path)
}

/// Opens `path` for iteration with [`read`].
pub fn open(path: &str) -> Result<ObjectId> {
    validate_path(path)?;
    let reservation = tables().dirs.reserve(path, current_creator())?;
    let dir = <Platform as Backend>::Dir::open(path)?;
    let key = reservation.commit(DirObj { dir });
    Ok(ObjectId::from_parts(ObjectType::Dir, key))
}

/// The next entry name, or `None` once the directory is exhausted.
pub fn read(id: ObjectId) -> Result<Option<String>> {
    token(id)?.dir.next()
}

/// Restarts iteration from the first entry.
pub fn rewind(id: ObjectId) -> Result<()> {
    token(id)?.dir.rewind()
}

pub fn close(id: ObjectId) -> Result<()> {
    let key = id.key_as(ObjectType::Dir).ok_or(Error::InvalidId)?;
    let pending = tables().dirs.begin_delete(key)?;
    match pending.payload().dir.destroy() {
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
