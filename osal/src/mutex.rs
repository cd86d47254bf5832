// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Mutex semaphores with owner-checked give.

use handle_table::SharedToken;

use crate::backend::{Backend, MutexImpl, Platform};
use crate::error::{Error, Result};
use crate::id::{ObjectId, ObjectType};
use crate::state::tables;
use crate::task::current_creator;

pub(crate) struct MutexObj {
    mutex: <Platform as Backend>::Mutex,
}

fn token(id: ObjectId) -> Result<SharedToken<'static, MutexObj>> {
    let key = id.key_as(ObjectType::Mutex).ok_or(Error::InvalidId)?;
    Ok(tables().mutexes.shared(key)?)
}

pub fn create(name: &str) -> Result<ObjectId> {
    let reservation = tables().mutexes.reserve(name, current_creator())?;
    let mutex = <Platform as Backend>::Mutex::create()?;
    let key = reservation.commit(MutexObj { mutex });
    Ok(ObjectId::from_parts(ObjectType::Mutex, key))
}

pub fn delete(id: ObjectId) -> Result<()> {
    let key = id.key_as(ObjectType::Mutex).ok_or(Error::InvalidId)?;
    let pending = tables().mutexes.begin_delete(key)?;
    match pending.payload().mutex.destroy() {
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

/// Blocks until the mutex is free, then locks it for the calling task.
/// Relocking from the owner is refused rather than deadlocking.
pub fn take(id: ObjectId) -> Result<()> {
    token(id)?.mutex.take()
}

/// Unlocks the mutex; only the current owner may do so.
pub fn give(id: ObjectId) -> Result<()> {
    token(id)?.mutex.give()
}

pub fn get_id_by_name(name: &str) -> Result<ObjectId> {
    if name.len() > crate::config::MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    tables()
        .mutexes
        .find_by_name(name)
        .map(|key| ObjectId::from_parts(ObjectType::Mutex, key))
        .ok_or(Error::NameNotFound)
}

#[derive(Debug, Clone)]
pub struct MutexInfo {
    pub name: String,
    pub creator: ObjectId,
}

pub fn get_info(id: ObjectId) -> Result<MutexInfo> {
    let key = id.key_as(ObjectType::Mutex).ok_or(Error::InvalidId)?;
    let entry = tables().mutexes.info(key)?;
    Ok(MutexInfo {
        name: entry.name,
        creator: ObjectId::from_u32(entry.creator),
    })
}
