// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Reader/writer locks with handle semantics.

use handle_table::SharedToken;

use crate::backend::{Backend, Platform, RwLockImpl};
use crate::error::{Error, Result};
use crate::id::{ObjectId, ObjectType};
use crate::state::tables;
use crate::task::current_creator;

pub(crate) struct RwLockObj {
    lock: <Platform as Backend>::RwLock,
}

fn token(id: ObjectId) -> Result<SharedToken<'static, RwLockObj>> {
    let key = id.key_as(ObjectType::RwLock).ok_or(Error::InvalidId)?;
    Ok(tables().rwlocks.shared(key)?)
}

pub fn create(name: &str) -> Result<ObjectId> {
    let reservation = tables().rwlocks.reserve(name, current_creator())?;
    let lock = <Platform as Backend>::RwLock::create()?;
    let key = reservation.commit(RwLockObj { lock });
    Ok(ObjectId::from_parts(ObjectType::RwLock, key))
}

pub fn delete(id: ObjectId) -> Result<()> {
    let key = id.key_as(ObjectType::RwLock).ok_or(Error::InvalidId)?;
    let pending = tables().rwlocks.begin_delete(key)?;
    match pending.payload().lock.destroy() {
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

pub fn read_take(id: ObjectId) -> Result<()> {
    token(id)?.lock.read_take()
}

pub fn read_give(id: ObjectId) -> Result<()> {
    token(id)?.lock.read_give()
}

pub fn write_take(id: ObjectId) -> Result<()> {
    token(id)?.lock.write_take()
}

pub fn write_give(id: ObjectId) -> Result<()> {
    token(id)?.lock.write_give()
}

pub fn get_id_by_name(name: &str) -> Result<ObjectId> {
    if name.len() > crate::config::MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    tables()
        .rwlocks
        .find_by_name(name)
        .map(|key| ObjectId::from_parts(ObjectType::RwLock, key))
        .ok_or(Error::NameNotFound)
}

#[derive(Debug, Clone)]
pub struct RwLockInfo {
    pub name: String,
    pub creator: ObjectId,
}

pub fn get_info(id: ObjectId) -> Result<RwLockInfo> {
    let key = id.key_as(ObjectType::RwLock).ok_or(Error::InvalidId)?;
    let entry = tables().rwlocks.info(key)?;
    Ok(RwLockInfo {
        name: entry.name,
        creator: ObjectId::from_u32(entry.creator),
    })
}
