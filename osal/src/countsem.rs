// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Counting semaphores.

use core::time::Duration;

use handle_table::SharedToken;

use crate::backend::{Backend, CountSemImpl, Platform};
use crate::config::MAX_SEM_VALUE;
use crate::error::{Error, Result};
use crate::id::{ObjectId, ObjectType};
use crate::state::tables;
use crate::task::current_creator;
use crate::time::Timeout;

pub(crate) struct CountSemObj {
    sem: <Platform as Backend>::CountSem,
}

fn token(id: ObjectId) -> Result<SharedToken<'static, CountSemObj>> {
    let key = id.key_as(ObjectType::CountSem).ok_or(Error::InvalidId)?;
    Ok(tables().count_sems.shared(key)?)
}

/// Creates a counting semaphore with the given initial value. Values above
/// the configured cap are rejected with `InvalidSemValue`.
pub fn create(name: &str, initial: u32) -> Result<ObjectId> {
    if initial > MAX_SEM_VALUE {
        return Err(Error::InvalidSemValue);
    }
    let reservation = tables().count_sems.reserve(name, current_creator())?;
    let sem = <Platform as Backend>::CountSem::create(initial)?;
    let key = reservation.commit(CountSemObj { sem });
    let id = ObjectId::from_parts(ObjectType::CountSem, key);
    tracing::debug!(?id, name, initial, "countsem created");
    Ok(id)
}

pub fn delete(id: ObjectId) -> Result<()> {
    let key = id.key_as(ObjectType::CountSem).ok_or(Error::InvalidId)?;
    let pending = tables().count_sems.begin_delete(key)?;
    match pending.payload().sem.destroy() {
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

pub fn take(id: ObjectId) -> Result<()> {
    token(id)?.sem.take(Timeout::Forever)
}

/// Decrements the semaphore if it becomes positive within `timeout`; a zero
/// timeout polls.
pub fn timed_wait(id: ObjectId, timeout: Duration) -> Result<()> {
    token(id)?.sem.take(Timeout::from(timeout))
}

pub fn give(id: ObjectId) -> Result<()> {
    token(id)?.sem.give()
}

pub fn get_id_by_name(name: &str) -> Result<ObjectId> {
    if name.len() > crate::config::MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    tables()
        .count_sems
        .find_by_name(name)
        .map(|key| ObjectId::from_parts(ObjectType::CountSem, key))
        .ok_or(Error::NameNotFound)
}

#[derive(Debug, Clone)]
pub struct CountSemInfo {
    pub name: String,
    pub creator: ObjectId,
    pub value: i32,
}

pub fn get_info(id: ObjectId) -> Result<CountSemInfo> {
    let key = id.key_as(ObjectType::CountSem).ok_or(Error::InvalidId)?;
    let token = tables().count_sems.shared(key)?;
    let entry = tables().count_sems.info(key)?;
    Ok(CountSemInfo {
        name: entry.name,
        creator: ObjectId::from_u32(entry.creator),
        value: token.sem.value(),
    })
}
