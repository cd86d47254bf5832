// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Binary semaphores: a single give/take slot with flushable waiters.

use core::time::Duration;

use handle_table::SharedToken;

use crate::backend::{Backend, BinSemImpl, Platform};
use crate::error::{Error, Result};
use crate::id::{ObjectId, ObjectType};
use crate::state::tables;
use crate::task::current_creator;
use crate::time::Timeout;

pub(crate) struct BinSemObj {
    sem: <Platform as Backend>::BinSem,
}

fn token(id: ObjectId) -> Result<SharedToken<'static, BinSemObj>> {
    let key = id.key_as(ObjectType::BinSem).ok_or(Error::InvalidId)?;
    Ok(tables().bin_sems.shared(key)?)
}

/// Creates a binary semaphore with the given initial availability.
pub fn create(name: &str, initial: bool) -> Result<ObjectId> {
    let reservation = tables().bin_sems.reserve(name, current_creator())?;
    let sem = <Platform as Backend>::BinSem::create(initial)?;
    let key = reservation.commit(BinSemObj { sem });
    let id = ObjectId::from_parts(ObjectType::BinSem, key);
    tracing::debug!(?id, name, "binsem created");
    Ok(id)
}

/// Deletes the semaphore once all in-flight operations on it have drained.
/// Waiters blocked in `take` keep the record alive until they return.
pub fn delete(id: ObjectId) -> Result<()> {
    let key = id.key_as(ObjectType::BinSem).ok_or(Error::InvalidId)?;
    let pending = tables().bin_sems.begin_delete(key)?;
    match pending.payload().sem.destroy() {
        Ok(()) | Err(Error::InvalidId) => {
            pending.finish();
            tracing::debug!(?id, "binsem deleted");
            Ok(())
        }
        Err(err) => {
            pending.cancel();
            Err(err)
        }
    }
}

/// Blocks until the semaphore is available, then takes it.
pub fn take(id: ObjectId) -> Result<()> {
    token(id)?.sem.take(Timeout::Forever)
}

/// Takes the semaphore if it becomes available within `timeout`; a zero
/// timeout polls.
pub fn timed_wait(id: ObjectId, timeout: Duration) -> Result<()> {
    token(id)?.sem.take(Timeout::from(timeout))
}

/// Makes the semaphore available and releases one waiter.
pub fn give(id: ObjectId) -> Result<()> {
    token(id)?.sem.give()
}

/// Releases every current waiter without making the semaphore available.
pub fn flush(id: ObjectId) -> Result<()> {
    token(id)?.sem.flush()
}

pub fn get_id_by_name(name: &str) -> Result<ObjectId> {
    if name.len() > crate::config::MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    tables()
        .bin_sems
        .find_by_name(name)
        .map(|key| ObjectId::from_parts(ObjectType::BinSem, key))
        .ok_or(Error::NameNotFound)
}

#[derive(Debug, Clone)]
pub struct BinSemInfo {
    pub name: String,
    pub creator: ObjectId,
    /// Current availability: 0 or 1.
    pub value: i32,
}

pub fn get_info(id: ObjectId) -> Result<BinSemInfo> {
    let key = id.key_as(ObjectType::BinSem).ok_or(Error::InvalidId)?;
    let token = tables().bin_sems.shared(key)?;
    let entry = tables().bin_sems.info(key)?;
    Ok(BinSemInfo {
        name: entry.name,
        creator: ObjectId::from_u32(entry.creator),
        value: token.sem.value(),
    })
}
