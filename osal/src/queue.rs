// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Fixed-depth message queues carrying opaque byte payloads.

use handle_table::SharedToken;

use crate::backend::{Backend, Platform, QueueImpl};
use crate::error::{Error, Result};
use crate::id::{ObjectId, ObjectType};
use crate::state::tables;
use crate::task::current_creator;
use crate::time::Timeout;

/// Deepest accepted queue.
pub const MAX_QUEUE_DEPTH: usize = 64;

pub(crate) struct QueueObj {
    queue: <Platform as Backend>::Queue,
    depth: usize,
    item_size: usize,
}

fn token(id: ObjectId) -> Result<SharedToken<'static, QueueObj>> {
    let key = id.key_as(ObjectType::Queue).ok_or(Error::InvalidId)?;
    Ok(tables().queues.shared(key)?)
}

/// Creates a queue holding up to `depth` messages of at most `item_size`
/// bytes each.
pub fn create(name: &str, depth: usize, item_size: usize) -> Result<ObjectId> {
    if depth == 0 || depth > MAX_QUEUE_DEPTH {
        return Err(Error::QueueInvalidSize);
    }
    if item_size == 0 {
        return Err(Error::QueueInvalidSize);
    }
    let reservation = tables().queues.reserve(name, current_creator())?;
    let queue = <Platform as Backend>::Queue::create(depth, item_size)?;
    let key = reservation.commit(QueueObj {
        queue,
        depth,
        item_size,
    });
    let id = ObjectId::from_parts(ObjectType::Queue, key);
    tracing::debug!(?id, name, depth, item_size, "queue created");
    Ok(id)
}

pub fn delete(id: ObjectId) -> Result<()> {
    let key = id.key_as(ObjectType::Queue).ok_or(Error::InvalidId)?;
    let pending = tables().queues.begin_delete(key)?;
    match pending.payload().queue.destroy() {
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

/// Enqueues `data`. Never blocks: a queue at depth fails immediately with
/// `QueueFull`.
pub fn put(id: ObjectId, data: &[u8]) -> Result<()> {
    let token = token(id)?;
    if data.len() > token.item_size {
        return Err(Error::QueueInvalidSize);
    }
    token.queue.send(data)
}

/// Dequeues the oldest message into `buf`, returning its length. `buf` must
/// hold the queue's full item size; `Timeout::Poll` fails immediately with
/// `QueueEmpty` when there is nothing to read.
pub fn get(id: ObjectId, buf: &mut [u8], timeout: Timeout) -> Result<usize> {
    let token = token(id)?;
    if buf.len() < token.item_size {
        return Err(Error::QueueInvalidSize);
    }
    token.queue.recv(buf, timeout)
}

pub fn get_id_by_name(name: &str) -> Result<ObjectId> {
    if name.len() > crate::config::MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    tables()
        .queues
        .find_by_name(name)
        .map(|key| ObjectId::from_parts(ObjectType::Queue, key))
        .ok_or(Error::NameNotFound)
}

#[derive(Debug, Clone)]
pub struct QueueInfo {
    pub name: String,
    pub creator: ObjectId,
    pub depth: usize,
    pub item_size: usize,
}

pub fn get_info(id: ObjectId) -> Result<QueueInfo> {
    let key = id.key_as(ObjectType::Queue).ok_or(Error::InvalidId)?;
    let token = tables().queues.shared(key)?;
    let entry = tables().queues.info(key)?;
    Ok(QueueInfo {
        name: entry.name,
        creator: ObjectId::from_u32(entry.creator),
        depth: token.depth,
        item_size: token.item_size,
    })
}
