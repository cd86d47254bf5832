// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Tasks: named platform threads with priorities and a reaped lifecycle.
//!
//! Deletion is cooperative. Deleting a task from outside runs its registered
//! delete handler, invalidates the id, and detaches the platform thread; an
//! in-flight operation by the deleted task runs to completion, and every
//! call it makes afterwards fails with `InvalidId`. Self-exit unwinds to the
//! spawn wrapper through a private sentinel, so destructors on the task's
//! stack still run.

use core::cell::Cell;
use core::time::Duration;

use handle_table::SharedToken;
use parking_lot::Mutex;

use crate::backend::{Backend, Platform, TaskImpl};
use crate::config::{MAX_NAME_LEN, MIN_STACK_SIZE};
use crate::error::{Error, Result};
use crate::id::{ObjectId, ObjectType};
use crate::state::tables;

pub(crate) struct TaskObj {
    plat: <Platform as Backend>::Task,
    stack_size: usize,
    priority: Mutex<u8>,
    delete_handler: Mutex<Option<Box<dyn Fn() + Send>>>,
}

thread_local! {
    static CURRENT: Cell<ObjectId> = const { Cell::new(ObjectId::UNDEFINED) };
}

/// Panic payload used by [`exit`] to unwind to the spawn wrapper.
pub(crate) struct ExitToken;

fn token(id: ObjectId) -> Result<SharedToken<'static, TaskObj>> {
    let key = id.key_as(ObjectType::Task).ok_or(Error::InvalidId)?;
    Ok(tables().tasks.shared(key)?)
}

/// Spawns a task named `name` running `entry`.
///
/// The id of the new task is returned to the creator and also visible to the
/// task itself through [`id_self`] by the time `entry` runs. Priority 0 is
/// the most urgent; on hosts that refuse realtime scheduling the priority is
/// advisory.
pub fn create<F>(name: &str, entry: F, stack_size: usize, priority: u8) -> Result<ObjectId>
where
    F: FnOnce() + Send + 'static,
{
    if stack_size == 0 {
        return Err(Error::InvalidSize);
    }

    let reservation = tables().tasks.reserve(name, current_creator())?;

    // the task cannot know its own id before the slot commits, so it waits
    // on this channel in the wrapper
    let (tx, rx) = crossbeam_channel::bounded::<ObjectId>(1);
    let body: crate::backend::TaskBody = Box::new(move || run_task(&rx, entry));
    let plat = <Platform as Backend>::Task::spawn(
        name,
        stack_size.max(MIN_STACK_SIZE),
        priority,
        body,
    )?;

    let key = reservation.commit(TaskObj {
        plat,
        stack_size: stack_size.max(MIN_STACK_SIZE),
        priority: Mutex::new(priority),
        delete_handler: Mutex::new(None),
    });
    let id = ObjectId::from_parts(ObjectType::Task, key);
    let _ = tx.send(id);
    tracing::debug!(?id, name, priority, "task created");
    Ok(id)
}

fn run_task<F>(rx: &crossbeam_channel::Receiver<ObjectId>, entry: F)
where
    F: FnOnce() + Send + 'static,
{
    // a closed channel means the creator aborted after spawn
    let Ok(id) = rx.recv() else { return };
    CURRENT.with(|c| c.set(id));

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(entry));
    if let Err(payload) = outcome {
        if payload.downcast_ref::<ExitToken>().is_none() {
            tracing::error!(?id, "task panicked");
        }
    }

    reap_self(id);
}

/// Removes the record of a task that has finished running, whether by
/// returning from its entry or through [`exit`]. Loses quietly to a
/// concurrent external delete.
fn reap_self(id: ObjectId) {
    CURRENT.with(|c| c.set(ObjectId::UNDEFINED));
    let Some(key) = id.key_as(ObjectType::Task) else {
        return;
    };
    if let Ok(pending) = tables().tasks.begin_delete(key) {
        let _ = pending.payload().plat.detach();
        pending.finish();
        tracing::debug!(?id, "task exited");
    }
}

/// Deletes a task: runs its delete handler (once), invalidates the id, and
/// detaches the platform thread.
pub fn delete(id: ObjectId) -> Result<()> {
    let key = id.key_as(ObjectType::Task).ok_or(Error::InvalidId)?;

    let handler = {
        let token = tables().tasks.shared(key)?;
        token.delete_handler.lock().take()
    };
    if let Some(handler) = handler {
        handler();
    }

    let pending = tables().tasks.begin_delete(key)?;
    let _ = pending.payload().plat.detach();
    pending.finish();
    tracing::debug!(?id, "task deleted");
    Ok(())
}

/// Ends the calling task. Must be called from a task created through this
/// layer; the record is reaped by the spawn wrapper on the way out.
pub fn exit() -> ! {
    std::panic::panic_any(ExitToken);
}

/// Suspends the calling thread for at least `duration`.
pub fn delay(duration: Duration) {
    Platform::task_delay(duration);
}

/// Id of the calling task, or [`ObjectId::UNDEFINED`] outside any task.
#[must_use]
pub fn id_self() -> ObjectId {
    CURRENT.with(Cell::get)
}

/// Creator id for a new object: the calling task, or the system sentinel
/// outside any task context.
pub(crate) fn current_creator() -> u32 {
    let id = id_self();
    if id.is_defined() {
        id.as_u32()
    } else {
        ObjectId::SYSTEM.as_u32()
    }
}

pub fn set_priority(id: ObjectId, priority: u8) -> Result<()> {
    let token = token(id)?;
    token.plat.set_priority(priority)?;
    *token.priority.lock() = priority;
    Ok(())
}

/// Registers a handler run by whichever context later deletes this task.
/// Applies to the calling task.
pub fn install_delete_handler<F>(handler: F) -> Result<()>
where
    F: Fn() + Send + 'static,
{
    let token = token(id_self())?;
    *token.delete_handler.lock() = Some(Box::new(handler));
    Ok(())
}

pub fn get_id_by_name(name: &str) -> Result<ObjectId> {
    if name.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    tables()
        .tasks
        .find_by_name(name)
        .map(|key| ObjectId::from_parts(ObjectType::Task, key))
        .ok_or(Error::NameNotFound)
}

#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: String,
    pub creator: ObjectId,
    pub stack_size: usize,
    pub priority: u8,
}

pub fn get_info(id: ObjectId) -> Result<TaskInfo> {
    let key = id.key_as(ObjectType::Task).ok_or(Error::InvalidId)?;
    let token = tables().tasks.shared(key)?;
    let entry = tables().tasks.info(key)?;
    Ok(TaskInfo {
        name: entry.name,
        creator: ObjectId::from_u32(entry.creator),
        stack_size: token.stack_size,
        priority: *token.priority.lock(),
    })
}
