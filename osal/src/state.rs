// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Process-wide state and lifecycle.
//!
//! One table per resource type plus the console singleton, created lazily
//! and living for the whole process. [`init`] and [`teardown`] bracket the
//! useful life of the layer: init starts the background machinery (the
//! console drain thread), teardown deletes every remaining object in
//! dependency order and joins background threads. Both are idempotent.

use std::sync::atomic::{AtomicBool, Ordering};

use handle_table::Table;
use parking_lot::{Condvar, Mutex};

use crate::config;
use crate::error::Result;
use crate::id::{ObjectId, ObjectType};

pub(crate) struct Tables {
    pub tasks: Table<crate::task::TaskObj>,
    pub queues: Table<crate::queue::QueueObj>,
    pub bin_sems: Table<crate::binsem::BinSemObj>,
    pub count_sems: Table<crate::countsem::CountSemObj>,
    pub mutexes: Table<crate::mutex::MutexObj>,
    pub rwlocks: Table<crate::rwlock::RwLockObj>,
    pub timebases: Table<crate::time::timebase::TimeBaseObj>,
    pub timers: Table<crate::time::timer::TimerObj>,
    pub files: Table<crate::file::FileObj>,
    pub dirs: Table<crate::dir::DirObj>,
    pub modules: Table<crate::module::ModuleObj>,
}

static TABLES: std::sync::LazyLock<Tables> = std::sync::LazyLock::new(|| Tables {
    tasks: Table::new(config::MAX_TASKS, config::MAX_NAME_LEN),
    queues: Table::new(config::MAX_QUEUES, config::MAX_NAME_LEN),
    bin_sems: Table::new(config::MAX_BIN_SEMS, config::MAX_NAME_LEN),
    count_sems: Table::new(config::MAX_COUNT_SEMS, config::MAX_NAME_LEN),
    mutexes: Table::new(config::MAX_MUTEXES, config::MAX_NAME_LEN),
    rwlocks: Table::new(config::MAX_RWLOCKS, config::MAX_NAME_LEN),
    timebases: Table::new(config::MAX_TIMEBASES, config::MAX_NAME_LEN),
    timers: Table::new(config::MAX_TIMERS, config::MAX_NAME_LEN),
    files: Table::new(config::MAX_FILES, config::MAX_PATH_LEN),
    dirs: Table::new(config::MAX_DIRS, config::MAX_PATH_LEN),
    modules: Table::new(config::MAX_MODULES, config::MAX_NAME_LEN),
});

pub(crate) fn tables() -> &'static Tables {
    &TABLES
}

static INITIALIZED: AtomicBool = AtomicBool::new(false);

struct ShutdownGate {
    requested: Mutex<bool>,
    cvar: Condvar,
}

static SHUTDOWN: std::sync::LazyLock<ShutdownGate> = std::sync::LazyLock::new(|| ShutdownGate {
    requested: Mutex::new(false),
    cvar: Condvar::new(),
});

/// Brings the layer up: clears any previous shutdown request and starts the
/// console drain thread. Safe to call more than once.
///
/// # Errors
///
/// Currently infallible in practice; the signature leaves room for platform
/// bring-up to fail.
pub fn init() -> Result<()> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    // task self-exit unwinds with a private sentinel; keep the default panic
    // hook from reporting it as a crash
    static HOOK: std::sync::Once = std::sync::Once::new();
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<crate::task::ExitToken>().is_none() {
                previous(info);
            }
        }));
    });

    *SHUTDOWN.requested.lock() = false;
    crate::console::start();
    tracing::debug!("layer initialized");
    Ok(())
}

/// Deletes every remaining object (timers before their time bases, then the
/// rest) and stops the background threads. Safe to call more than once and
/// without a preceding [`init`].
///
/// Application tasks are expected to have exited: a task still blocked
/// inside an operation keeps the affected object alive, and teardown will
/// wait for it. Binary semaphores are flushed first so their waiters drain.
///
/// # Errors
///
/// Currently infallible; per-object delete failures during the sweep are
/// logged and skipped.
pub fn teardown() -> Result<()> {
    let tables = tables();

    for key in tables.timers.active_keys() {
        let id = ObjectId::from_parts(ObjectType::Timer, key);
        if let Err(err) = crate::time::timer::delete(id) {
            tracing::warn!(?id, %err, "teardown: timer delete failed");
        }
    }
    for key in tables.timebases.active_keys() {
        let id = ObjectId::from_parts(ObjectType::TimeBase, key);
        if let Err(err) = crate::time::timebase::delete(id) {
            tracing::warn!(?id, %err, "teardown: time base delete failed");
        }
    }
    for key in tables.tasks.active_keys() {
        let id = ObjectId::from_parts(ObjectType::Task, key);
        if let Err(err) = crate::task::delete(id) {
            tracing::warn!(?id, %err, "teardown: task delete failed");
        }
    }
    for key in tables.queues.active_keys() {
        let id = ObjectId::from_parts(ObjectType::Queue, key);
        if let Err(err) = crate::queue::delete(id) {
            tracing::warn!(?id, %err, "teardown: queue delete failed");
        }
    }
    for key in tables.bin_sems.active_keys() {
        let id = ObjectId::from_parts(ObjectType::BinSem, key);
        let _ = crate::binsem::flush(id);
        if let Err(err) = crate::binsem::delete(id) {
            tracing::warn!(?id, %err, "teardown: binsem delete failed");
        }
    }
    for key in tables.count_sems.active_keys() {
        let id = ObjectId::from_parts(ObjectType::CountSem, key);
        if let Err(err) = crate::countsem::delete(id) {
            tracing::warn!(?id, %err, "teardown: countsem delete failed");
        }
    }
    for key in tables.mutexes.active_keys() {
        let id = ObjectId::from_parts(ObjectType::Mutex, key);
        if let Err(err) = crate::mutex::delete(id) {
            tracing::warn!(?id, %err, "teardown: mutex delete failed");
        }
    }
    for key in tables.rwlocks.active_keys() {
        let id = ObjectId::from_parts(ObjectType::RwLock, key);
        if let Err(err) = crate::rwlock::delete(id) {
            tracing::warn!(?id, %err, "teardown: rwlock delete failed");
        }
    }
    for key in tables.files.active_keys() {
        let id = ObjectId::from_parts(ObjectType::File, key);
        if let Err(err) = crate::file::close(id) {
            tracing::warn!(?id, %err, "teardown: file close failed");
        }
    }
    for key in tables.dirs.active_keys() {
        let id = ObjectId::from_parts(ObjectType::Dir, key);
        if let Err(err) = crate::dir::close(id) {
            tracing::warn!(?id, %err, "teardown: dir close failed");
        }
    }
    for key in tables.modules.active_keys() {
        let id = ObjectId::from_parts(ObjectType::Module, key);
        if let Err(err) = crate::module::unload(id) {
            tracing::warn!(?id, %err, "teardown: module unload failed");
        }
    }

    crate::console::stop();
    INITIALIZED.store(false, Ordering::SeqCst);
    tracing::debug!("layer torn down");
    Ok(())
}

/// Parks the calling thread until [`application_shutdown`] is requested.
/// Intended for the main thread of a deployment after it has spawned its
/// tasks.
pub fn idle_loop() {
    let gate = &*SHUTDOWN;
    let mut requested = gate.requested.lock();
    while !*requested {
        gate.cvar.wait(&mut requested);
    }
}

/// Requests (or withdraws) application shutdown, releasing [`idle_loop`].
pub fn application_shutdown(request: bool) {
    let gate = &*SHUTDOWN;
    *gate.requested.lock() = request;
    if request {
        gate.cvar.notify_all();
    }
}
