// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The back-end seam.
//!
//! The shared layer owns tables, tokens, dispatch threads, and validation;
//! everything platform-specific sits behind the traits in this module. One
//! implementation per resource class is selected at compile time through the
//! [`Backend`] trait's associated types, and the shared layer passes payload
//! references obtained through the token protocol; it never reaches into
//! back-end data.
//!
//! Operations a platform cannot provide are stubs-as-data: the [`Backend`]
//! trait's default method bodies (select, heap statistics, symbol
//! enumeration) report [`Error::NotImplemented`], which the shared layer
//! propagates as-is; a platform opts into a capability by overriding the
//! default.

use core::time::Duration;

use crate::error::{Error, Result};
use crate::file::{AccessMode, FileStat, OpenFlags, SeekBase};
use crate::heap::HeapInfo;
use crate::module::ModuleFlags;
use crate::select::SelectFlags;
use crate::time::{OsTime, Timeout};

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        pub(crate) mod posix;
        pub(crate) use posix::Posix as Platform;
    } else {
        compile_error!("no platform back-end for this target");
    }
}

/// A task's body, handed to the platform spawn primitive.
pub(crate) type TaskBody = Box<dyn FnOnce() + Send + 'static>;

/// Blocks the calling thread until the next externally-driven tick.
pub(crate) type ExternalSync = Box<dyn Fn() + Send + Sync + 'static>;

/// Outcome of waiting on a time-base tick source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickWait {
    /// The awaited tick arrived; the train is now at this tick number.
    Tick(u64),
    /// The source was woken early (reprogrammed or shutting down).
    Interrupted,
}

pub(crate) trait TaskImpl: Send + Sync + Sized + 'static {
    /// Spawns the platform thread executing `body`. Priority application is
    /// best-effort where the host denies realtime scheduling.
    fn spawn(name: &str, stack_size: usize, priority: u8, body: TaskBody) -> Result<Self>;
    fn set_priority(&self, priority: u8) -> Result<()>;
    /// Severs the record from the platform thread on delete-from-outside;
    /// the thread itself winds down on its own.
    fn detach(&self) -> Result<()>;
}

pub(crate) trait QueueImpl: Send + Sync + Sized + 'static {
    fn create(depth: usize, item_size: usize) -> Result<Self>;
    /// Non-blocking enqueue; `QueueFull` when the queue is at depth.
    fn send(&self, msg: &[u8]) -> Result<()>;
    /// `QueueEmpty` when empty and not waiting, `Timeout` on expiry.
    /// Returns the received message length.
    fn recv(&self, buf: &mut [u8], timeout: Timeout) -> Result<usize>;
    fn destroy(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) trait BinSemImpl: Send + Sync + Sized + 'static {
    fn create(initial: bool) -> Result<Self>;
    fn take(&self, timeout: Timeout) -> Result<()>;
    fn give(&self) -> Result<()>;
    /// Releases every waiter without making the semaphore available.
    fn flush(&self) -> Result<()>;
    /// Current value for info queries: 0 or 1.
    fn value(&self) -> i32;
    fn destroy(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) trait CountSemImpl: Send + Sync + Sized + 'static {
    fn create(initial: u32) -> Result<Self>;
    fn take(&self, timeout: Timeout) -> Result<()>;
    /// `InvalidSemValue` past the configured cap.
    fn give(&self) -> Result<()>;
    fn value(&self) -> i32;
    fn destroy(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) trait MutexImpl: Send + Sync + Sized + 'static {
    fn create() -> Result<Self>;
    fn take(&self) -> Result<()>;
    /// `Error` when the caller is not the current owner.
    fn give(&self) -> Result<()>;
    fn destroy(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) trait RwLockImpl: Send + Sync + Sized + 'static {
    fn create() -> Result<Self>;
    fn read_take(&self) -> Result<()>;
    fn read_give(&self) -> Result<()>;
    fn write_take(&self) -> Result<()>;
    fn write_give(&self) -> Result<()>;
    fn destroy(&self) -> Result<()> {
        Ok(())
    }
}

/// One platform tick source. The shared layer owns the dispatch thread and
/// the timer bookkeeping; the source only knows how to produce ticks.
pub(crate) trait TimeBaseImpl: Send + Sync + Sized + 'static {
    fn create(external: Option<ExternalSync>) -> Result<Self>;
    /// (Re)programs the tick train: first tick after `start`, subsequent
    /// ticks every `interval`. Restarts tick numbering from zero.
    fn program(&self, start: Duration, interval: Duration) -> Result<()>;
    /// The quantum actually in effect after rounding, i.e. the accuracy.
    fn tick_interval(&self) -> Duration;
    /// Blocks until the train reaches tick `target` (1-based since the last
    /// `program`). `target == 0` parks until woken.
    fn wait_for_tick(&self, target: u64) -> TickWait;
    /// Forces a pending or future `wait_for_tick` to return `Interrupted`.
    fn wake(&self);
    fn destroy(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) trait FileImpl: Send + Sync + Sized + 'static {
    fn open(path: &str, flags: OpenFlags, access: AccessMode) -> Result<Self>;
    /// Blocking read; retries `Interrupted` internally.
    fn read(&self, buf: &mut [u8]) -> Result<usize>;
    /// Blocking write of as much as the descriptor accepts in one call.
    fn write(&self, buf: &[u8]) -> Result<usize>;
    fn seek(&self, offset: i64, whence: SeekBase) -> Result<u64>;
    /// Whether the descriptor supports readiness waits (pipes, ttys,
    /// sockets) as opposed to always-ready regular files.
    fn selectable(&self) -> bool;
    fn destroy(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) trait DirImpl: Send + Sync + Sized + 'static {
    fn open(path: &str) -> Result<Self>;
    /// Next entry name, or `None` at the end of the directory.
    fn next(&self) -> Result<Option<String>>;
    fn rewind(&self) -> Result<()>;
    fn destroy(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) trait ModuleImpl: Send + Sync + Sized + 'static {
    fn load(path: &str, flags: ModuleFlags) -> Result<Self>;
    fn symbol(&self, name: &str) -> Result<usize>;
    fn unload(&self) -> Result<()>;
}

/// The platform selection: one implementation type per resource class plus
/// the process-wide operations that are not tied to a record.
pub(crate) trait Backend: 'static {
    type Task: TaskImpl;
    type Queue: QueueImpl;
    type BinSem: BinSemImpl;
    type CountSem: CountSemImpl;
    type Mutex: MutexImpl;
    type RwLock: RwLockImpl;
    type TimeBase: TimeBaseImpl;
    type File: FileImpl;
    type Dir: DirImpl;
    type Module: ModuleImpl;

    /// Extra status codes this back-end can surface, for the reverse name
    /// lookup.
    const ERROR_NAMES: &'static [(i32, &'static str)] = &[];

    fn clock_get() -> Result<OsTime>;
    fn clock_set(time: OsTime) -> Result<()>;

    fn task_delay(duration: Duration);

    /// Best-effort promotion of a time-base dispatch thread above
    /// application task priority.
    fn promote_dispatcher(_handle: &std::thread::JoinHandle<()>) {}

    /// Single blocking write of console bytes to the platform descriptor;
    /// may be short. Retries `Interrupted` internally.
    fn console_write(bytes: &[u8]) -> Result<usize>;

    fn fs_stat(path: &str) -> Result<FileStat>;
    fn fs_remove(path: &str) -> Result<()>;
    fn fs_rename(old: &str, new: &str) -> Result<()>;
    fn fs_chmod(path: &str, access: AccessMode) -> Result<()>;
    fn fs_mkdir(path: &str) -> Result<()>;
    fn fs_rmdir(path: &str) -> Result<()>;

    fn select_single(
        _file: &Self::File,
        _flags: SelectFlags,
        _timeout: Timeout,
    ) -> Result<SelectFlags> {
        Err(Error::NotImplemented)
    }

    /// Multi-descriptor readiness wait. Returns position bitmasks over the
    /// two input slices.
    fn select_multiple(
        _read: &[&Self::File],
        _write: &[&Self::File],
        _timeout: Timeout,
    ) -> Result<(u64, u64)> {
        Err(Error::NotImplemented)
    }

    fn global_symbol_lookup(_name: &str) -> Result<usize> {
        Err(Error::NotImplemented)
    }

    /// Enumerates the global symbol table into a fixed-record dump file via
    /// [`crate::module::SymbolDumpWriter`]. Platforms without symbol
    /// enumeration leave the default in place and never touch the filesystem.
    fn symbol_table_dump(_path: &str, _size_limit: u64) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn heap_info() -> Result<HeapInfo> {
        Err(Error::NotImplemented)
    }
}

/// Reverse name lookup over the platform's extension table.
pub(crate) fn platform_error_name(status: i32) -> Option<&'static str> {
    Platform::ERROR_NAMES
        .iter()
        .find(|(code, _)| *code == status)
        .map(|(_, name)| *name)
}
