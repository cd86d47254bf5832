// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! An operating-system abstraction layer.
//!
//! Applications talk to kernel-level resources (tasks, message queues,
//! semaphores, mutexes, timers, files, loadable modules, a console) through
//! one stable, handle-based API; everything platform-specific sits behind a
//! back-end trait seam selected at compile time. The interesting machinery
//! is shared by every resource class:
//!
//! - a generation-counted handle table per class ([`handle_table`]), so a
//!   stale [`ObjectId`] is a detectable error instead of memory unsafety;
//! - a token protocol that serialises create/delete against concurrent
//!   operations without holding any table lock across a back-end call;
//! - a time-base engine ([`time::timebase`]) multiplexing many application
//!   timers onto one tick source with drift-free absolute deadlines;
//! - a console ring ([`console`]) decoupling producers from the single
//!   thread that owns the platform descriptor;
//! - a portable I/O seam ([`file`], [`select`]) with uniform blocking,
//!   polled, and timed semantics.
//!
//! Call [`init`] once at startup and [`teardown`] on the way out; both are
//! idempotent. Every other entry point is safe to call from any thread.
//!
//! ```no_run
//! osal::init().unwrap();
//! let sem = osal::binsem::create("wakeup", false).unwrap();
//! osal::binsem::give(sem).unwrap();
//! osal::binsem::take(sem).unwrap();
//! osal::teardown().unwrap();
//! ```

mod backend;
mod error;
mod id;
mod state;

pub mod binsem;
pub mod config;
pub mod console;
pub mod countsem;
pub mod dir;
pub mod file;
pub mod heap;
pub mod module;
pub mod mutex;
pub mod queue;
pub mod rwlock;
pub mod select;
pub mod task;
pub mod time;

pub use error::{
    ALL_ERRORS, Error, Result, StatusString, exit_code, get_error_name, status_of,
    status_to_string,
};
pub use id::{ObjectId, ObjectType};
pub use state::{application_shutdown, idle_loop, init, teardown};
pub use time::Timeout;
