// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Compile-time deployment limits.
//!
//! These constants size every resource table and bound every name and path.
//! There is no runtime configuration; a deployment that needs different
//! limits rebuilds with different values.

use static_assertions::const_assert;

/// Maximum number of concurrently existing objects, per resource type.
pub const MAX_TASKS: usize = 64;
pub const MAX_QUEUES: usize = 64;
pub const MAX_BIN_SEMS: usize = 64;
pub const MAX_COUNT_SEMS: usize = 64;
pub const MAX_MUTEXES: usize = 64;
pub const MAX_RWLOCKS: usize = 16;
pub const MAX_TIMEBASES: usize = 16;
pub const MAX_TIMERS: usize = 32;
pub const MAX_FILES: usize = 64;
pub const MAX_DIRS: usize = 16;
pub const MAX_MODULES: usize = 16;

/// Longest accepted object name, in bytes.
pub const MAX_NAME_LEN: usize = 20;

/// Longest accepted filesystem path, in bytes.
pub const MAX_PATH_LEN: usize = 255;

/// Longest symbol name representable in a symbol table dump record.
pub const MAX_SYM_LEN: usize = 64;

/// Size of the console ring buffer, in bytes.
pub const CONSOLE_BUFFER_SIZE: usize = 4096;

/// Nominal scheduling resolution reported for a dedicated timer time base
/// before its first tick train is programmed, in microseconds.
pub const CLOCK_ACCURACY_US: u32 = 1000;

/// Upper bound for counting semaphore values; `create` and `give` beyond it
/// fail with `InvalidSemValue`.
pub const MAX_SEM_VALUE: u32 = i32::MAX as u32;

/// Task priorities. Lower numeric value means more urgent.
pub const MAX_PRIORITY: u8 = 255;

/// Smallest accepted task stack size, in bytes.
pub const MIN_STACK_SIZE: usize = 4096;

// Slot indices must fit the 8-bit index field of an object id, with the top
// index value reserved for the system sentinel.
const_assert!(MAX_TASKS < 255);
const_assert!(MAX_QUEUES < 255);
const_assert!(MAX_BIN_SEMS < 255);
const_assert!(MAX_COUNT_SEMS < 255);
const_assert!(MAX_MUTEXES < 255);
const_assert!(MAX_RWLOCKS < 255);
const_assert!(MAX_TIMEBASES < 255);
const_assert!(MAX_TIMERS < 255);
const_assert!(MAX_FILES < 255);
const_assert!(MAX_DIRS < 255);
const_assert!(MAX_MODULES < 255);
const_assert!(MAX_NAME_LEN > 0);
const_assert!(CONSOLE_BUFFER_SIZE >= 256);
// readiness masks are 64-bit
const_assert!(MAX_FILES <= 64);
