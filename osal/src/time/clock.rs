// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::time::Duration;

use crate::backend::{Backend, Platform};
use crate::error::Result;

/// A point in wall-clock time: seconds since the epoch plus a sub-second
/// nanosecond part in `0..1_000_000_000`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct OsTime {
    secs: i64,
    nanos: u32,
}

impl OsTime {
    #[must_use]
    pub fn new(secs: i64, nanos: u32) -> Self {
        let secs = secs + i64::from(nanos / 1_000_000_000);
        Self {
            secs,
            nanos: nanos % 1_000_000_000,
        }
    }

    #[must_use]
    pub fn secs(self) -> i64 {
        self.secs
    }

    #[must_use]
    pub fn subsec_nanos(self) -> u32 {
        self.nanos
    }

    #[must_use]
    pub fn subsec_micros(self) -> u32 {
        self.nanos / 1_000
    }

    /// The interval from `earlier` to `self`, or zero if `earlier` is later.
    #[must_use]
    pub fn since(self, earlier: Self) -> Duration {
        let a = i128::from(self.secs) * 1_000_000_000 + i128::from(self.nanos);
        let b = i128::from(earlier.secs) * 1_000_000_000 + i128::from(earlier.nanos);
        let delta = a.saturating_sub(b);
        if delta <= 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(u64::try_from(delta).unwrap_or(u64::MAX))
        }
    }
}

impl fmt::Debug for OsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}s", self.secs, self.nanos)
    }
}

/// Reads the platform's realtime clock.
///
/// # Errors
///
/// Propagates the back-end status when the clock cannot be read.
pub fn get_local_time() -> Result<OsTime> {
    Platform::clock_get()
}

/// Sets the platform's realtime clock. Typically requires elevated
/// privileges; fails with the back-end status otherwise.
///
/// # Errors
///
/// Propagates the back-end status when the clock cannot be set.
pub fn set_local_time(time: OsTime) -> Result<()> {
    Platform::clock_set(time)
}
