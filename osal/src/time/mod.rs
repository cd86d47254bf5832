// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Wall-clock time, time bases, and application timers.

mod clock;
pub mod timebase;
pub mod timer;

use core::time::Duration;

pub use clock::{OsTime, get_local_time, set_local_time};

/// How long a potentially blocking operation may wait.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Timeout {
    /// Fail immediately instead of blocking.
    Poll,
    /// Block until the operation can complete.
    Forever,
    /// Block for at most this long.
    After(Duration),
}

impl Timeout {
    /// Conventional millisecond encoding: negative waits forever, zero polls.
    #[must_use]
    pub fn from_millis(ms: i32) -> Self {
        match ms {
            ..=-1 => Self::Forever,
            0 => Self::Poll,
            ms => Self::After(Duration::from_millis(u64::try_from(ms).unwrap_or(0))),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() { Self::Poll } else { Self::After(d) }
    }
}
