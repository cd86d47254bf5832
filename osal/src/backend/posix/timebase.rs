// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::time::Duration;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::backend::{ExternalSync, TickWait, TimeBaseImpl};
use crate::error::{Error, Result};

/// A tick source driven either by the monotonic clock (condvar deadline
/// waits against an absolute epoch, so the train does not drift) or by an
/// externally supplied blocking sync function.
pub(crate) struct PosixTimeBase {
    train: Mutex<Train>,
    cvar: Condvar,
    external: Option<ExternalSync>,
}

struct Train {
    epoch: Instant,
    first: Duration,
    interval: Duration,
    programmed: bool,
    /// Bumped on every (re)program so a parked waiter notices.
    seq: u64,
    waking: bool,
}

impl Train {
    /// Absolute deadline of 1-based tick `n`, or `None` past the end of a
    /// one-shot train.
    fn deadline(&self, n: u64) -> Option<Instant> {
        if !self.programmed || n == 0 {
            return None;
        }
        if self.interval.is_zero() && n > 1 {
            return None;
        }
        let steps = u32::try_from(n - 1).unwrap_or(u32::MAX);
        Some(self.epoch + self.first + self.interval.checked_mul(steps)?)
    }
}

impl TimeBaseImpl for PosixTimeBase {
    fn create(external: Option<ExternalSync>) -> Result<Self> {
        Ok(Self {
            train: Mutex::new(Train {
                epoch: Instant::now(),
                first: Duration::ZERO,
                interval: Duration::ZERO,
                programmed: false,
                seq: 0,
                waking: false,
            }),
            cvar: Condvar::new(),
            external,
        })
    }

    fn program(&self, start: Duration, interval: Duration) -> Result<()> {
        if start.is_zero() && interval.is_zero() {
            return Err(Error::TimerInvalidArgs);
        }
        let mut train = self.train.lock();
        train.epoch = Instant::now();
        train.first = if start.is_zero() { interval } else { start };
        train.interval = interval;
        train.programmed = true;
        train.seq += 1;
        drop(train);
        self.cvar.notify_all();
        Ok(())
    }

    fn tick_interval(&self) -> Duration {
        self.train.lock().interval
    }

    fn wait_for_tick(&self, target: u64) -> TickWait {
        if let Some(external) = &self.external {
            external();
            let mut train = self.train.lock();
            if train.waking {
                train.waking = false;
                return TickWait::Interrupted;
            }
            return TickWait::Tick(target.max(1));
        }

        let mut train = self.train.lock();
        let seq = train.seq;
        loop {
            if train.waking {
                train.waking = false;
                return TickWait::Interrupted;
            }
            if train.seq != seq {
                return TickWait::Interrupted;
            }
            match train.deadline(target) {
                None => self.cvar.wait(&mut train),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return TickWait::Tick(target);
                    }
                    let _ = self.cvar.wait_until(&mut train, deadline);
                }
            }
        }
    }

    fn wake(&self) {
        let mut train = self.train.lock();
        train.waking = true;
        drop(train);
        self.cvar.notify_all();
    }

    fn destroy(&self) -> Result<()> {
        self.wake();
        Ok(())
    }
}
