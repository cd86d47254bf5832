// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Blocking primitives built on parking_lot mutexes and condvars.
//!
//! These carry handle semantics rather than guard semantics: take and give
//! are separate calls that may come from different stack frames, waiters are
//! flushable, and ownership violations are detected and reported instead of
//! being undefined behaviour.

use std::thread::{self, ThreadId};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::backend::{BinSemImpl, CountSemImpl, MutexImpl, RwLockImpl};
use crate::config::MAX_SEM_VALUE;
use crate::error::{Error, Result};
use crate::time::Timeout;

pub(crate) struct PosixBinSem {
    state: Mutex<BinState>,
    cvar: Condvar,
}

struct BinState {
    available: bool,
    /// Bumped by `flush`; waiters that observe a bump return success without
    /// consuming the semaphore.
    flush_epoch: u64,
}

impl BinSemImpl for PosixBinSem {
    fn create(initial: bool) -> Result<Self> {
        Ok(Self {
            state: Mutex::new(BinState {
                available: initial,
                flush_epoch: 0,
            }),
            cvar: Condvar::new(),
        })
    }

    fn take(&self, timeout: Timeout) -> Result<()> {
        let mut state = self.state.lock();
        if state.available {
            state.available = false;
            return Ok(());
        }

        let deadline = match timeout {
            Timeout::Poll => return Err(Error::Timeout),
            Timeout::Forever => None,
            Timeout::After(d) => Some(Instant::now() + d),
        };

        let epoch = state.flush_epoch;
        loop {
            match deadline {
                None => self.cvar.wait(&mut state),
                Some(deadline) => {
                    if self.cvar.wait_until(&mut state, deadline).timed_out() {
                        return Err(Error::Timeout);
                    }
                }
            }
            if state.flush_epoch != epoch {
                return Ok(());
            }
            if state.available {
                state.available = false;
                return Ok(());
            }
        }
    }

    fn give(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.available = true;
        drop(state);
        self.cvar.notify_one();
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.flush_epoch += 1;
        drop(state);
        self.cvar.notify_all();
        Ok(())
    }

    fn value(&self) -> i32 {
        i32::from(self.state.lock().available)
    }
}

pub(crate) struct PosixCountSem {
    value: Mutex<u32>,
    cvar: Condvar,
}

impl CountSemImpl for PosixCountSem {
    fn create(initial: u32) -> Result<Self> {
        Ok(Self {
            value: Mutex::new(initial),
            cvar: Condvar::new(),
        })
    }

    fn take(&self, timeout: Timeout) -> Result<()> {
        let mut value = self.value.lock();
        if *value > 0 {
            *value -= 1;
            return Ok(());
        }

        let deadline = match timeout {
            Timeout::Poll => return Err(Error::Timeout),
            Timeout::Forever => None,
            Timeout::After(d) => Some(Instant::now() + d),
        };

        loop {
            match deadline {
                None => self.cvar.wait(&mut value),
                Some(deadline) => {
                    if self.cvar.wait_until(&mut value, deadline).timed_out() {
                        return Err(Error::Timeout);
                    }
                }
            }
            if *value > 0 {
                *value -= 1;
                return Ok(());
            }
        }
    }

    fn give(&self) -> Result<()> {
        let mut value = self.value.lock();
        if *value >= MAX_SEM_VALUE {
            return Err(Error::InvalidSemValue);
        }
        *value += 1;
        drop(value);
        self.cvar.notify_one();
        Ok(())
    }

    fn value(&self) -> i32 {
        i32::try_from(*self.value.lock()).unwrap_or(i32::MAX)
    }
}

pub(crate) struct PosixMutex {
    owner: Mutex<Option<ThreadId>>,
    cvar: Condvar,
}

impl MutexImpl for PosixMutex {
    fn create() -> Result<Self> {
        Ok(Self {
            owner: Mutex::new(None),
            cvar: Condvar::new(),
        })
    }

    fn take(&self) -> Result<()> {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        if *owner == Some(me) {
            // non-recursive; relocking would deadlock
            return Err(Error::Error);
        }
        while owner.is_some() {
            self.cvar.wait(&mut owner);
        }
        *owner = Some(me);
        Ok(())
    }

    fn give(&self) -> Result<()> {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        if *owner != Some(me) {
            return Err(Error::Error);
        }
        *owner = None;
        drop(owner);
        self.cvar.notify_one();
        Ok(())
    }
}

pub(crate) struct PosixRwLock {
    state: Mutex<RwState>,
    cvar: Condvar,
}

struct RwState {
    readers: u32,
    writer: Option<ThreadId>,
}

impl RwLockImpl for PosixRwLock {
    fn create() -> Result<Self> {
        Ok(Self {
            state: Mutex::new(RwState {
                readers: 0,
                writer: None,
            }),
            cvar: Condvar::new(),
        })
    }

    fn read_take(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.writer == Some(thread::current().id()) {
            return Err(Error::Error);
        }
        while state.writer.is_some() {
            self.cvar.wait(&mut state);
        }
        state.readers += 1;
        Ok(())
    }

    fn read_give(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.readers == 0 {
            return Err(Error::Error);
        }
        state.readers -= 1;
        if state.readers == 0 {
            drop(state);
            self.cvar.notify_all();
        }
        Ok(())
    }

    fn write_take(&self) -> Result<()> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.writer == Some(me) {
            return Err(Error::Error);
        }
        while state.writer.is_some() || state.readers > 0 {
            self.cvar.wait(&mut state);
        }
        state.writer = Some(me);
        Ok(())
    }

    fn write_give(&self) -> Result<()> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.writer != Some(me) {
            return Err(Error::Error);
        }
        state.writer = None;
        drop(state);
        self.cvar.notify_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use std::sync::Arc;

    #[test]
    fn binsem_give_then_take() {
        let sem = PosixBinSem::create(false).unwrap();
        sem.give().unwrap();
        sem.take(Timeout::Forever).unwrap();
        assert_eq!(sem.take(Timeout::Poll).unwrap_err(), Error::Timeout);
    }

    #[test]
    fn binsem_timed_wait_expires() {
        let sem = PosixBinSem::create(false).unwrap();
        let begin = Instant::now();
        let err = sem
            .take(Timeout::After(Duration::from_millis(50)))
            .unwrap_err();
        assert_eq!(err, Error::Timeout);
        assert!(begin.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn binsem_flush_releases_all_waiters() {
        let sem = Arc::new(PosixBinSem::create(false).unwrap());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let sem = Arc::clone(&sem);
                thread::spawn(move || sem.take(Timeout::Forever))
            })
            .collect();
        thread::sleep(Duration::from_millis(50));
        sem.flush().unwrap();
        for w in waiters {
            w.join().unwrap().unwrap();
        }
        // flush released the waiters without making the semaphore available
        assert_eq!(sem.value(), 0);
    }

    #[test]
    fn countsem_cap_enforced() {
        let sem = PosixCountSem::create(MAX_SEM_VALUE).unwrap();
        assert_eq!(sem.give().unwrap_err(), Error::InvalidSemValue);
    }

    #[test]
    fn countsem_counts_down() {
        let sem = PosixCountSem::create(3).unwrap();
        for _ in 0..3 {
            sem.take(Timeout::Forever).unwrap();
        }
        assert_eq!(
            sem.take(Timeout::After(Duration::from_millis(20)))
                .unwrap_err(),
            Error::Timeout
        );
    }

    #[test]
    fn mutex_ownership_checked() {
        let m = Arc::new(PosixMutex::create().unwrap());
        assert_eq!(m.give().unwrap_err(), Error::Error);
        m.take().unwrap();
        assert_eq!(m.take().unwrap_err(), Error::Error);

        let m2 = Arc::clone(&m);
        let other = thread::spawn(move || m2.give().unwrap_err());
        assert_eq!(other.join().unwrap(), Error::Error);

        m.give().unwrap();
    }

    #[test]
    fn rwlock_excludes_writers_while_read_held() {
        let rw = Arc::new(PosixRwLock::create().unwrap());
        rw.read_take().unwrap();
        rw.read_take().unwrap();

        let rw2 = Arc::clone(&rw);
        let writer = thread::spawn(move || {
            rw2.write_take().unwrap();
            rw2.write_give().unwrap();
        });
        thread::sleep(Duration::from_millis(30));
        assert!(!writer.is_finished());

        rw.read_give().unwrap();
        rw.read_give().unwrap();
        writer.join().unwrap();
    }
}
