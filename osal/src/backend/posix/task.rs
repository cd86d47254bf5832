// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;
use std::os::unix::thread::JoinHandleExt;
use std::thread::{Builder, JoinHandle};

use parking_lot::Mutex;

use crate::backend::{TaskBody, TaskImpl};
use crate::config::MIN_STACK_SIZE;
use crate::error::{Error, Result};

pub(crate) struct PosixTask {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskImpl for PosixTask {
    fn spawn(name: &str, stack_size: usize, priority: u8, body: TaskBody) -> Result<Self> {
        let handle = Builder::new()
            .name(name.to_owned())
            .stack_size(stack_size.max(MIN_STACK_SIZE))
            .spawn(body)
            .map_err(|err| {
                tracing::warn!(%err, name, "thread spawn failed");
                Error::Error
            })?;

        apply_priority(&handle, priority);

        Ok(Self {
            handle: Mutex::new(Some(handle)),
        })
    }

    fn set_priority(&self, priority: u8) -> Result<()> {
        let handle = self.handle.lock();
        if let Some(handle) = handle.as_ref() {
            apply_priority(handle, priority);
        }
        Ok(())
    }

    fn detach(&self) -> Result<()> {
        // dropping the join handle detaches the platform thread
        drop(self.handle.lock().take());
        Ok(())
    }
}

/// Maps the abstract 0 (most urgent) ..= 255 (least urgent) range onto the
/// host's round-robin scheduler range. Hosts routinely refuse realtime
/// scheduling for unprivileged processes; that refusal is logged and
/// otherwise ignored, matching the priority-is-advisory contract.
pub(crate) fn apply_priority(handle: &JoinHandle<()>, priority: u8) {
    // Safety: querying scheduler limits has no preconditions
    let min = unsafe { libc::sched_get_priority_min(libc::SCHED_RR) };
    // Safety: as above
    let max = unsafe { libc::sched_get_priority_max(libc::SCHED_RR) };
    if min < 0 || max < min {
        return;
    }

    let span = max - min;
    let host_priority = max - (i32::from(priority) * span) / 255;
    let param = libc::sched_param {
        sched_priority: host_priority,
    };

    // Safety: the pthread_t is valid while we hold the join handle; param is
    // a valid sched_param for the duration of the call
    let rc = unsafe {
        libc::pthread_setschedparam(handle.as_pthread_t(), libc::SCHED_RR, &raw const param)
    };
    if rc != 0 {
        tracing::debug!(
            errno = ?io::Error::from_raw_os_error(rc),
            priority,
            "priority not applied"
        );
    }
}
