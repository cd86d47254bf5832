// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The console: a byte ring between any number of producers and one drain
//! thread that owns the platform descriptor.
//!
//! Producers enqueue under a short lock and never block on the descriptor;
//! when the ring is full, bytes are dropped and counted rather than stalling
//! the producer. Bytes from one producer stay in order, but bytes from
//! different producers interleave at byte granularity: callers that need an
//! atomic line format it into a single [`printf!`](crate::printf) call.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::backend::{Backend, Platform};
use crate::config::CONSOLE_BUFFER_SIZE;

struct Ring {
    buf: Box<[u8]>,
    rd: usize,
    wr: usize,
    dropped: u64,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity].into_boxed_slice(),
            rd: 0,
            wr: 0,
            dropped: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.rd == self.wr
    }

    /// One slot is kept open to distinguish full from empty.
    fn push(&mut self, byte: u8) -> bool {
        let next = (self.wr + 1) % self.buf.len();
        if next == self.rd {
            self.dropped += 1;
            return false;
        }
        self.buf[self.wr] = byte;
        self.wr = next;
        true
    }

    fn pop_chunk(&mut self, out: &mut [u8]) -> usize {
        let mut n = 0;
        while n < out.len() && self.rd != self.wr {
            out[n] = self.buf[self.rd];
            self.rd = (self.rd + 1) % self.buf.len();
            n += 1;
        }
        n
    }
}

struct Console {
    ring: Mutex<Ring>,
    data: Condvar,
    enabled: AtomicBool,
    running: AtomicBool,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl Console {
    fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring::new(capacity)),
            data: Condvar::new(),
            enabled: AtomicBool::new(true),
            running: AtomicBool::new(false),
            drain: Mutex::new(None),
        }
    }

    fn enqueue(&self, bytes: &[u8]) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        let mut ring = self.ring.lock();
        let mut any = false;
        for &b in bytes {
            any |= ring.push(b);
        }
        let dropped = ring.dropped;
        drop(ring);
        if any {
            self.data.notify_one();
        }
        if dropped > 0 {
            tracing::trace!(dropped, "console ring overflowed");
        }
    }

    fn drain_loop(&self) {
        let mut chunk = [0u8; 512];
        loop {
            let n = {
                let mut ring = self.ring.lock();
                while ring.is_empty() && self.running.load(Ordering::Acquire) {
                    self.data.wait(&mut ring);
                }
                if ring.is_empty() {
                    // told to stop and nothing left to flush
                    return;
                }
                ring.pop_chunk(&mut chunk)
            };

            let mut off = 0;
            while off < n {
                match Platform::console_write(&chunk[off..n]) {
                    Ok(0) => break,
                    Ok(written) => off += written,
                    Err(err) => {
                        tracing::warn!(%err, "console write failed; dropping chunk");
                        break;
                    }
                }
            }
        }
    }
}

static CONSOLE: std::sync::LazyLock<Console> =
    std::sync::LazyLock::new(|| Console::new(CONSOLE_BUFFER_SIZE));

/// Starts the drain thread. Called from layer init.
pub(crate) fn start() {
    let console = &*CONSOLE;
    let mut drain = console.drain.lock();
    if drain.is_some() {
        return;
    }
    console.running.store(true, Ordering::Release);
    let handle = std::thread::Builder::new()
        .name("console-drain".into())
        .spawn(|| CONSOLE.drain_loop())
        .expect("console drain thread spawn");
    *drain = Some(handle);
}

/// Flushes the ring and joins the drain thread. Called from layer teardown.
pub(crate) fn stop() {
    let console = &*CONSOLE;
    let handle = {
        let mut drain = console.drain.lock();
        console.running.store(false, Ordering::Release);
        drain.take()
    };
    console.data.notify_all();
    if let Some(handle) = handle {
        let _ = handle.join();
    }
}

/// Re-enables console output for all producers.
pub fn printf_enable() {
    CONSOLE.enabled.store(true, Ordering::Relaxed);
}

/// Makes producers silently discard output until re-enabled.
pub fn printf_disable() {
    CONSOLE.enabled.store(false, Ordering::Relaxed);
}

/// Enqueues formatted text for the drain thread. Usually invoked through
/// [`printf!`](crate::printf).
pub fn write_fmt(args: fmt::Arguments<'_>) {
    if !CONSOLE.enabled.load(Ordering::Relaxed) {
        return;
    }
    let text = args.to_string();
    CONSOLE.enqueue(text.as_bytes());
}

/// Formats a message into the console ring.
///
/// The whole invocation is one enqueue, so its bytes never interleave with
/// other producers.
#[macro_export]
macro_rules! printf {
    ($($arg:tt)*) => {
        $crate::console::write_fmt(core::format_args!($($arg)*))
    };
}
