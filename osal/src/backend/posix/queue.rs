// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};

use crate::backend::QueueImpl;
use crate::error::{Error, Result};
use crate::time::Timeout;

/// A bounded byte-message queue over a crossbeam channel. The channel's
/// backpressure gives the full/empty semantics directly; messages are length
/// checked against `item_size` by the shared layer before they get here.
pub(crate) struct PosixQueue {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl QueueImpl for PosixQueue {
    fn create(depth: usize, _item_size: usize) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded(depth);
        Ok(Self { tx, rx })
    }

    fn send(&self, msg: &[u8]) -> Result<()> {
        self.tx.try_send(msg.to_vec()).map_err(|e| match e {
            TrySendError::Full(_) => Error::QueueFull,
            TrySendError::Disconnected(_) => Error::Error,
        })
    }

    fn recv(&self, buf: &mut [u8], timeout: Timeout) -> Result<usize> {
        let msg = match timeout {
            Timeout::Poll => self.rx.try_recv().map_err(|e| match e {
                TryRecvError::Empty => Error::QueueEmpty,
                TryRecvError::Disconnected => Error::Error,
            })?,
            Timeout::Forever => self.rx.recv().map_err(|_| Error::Error)?,
            Timeout::After(d) => self.rx.recv_timeout(d).map_err(|e| match e {
                RecvTimeoutError::Timeout => Error::Timeout,
                RecvTimeoutError::Disconnected => Error::Error,
            })?,
        };
        let len = msg.len();
        debug_assert!(len <= buf.len(), "shared layer sizes the receive buffer");
        buf[..len].copy_from_slice(&msg);
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    #[test]
    fn fifo_order() {
        let q = PosixQueue::create(4, 4).unwrap();
        q.send(&[1, 2, 3, 4]).unwrap();
        q.send(&[5, 6]).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(q.recv(&mut buf, Timeout::Poll).unwrap(), 4);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(q.recv(&mut buf, Timeout::Poll).unwrap(), 2);
        assert_eq!(&buf[..2], &[5, 6]);
    }

    #[test]
    fn full_and_empty() {
        let q = PosixQueue::create(2, 1).unwrap();
        q.send(&[0]).unwrap();
        q.send(&[1]).unwrap();
        assert_eq!(q.send(&[2]).unwrap_err(), Error::QueueFull);

        let mut buf = [0u8; 1];
        q.recv(&mut buf, Timeout::Poll).unwrap();
        q.recv(&mut buf, Timeout::Poll).unwrap();
        assert_eq!(
            q.recv(&mut buf, Timeout::Poll).unwrap_err(),
            Error::QueueEmpty
        );
    }

    #[test]
    fn timed_receive_expires() {
        let q = PosixQueue::create(1, 1).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(
            q.recv(&mut buf, Timeout::After(Duration::from_millis(30)))
                .unwrap_err(),
            Error::Timeout
        );
    }
}
