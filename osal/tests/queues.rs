// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::thread;
use std::time::{Duration, Instant};

use osal::{Error, Timeout};

#[test]
fn fifo_byte_order() {
    osal::init().unwrap();
    let queue = osal::queue::create("q-fifo", 10, 4).unwrap();

    osal::queue::put(queue, &[0x11, 0x22, 0x33, 0x44]).unwrap();
    osal::queue::put(queue, &[0xAA, 0xBB]).unwrap();

    let mut buf = [0u8; 4];
    let copied = osal::queue::get(queue, &mut buf, Timeout::Poll).unwrap();
    assert_eq!(copied, 4);
    assert_eq!(buf, [0x11, 0x22, 0x33, 0x44]);

    let copied = osal::queue::get(queue, &mut buf, Timeout::Poll).unwrap();
    assert_eq!(copied, 2);
    assert_eq!(&buf[..2], &[0xAA, 0xBB]);

    osal::queue::delete(queue).unwrap();
}

#[test]
fn full_and_empty_polls() {
    osal::init().unwrap();
    let queue = osal::queue::create("q-bounds", 10, 4).unwrap();

    for i in 0..10u32 {
        osal::queue::put(queue, &i.to_be_bytes()).unwrap();
    }
    assert_eq!(
        osal::queue::put(queue, &[0; 4]).unwrap_err(),
        Error::QueueFull
    );

    let mut buf = [0u8; 4];
    for i in 0..10u32 {
        osal::queue::get(queue, &mut buf, Timeout::Poll).unwrap();
        assert_eq!(buf, i.to_be_bytes());
    }
    assert_eq!(
        osal::queue::get(queue, &mut buf, Timeout::Poll).unwrap_err(),
        Error::QueueEmpty
    );

    osal::queue::delete(queue).unwrap();
}

#[test]
fn timed_get_expires_then_succeeds() {
    osal::init().unwrap();
    let queue = osal::queue::create("q-timed", 4, 8).unwrap();

    let mut buf = [0u8; 8];
    let begin = Instant::now();
    assert_eq!(
        osal::queue::get(queue, &mut buf, Timeout::After(Duration::from_millis(80))).unwrap_err(),
        Error::Timeout
    );
    assert!(begin.elapsed() >= Duration::from_millis(80));

    let sender = thread::spawn(move || {
        thread::sleep(Duration::from_millis(40));
        osal::queue::put(queue, b"ping").unwrap();
    });
    let copied = osal::queue::get(queue, &mut buf, Timeout::After(Duration::from_secs(2))).unwrap();
    assert_eq!(&buf[..copied], b"ping");
    sender.join().unwrap();

    osal::queue::delete(queue).unwrap();
}

#[test]
fn size_validation() {
    osal::init().unwrap();
    assert_eq!(
        osal::queue::create("q-zero-depth", 0, 4).unwrap_err(),
        Error::QueueInvalidSize
    );
    assert_eq!(
        osal::queue::create("q-zero-item", 4, 0).unwrap_err(),
        Error::QueueInvalidSize
    );
    assert_eq!(
        osal::queue::create("q-too-deep", osal::queue::MAX_QUEUE_DEPTH + 1, 4).unwrap_err(),
        Error::QueueInvalidSize
    );

    let queue = osal::queue::create("q-sized", 4, 4).unwrap();
    // over-long message
    assert_eq!(
        osal::queue::put(queue, &[0; 5]).unwrap_err(),
        Error::QueueInvalidSize
    );
    // under-sized receive buffer
    let mut small = [0u8; 3];
    assert_eq!(
        osal::queue::get(queue, &mut small, Timeout::Poll).unwrap_err(),
        Error::QueueInvalidSize
    );
    osal::queue::delete(queue).unwrap();
}

#[test]
fn info_reports_geometry() {
    osal::init().unwrap();
    let queue = osal::queue::create("q-info", 6, 16).unwrap();
    let info = osal::queue::get_info(queue).unwrap();
    assert_eq!(info.name, "q-info");
    assert_eq!(info.depth, 6);
    assert_eq!(info.item_size, 16);
    osal::queue::delete(queue).unwrap();
}
