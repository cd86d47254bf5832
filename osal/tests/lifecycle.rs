// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Init/teardown lifecycle. Kept as one sequential test because teardown
//! sweeps the whole process state.

use std::thread;
use std::time::Duration;

use osal::Error;

#[test]
fn lifecycle_round_trip() {
    // init is idempotent
    osal::init().unwrap();
    osal::init().unwrap();

    let sem = osal::binsem::create("life-sem", false).unwrap();
    let queue = osal::queue::create("life-queue", 4, 4).unwrap();
    let (timer, _) = osal::time::timer::create("life-timer", |_| {}).unwrap();

    // teardown deletes everything that is left, timers before their bases
    osal::teardown().unwrap();
    assert_eq!(osal::binsem::take(sem).unwrap_err(), Error::InvalidId);
    assert_eq!(
        osal::queue::get(queue, &mut [0u8; 4], osal::Timeout::Poll).unwrap_err(),
        Error::InvalidId
    );
    assert_eq!(
        osal::time::timer::get_info(timer).unwrap_err(),
        Error::InvalidId
    );

    // the layer comes back up cleanly, and old names are free again
    osal::init().unwrap();
    let sem = osal::binsem::create("life-sem", false).unwrap();
    osal::binsem::delete(sem).unwrap();

    // idle_loop parks until a shutdown request arrives
    osal::application_shutdown(false);
    let main_loop = thread::spawn(|| {
        osal::idle_loop();
    });
    thread::sleep(Duration::from_millis(50));
    assert!(!main_loop.is_finished());
    osal::application_shutdown(true);
    main_loop.join().unwrap();
    osal::application_shutdown(false);

    osal::teardown().unwrap();
}

#[test]
fn exit_codes_for_process_wrappers() {
    assert_eq!(osal::exit_code(0), 0);
    assert_eq!(osal::exit_code(Error::Error.code()), 1);
    assert_eq!(
        osal::exit_code(Error::QueueFull.code()),
        Error::QueueFull.code() & 0x7F
    );
}
