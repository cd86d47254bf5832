// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Blocking semantics of the semaphore, mutex, and rwlock classes.

use std::thread;
use std::time::{Duration, Instant};

use osal::Error;

#[test]
fn binsem_timed_wait_times_out() {
    osal::init().unwrap();
    let sem = osal::binsem::create("sync-bs-timeout", false).unwrap();

    let begin = Instant::now();
    assert_eq!(
        osal::binsem::timed_wait(sem, Duration::from_millis(100)).unwrap_err(),
        Error::Timeout
    );
    let elapsed = begin.elapsed();
    assert!(elapsed >= Duration::from_millis(100), "returned after {elapsed:?}");

    osal::binsem::delete(sem).unwrap();
}

#[test]
fn binsem_give_wakes_a_blocked_taker() {
    osal::init().unwrap();
    let sem = osal::binsem::create("sync-bs-wake", false).unwrap();

    let taker = thread::spawn(move || osal::binsem::take(sem));
    thread::sleep(Duration::from_millis(50));
    assert!(!taker.is_finished());

    osal::binsem::give(sem).unwrap();
    taker.join().unwrap().unwrap();
    osal::binsem::delete(sem).unwrap();
}

#[test]
fn binsem_flush_then_delete() {
    osal::init().unwrap();
    let sem = osal::binsem::create("sync-bs-flush", false).unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| thread::spawn(move || osal::binsem::take(sem)))
        .collect();
    thread::sleep(Duration::from_millis(50));

    osal::binsem::flush(sem).unwrap();
    for waiter in waiters {
        waiter.join().unwrap().unwrap();
    }
    // with the waiters drained, deletion completes
    osal::binsem::delete(sem).unwrap();
}

#[test]
fn countsem_initial_value_cap() {
    osal::init().unwrap();
    assert_eq!(
        osal::countsem::create("sync-cs-cap", osal::config::MAX_SEM_VALUE + 1).unwrap_err(),
        Error::InvalidSemValue
    );
}

#[test]
fn countsem_counts_and_times_out() {
    osal::init().unwrap();
    let sem = osal::countsem::create("sync-cs-count", 3).unwrap();

    for _ in 0..3 {
        osal::countsem::take(sem).unwrap();
    }
    assert_eq!(
        osal::countsem::timed_wait(sem, Duration::from_millis(50)).unwrap_err(),
        Error::Timeout
    );

    osal::countsem::give(sem).unwrap();
    osal::countsem::take(sem).unwrap();
    osal::countsem::delete(sem).unwrap();
}

#[test]
fn countsem_value_reported() {
    osal::init().unwrap();
    let sem = osal::countsem::create("sync-cs-value", 2).unwrap();
    assert_eq!(osal::countsem::get_info(sem).unwrap().value, 2);
    osal::countsem::take(sem).unwrap();
    assert_eq!(osal::countsem::get_info(sem).unwrap().value, 1);
    osal::countsem::delete(sem).unwrap();
}

#[test]
fn mutex_excludes_and_checks_ownership() {
    osal::init().unwrap();
    let mutex = osal::mutex::create("sync-mx").unwrap();

    // giving an unheld mutex is an error
    assert_eq!(osal::mutex::give(mutex).unwrap_err(), Error::Error);

    osal::mutex::take(mutex).unwrap();

    // another thread cannot give what it does not own, and blocks on take
    let contender = thread::spawn(move || {
        assert_eq!(osal::mutex::give(mutex).unwrap_err(), Error::Error);
        osal::mutex::take(mutex).unwrap();
        osal::mutex::give(mutex).unwrap();
    });
    thread::sleep(Duration::from_millis(50));
    assert!(!contender.is_finished());

    osal::mutex::give(mutex).unwrap();
    contender.join().unwrap();
    osal::mutex::delete(mutex).unwrap();
}

#[test]
fn rwlock_readers_block_writer() {
    osal::init().unwrap();
    let lock = osal::rwlock::create("sync-rw").unwrap();

    osal::rwlock::read_take(lock).unwrap();
    osal::rwlock::read_take(lock).unwrap();

    let writer = thread::spawn(move || {
        osal::rwlock::write_take(lock).unwrap();
        osal::rwlock::write_give(lock).unwrap();
    });
    thread::sleep(Duration::from_millis(50));
    assert!(!writer.is_finished());

    osal::rwlock::read_give(lock).unwrap();
    osal::rwlock::read_give(lock).unwrap();
    writer.join().unwrap();

    osal::rwlock::delete(lock).unwrap();
}
