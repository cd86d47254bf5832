// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Table exhaustion and slot reuse. Runs alone in this binary because it
//! fills a whole table.

use osal::{Error, config};

#[test]
fn exhaustion_then_reuse_with_fresh_generation() {
    osal::init().unwrap();

    let mut ids = Vec::new();
    for i in 0..config::MAX_MUTEXES {
        ids.push(osal::mutex::create(&format!("cap-{i}")).unwrap());
    }
    assert_eq!(
        osal::mutex::create("cap-one-more").unwrap_err(),
        Error::NoFreeIds
    );

    // free one slot; the next create succeeds and must not alias the old id
    let victim = ids[3];
    osal::mutex::delete(victim).unwrap();
    let replacement = osal::mutex::create("cap-replacement").unwrap();
    assert_ne!(victim, replacement);
    assert_eq!(osal::mutex::take(victim).unwrap_err(), Error::InvalidId);
    osal::mutex::take(replacement).unwrap();
    osal::mutex::give(replacement).unwrap();

    for id in ids {
        if id != victim {
            osal::mutex::delete(id).unwrap();
        }
    }
    osal::mutex::delete(replacement).unwrap();
}
