// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Handle semantics shared by every resource class: naming, id identity
//! across delete/re-create, and stale-id detection.

use osal::{Error, ObjectId, ObjectType};

#[test]
fn binsem_give_take_round_trip() {
    osal::init().unwrap();
    let sem = osal::binsem::create("obj-bs-basic", false).unwrap();
    osal::binsem::give(sem).unwrap();
    osal::binsem::take(sem).unwrap();
    osal::binsem::delete(sem).unwrap();
}

#[test]
fn ids_are_typed_and_generation_tagged() {
    osal::init().unwrap();
    let sem = osal::binsem::create("obj-typed", false).unwrap();
    assert_eq!(sem.object_type(), Some(ObjectType::BinSem));
    assert!(sem.is_defined());

    // a binsem id is not a countsem id, even with matching slot fields
    assert_eq!(osal::countsem::take(sem).unwrap_err(), Error::InvalidId);

    osal::binsem::delete(sem).unwrap();
}

#[test]
fn operations_on_a_deleted_id_fail() {
    osal::init().unwrap();
    let sem = osal::binsem::create("obj-stale", true).unwrap();
    assert_eq!(osal::binsem::get_info(sem).unwrap().name, "obj-stale");

    osal::binsem::delete(sem).unwrap();

    assert_eq!(osal::binsem::take(sem).unwrap_err(), Error::InvalidId);
    assert_eq!(osal::binsem::give(sem).unwrap_err(), Error::InvalidId);
    assert_eq!(osal::binsem::get_info(sem).unwrap_err(), Error::InvalidId);
    assert_eq!(osal::binsem::delete(sem).unwrap_err(), Error::InvalidId);
}

#[test]
fn recreating_a_name_yields_a_fresh_id() {
    osal::init().unwrap();
    let first = osal::binsem::create("obj-recreate", false).unwrap();
    osal::binsem::delete(first).unwrap();

    let second = osal::binsem::create("obj-recreate", false).unwrap();
    assert_ne!(first, second);
    // the old id must not alias the new occupant
    assert_eq!(osal::binsem::take(first).unwrap_err(), Error::InvalidId);
    osal::binsem::delete(second).unwrap();
}

#[test]
fn duplicate_names_rejected_per_type_but_not_across_types() {
    osal::init().unwrap();
    let sem = osal::binsem::create("obj-shared-name", false).unwrap();
    assert_eq!(
        osal::binsem::create("obj-shared-name", false).unwrap_err(),
        Error::NameTaken
    );
    // the same name is fine in a different table
    let mutex = osal::mutex::create("obj-shared-name").unwrap();

    osal::binsem::delete(sem).unwrap();
    osal::mutex::delete(mutex).unwrap();
}

#[test]
fn over_long_names_rejected_everywhere() {
    osal::init().unwrap();
    let long = "n".repeat(osal::config::MAX_NAME_LEN + 1);
    assert_eq!(
        osal::binsem::create(&long, false).unwrap_err(),
        Error::NameTooLong
    );
    assert_eq!(
        osal::countsem::create(&long, 0).unwrap_err(),
        Error::NameTooLong
    );
    assert_eq!(osal::mutex::create(&long).unwrap_err(), Error::NameTooLong);
    assert_eq!(osal::rwlock::create(&long).unwrap_err(), Error::NameTooLong);
    assert_eq!(
        osal::queue::create(&long, 4, 4).unwrap_err(),
        Error::NameTooLong
    );
    assert_eq!(
        osal::binsem::get_id_by_name(&long).unwrap_err(),
        Error::NameTooLong
    );
}

#[test]
fn name_lookup_finds_active_objects_only() {
    osal::init().unwrap();
    assert_eq!(
        osal::binsem::get_id_by_name("obj-absent").unwrap_err(),
        Error::NameNotFound
    );

    let sem = osal::binsem::create("obj-lookup", false).unwrap();
    assert_eq!(osal::binsem::get_id_by_name("obj-lookup").unwrap(), sem);

    osal::binsem::delete(sem).unwrap();
    assert_eq!(
        osal::binsem::get_id_by_name("obj-lookup").unwrap_err(),
        Error::NameNotFound
    );
}

#[test]
fn creator_outside_any_task_is_the_system_sentinel() {
    osal::init().unwrap();
    let sem = osal::binsem::create("obj-creator", false).unwrap();
    let info = osal::binsem::get_info(sem).unwrap();
    assert_eq!(info.creator, ObjectId::SYSTEM);
    osal::binsem::delete(sem).unwrap();
}

#[test]
fn undefined_id_is_rejected() {
    osal::init().unwrap();
    assert_eq!(
        osal::binsem::take(ObjectId::UNDEFINED).unwrap_err(),
        Error::InvalidId
    );
    assert_eq!(
        osal::queue::get(ObjectId::UNDEFINED, &mut [0u8; 4], osal::Timeout::Poll).unwrap_err(),
        Error::InvalidId
    );
}

#[test]
fn status_formatting_is_stable() {
    for &err in osal::ALL_ERRORS {
        let name = osal::get_error_name(err.code()).unwrap();
        assert_eq!(osal::status_to_string(err.code()).as_str(), name);
    }
    assert_eq!(osal::status_to_string(0).as_str(), "OS_SUCCESS");
    assert_eq!(osal::status_to_string(-31415).as_str(), "OS_UNKNOWN(-31415)");
}

#[test]
fn console_gating_smoke() {
    osal::init().unwrap();
    osal::console::printf_disable();
    osal::printf!("discarded {}", 1);
    osal::console::printf_enable();
    osal::printf!("console smoke test line {}\n", 2);
}
