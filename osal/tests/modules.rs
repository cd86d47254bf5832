// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Module/symbol operations and the wall clock, exercised against the
//! process's own dynamic loader.

use osal::Error;
use osal::module::ModuleFlags;

#[test]
fn global_symbol_lookup_resolves_libc() {
    osal::init().unwrap();
    // the C runtime is linked into every test binary
    let addr = osal::module::global_symbol_lookup("strlen").unwrap();
    assert_ne!(addr, 0);
}

#[test]
fn unknown_symbols_are_reported() {
    osal::init().unwrap();
    assert_eq!(
        osal::module::global_symbol_lookup("definitely_not_a_symbol_xyzzy").unwrap_err(),
        Error::SymbolNotFound
    );
    assert_eq!(
        osal::module::global_symbol_lookup("").unwrap_err(),
        Error::InvalidPointer
    );
}

#[test]
fn loading_a_missing_module_fails_without_claiming_the_name() {
    osal::init().unwrap();
    assert_eq!(
        osal::module::load("mod-missing", "/nonexistent/lib.so", ModuleFlags::empty()).unwrap_err(),
        Error::ModuleError
    );
    // the failed load released its reservation
    assert_eq!(
        osal::module::get_id_by_name("mod-missing").unwrap_err(),
        Error::NameNotFound
    );
}

#[test]
fn symbol_dump_is_not_available_on_this_platform() {
    osal::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("symtab.dat");
    let path = path.to_str().unwrap();

    assert_eq!(
        osal::module::symbol_table_dump(path, 4096).unwrap_err(),
        Error::NotImplemented
    );
    // the refusal must not leave a partial dump behind
    assert_eq!(osal::file::stat(path).unwrap_err(), Error::NameNotFound);
}

#[test]
fn wall_clock_reads_a_plausible_time() {
    osal::init().unwrap();
    let now = osal::time::get_local_time().unwrap();
    // sometime after 2001 by any reasonable host clock
    assert!(now.secs() > 1_000_000_000);
    assert!(now.subsec_nanos() < 1_000_000_000);
}

#[test]
fn heap_statistics_are_not_available_on_this_platform() {
    osal::init().unwrap();
    assert_eq!(osal::heap::info().unwrap_err(), Error::NotImplemented);
}
