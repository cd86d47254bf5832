// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The file seam against a real filesystem: regular files, directories, and
//! readiness waits on a FIFO.

use std::ffi::CString;
use std::time::{Duration, Instant};

use osal::file::{AccessMode, OpenFlags, SeekBase};
use osal::select::{FdSet, SelectFlags};
use osal::{Error, Timeout};

fn mkfifo(path: &str) {
    let cpath = CString::new(path).unwrap();
    // Safety: cpath is a valid NUL-terminated string
    let rc = unsafe { libc::mkfifo(cpath.as_ptr(), 0o644) };
    assert_eq!(rc, 0, "mkfifo failed");
}

#[test]
fn write_seek_read_round_trip() {
    osal::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    let path = path.to_str().unwrap();

    let file = osal::file::open(
        path,
        OpenFlags::CREATE | OpenFlags::TRUNCATE,
        AccessMode::ReadWrite,
    )
    .unwrap();

    assert_eq!(osal::file::write(file, b"hello, seam").unwrap(), 11);
    assert_eq!(osal::file::seek(file, 0, SeekBase::Set).unwrap(), 0);

    let mut buf = [0u8; 11];
    assert_eq!(osal::file::read(file, &mut buf).unwrap(), 11);
    assert_eq!(&buf, b"hello, seam");

    assert_eq!(osal::file::seek(file, 7, SeekBase::Set).unwrap(), 7);
    let mut tail = [0u8; 4];
    assert_eq!(osal::file::read(file, &mut tail).unwrap(), 4);
    assert_eq!(&tail, b"seam");

    let info = osal::file::get_info(file).unwrap();
    assert_eq!(info.path, path);
    assert!(!info.selectable);

    osal::file::close(file).unwrap();
    assert_eq!(osal::file::read(file, &mut buf).unwrap_err(), Error::InvalidId);

    let stat = osal::file::stat(path).unwrap();
    assert!(stat.is_file);
    assert_eq!(stat.size, 11);
}

#[test]
fn open_handles_are_named_by_path() {
    osal::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("named.bin");
    let path = path.to_str().unwrap();

    let file = osal::file::open(path, OpenFlags::CREATE, AccessMode::ReadWrite).unwrap();
    assert_eq!(osal::file::get_id_by_name(path).unwrap(), file);
    // a second open of the same path would collide in the name index
    assert_eq!(
        osal::file::open(path, OpenFlags::empty(), AccessMode::ReadOnly).unwrap_err(),
        Error::NameTaken
    );
    osal::file::close(file).unwrap();
}

#[test]
fn rename_remove_chmod() {
    osal::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let old = dir.path().join("before.txt");
    let new = dir.path().join("after.txt");
    let (old, new) = (old.to_str().unwrap(), new.to_str().unwrap());

    let file = osal::file::open(old, OpenFlags::CREATE, AccessMode::ReadWrite).unwrap();
    osal::file::write(file, b"x").unwrap();
    osal::file::close(file).unwrap();

    osal::file::rename(old, new).unwrap();
    assert_eq!(osal::file::stat(old).unwrap_err(), Error::NameNotFound);
    assert!(osal::file::stat(new).unwrap().is_file);

    osal::file::chmod(new, AccessMode::ReadOnly).unwrap();
    osal::file::chmod(new, AccessMode::ReadWrite).unwrap();

    osal::file::remove(new).unwrap();
    assert_eq!(osal::file::stat(new).unwrap_err(), Error::NameNotFound);
}

#[test]
fn directories_iterate_and_rewind() {
    osal::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("sub");
    let root = root.to_str().unwrap();

    osal::dir::mkdir(root).unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        let path = format!("{root}/{name}");
        let f = osal::file::open(&path, OpenFlags::CREATE, AccessMode::WriteOnly).unwrap();
        osal::file::close(f).unwrap();
    }

    let handle = osal::dir::open(root).unwrap();
    let mut seen = Vec::new();
    while let Some(entry) = osal::dir::read(handle).unwrap() {
        seen.push(entry);
    }
    seen.sort();
    assert_eq!(seen, ["a.txt", "b.txt", "c.txt"]);

    osal::dir::rewind(handle).unwrap();
    assert!(osal::dir::read(handle).unwrap().is_some());
    osal::dir::close(handle).unwrap();

    for name in ["a.txt", "b.txt", "c.txt"] {
        osal::file::remove(&format!("{root}/{name}")).unwrap();
    }
    osal::dir::rmdir(root).unwrap();
    assert_eq!(osal::file::stat(root).unwrap_err(), Error::NameNotFound);
}

#[test]
fn fifo_is_selectable_and_times_out_when_idle() {
    osal::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipe");
    let path = path.to_str().unwrap();
    mkfifo(path);

    let fifo = osal::file::open(path, OpenFlags::empty(), AccessMode::ReadWrite).unwrap();
    assert!(osal::file::get_info(fifo).unwrap().selectable);

    // nothing to read yet
    let begin = Instant::now();
    assert_eq!(
        osal::select::select_single(
            fifo,
            SelectFlags::READABLE,
            Timeout::After(Duration::from_millis(80))
        )
        .unwrap_err(),
        Error::Timeout
    );
    assert!(begin.elapsed() >= Duration::from_millis(80));

    // a poll maps to would-block
    assert_eq!(
        osal::file::timed_read(fifo, &mut [0u8; 4], Timeout::Poll).unwrap_err(),
        Error::WouldBlock
    );

    // readiness follows data
    osal::file::write(fifo, b"!").unwrap();
    let ready = osal::select::select_single(
        fifo,
        SelectFlags::READABLE,
        Timeout::After(Duration::from_secs(2)),
    )
    .unwrap();
    assert!(ready.contains(SelectFlags::READABLE));

    let mut byte = [0u8; 1];
    assert_eq!(
        osal::file::timed_read(fifo, &mut byte, Timeout::Poll).unwrap(),
        1
    );
    assert_eq!(&byte, b"!");

    // seek is undefined for non-regular handles
    assert_eq!(
        osal::file::seek(fifo, 0, SeekBase::Set).unwrap_err(),
        Error::InvalidId
    );

    osal::file::close(fifo).unwrap();
}

#[test]
fn select_multiple_narrows_to_ready_members() {
    osal::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let quiet_path = dir.path().join("quiet");
    let loud_path = dir.path().join("loud");
    mkfifo(quiet_path.to_str().unwrap());
    mkfifo(loud_path.to_str().unwrap());

    let quiet = osal::file::open(
        quiet_path.to_str().unwrap(),
        OpenFlags::empty(),
        AccessMode::ReadWrite,
    )
    .unwrap();
    let loud = osal::file::open(
        loud_path.to_str().unwrap(),
        OpenFlags::empty(),
        AccessMode::ReadWrite,
    )
    .unwrap();

    osal::file::write(loud, b"data").unwrap();

    let mut read_set = FdSet::new();
    read_set.add(quiet);
    read_set.add(loud);
    let mut write_set = FdSet::new();

    osal::select::select_multiple(
        &mut read_set,
        &mut write_set,
        Timeout::After(Duration::from_secs(2)),
    )
    .unwrap();

    assert!(read_set.contains(loud));
    assert!(!read_set.contains(quiet));

    osal::file::close(quiet).unwrap();
    osal::file::close(loud).unwrap();
}

#[test]
fn path_length_is_bounded() {
    osal::init().unwrap();
    let long = format!("/tmp/{}", "p".repeat(osal::config::MAX_PATH_LEN));
    assert_eq!(
        osal::file::open(&long, OpenFlags::CREATE, AccessMode::ReadWrite).unwrap_err(),
        Error::NameTooLong
    );
    assert_eq!(osal::file::stat(&long).unwrap_err(), Error::NameTooLong);
    assert_eq!(osal::dir::mkdir(&long).unwrap_err(), Error::NameTooLong);
}
