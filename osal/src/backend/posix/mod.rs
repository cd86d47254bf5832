// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The POSIX back-end: std threads and parking_lot condvars for the blocking
//! primitives, libc for descriptors, select, the dynamic loader, and the
//! realtime clock.

mod dir;
mod file;
mod module;
mod queue;
mod sync;
mod task;
mod timebase;

use core::time::Duration;
use std::ffi::CString;
use std::io;
use std::time::Instant;

use super::Backend;
use crate::error::{Error, Result};
use crate::file::{AccessMode, FileStat};
use crate::select::SelectFlags;
use crate::time::{OsTime, Timeout};

pub(crate) struct Posix;

impl Backend for Posix {
    type Task = task::PosixTask;
    type Queue = queue::PosixQueue;
    type BinSem = sync::PosixBinSem;
    type CountSem = sync::PosixCountSem;
    type Mutex = sync::PosixMutex;
    type RwLock = sync::PosixRwLock;
    type TimeBase = timebase::PosixTimeBase;
    type File = file::PosixFile;
    type Dir = dir::PosixDir;
    type Module = module::PosixModule;

    fn clock_get() -> Result<OsTime> {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // Safety: ts is a valid out-pointer for the duration of the call
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &raw mut ts) };
        if rc != 0 {
            tracing::warn!(errno = ?io::Error::last_os_error(), "clock_gettime failed");
            return Err(Error::Error);
        }
        Ok(OsTime::new(
            i64::try_from(ts.tv_sec).unwrap_or(0),
            u32::try_from(ts.tv_nsec).unwrap_or(0),
        ))
    }

    fn clock_set(time: OsTime) -> Result<()> {
        let ts = libc::timespec {
            tv_sec: time.secs().try_into().map_err(|_| Error::Error)?,
            tv_nsec: time.subsec_nanos().into(),
        };
        // Safety: ts is a valid timespec for the duration of the call
        let rc = unsafe { libc::clock_settime(libc::CLOCK_REALTIME, &raw const ts) };
        if rc != 0 {
            tracing::debug!(errno = ?io::Error::last_os_error(), "clock_settime refused");
            return Err(Error::Error);
        }
        Ok(())
    }

    fn task_delay(duration: Duration) {
        std::thread::sleep(duration);
    }

    fn promote_dispatcher(handle: &std::thread::JoinHandle<()>) {
        task::apply_priority(handle, 0);
    }

    fn console_write(bytes: &[u8]) -> Result<usize> {
        loop {
            // Safety: the buffer pointer and length come from a valid slice
            let n = unsafe {
                libc::write(
                    libc::STDOUT_FILENO,
                    bytes.as_ptr().cast(),
                    bytes.len(),
                )
            };
            if n >= 0 {
                return Ok(usize::try_from(n).unwrap_or(0));
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(Error::Error);
            }
        }
    }

    fn fs_stat(path: &str) -> Result<FileStat> {
        let meta = std::fs::metadata(path).map_err(map_io)?;
        Ok(FileStat {
            size: meta.len(),
            is_file: meta.is_file(),
            is_dir: meta.is_dir(),
            mtime_secs: meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .and_then(|d| i64::try_from(d.as_secs()).ok())
                .unwrap_or(0),
        })
    }

    fn fs_remove(path: &str) -> Result<()> {
        std::fs::remove_file(path).map_err(map_io)
    }

    fn fs_rename(old: &str, new: &str) -> Result<()> {
        std::fs::rename(old, new).map_err(map_io)
    }

    fn fs_chmod(path: &str, access: AccessMode) -> Result<()> {
        let mode: libc::mode_t = match access {
            AccessMode::ReadOnly => 0o444,
            AccessMode::WriteOnly => 0o222,
            AccessMode::ReadWrite => 0o666,
        };
        let cpath = CString::new(path).map_err(|_| Error::InvalidPointer)?;
        // Safety: cpath is a valid NUL-terminated string
        let rc = unsafe { libc::chmod(cpath.as_ptr(), mode) };
        if rc != 0 {
            return Err(map_io(io::Error::last_os_error()));
        }
        Ok(())
    }

    fn fs_mkdir(path: &str) -> Result<()> {
        std::fs::create_dir(path).map_err(map_io)
    }

    fn fs_rmdir(path: &str) -> Result<()> {
        std::fs::remove_dir(path).map_err(map_io)
    }

    fn select_single(
        file: &Self::File,
        flags: SelectFlags,
        timeout: Timeout,
    ) -> Result<SelectFlags> {
        let fd = file.raw_fd();
        let fd_slot = [fd];
        let empty: &[i32] = &[];
        let (read, write, except) = select_fds(
            if flags.contains(SelectFlags::READABLE) { &fd_slot } else { empty },
            if flags.contains(SelectFlags::WRITABLE) { &fd_slot } else { empty },
            flags.contains(SelectFlags::EXCEPTIONAL).then_some(fd),
            timeout,
        )?;
        let mut ready = SelectFlags::empty();
        if read != 0 {
            ready |= SelectFlags::READABLE;
        }
        if write != 0 {
            ready |= SelectFlags::WRITABLE;
        }
        if except {
            ready |= SelectFlags::EXCEPTIONAL;
        }
        Ok(ready)
    }

    fn select_multiple(
        read: &[&Self::File],
        write: &[&Self::File],
        timeout: Timeout,
    ) -> Result<(u64, u64)> {
        let read_fds: Vec<i32> = read.iter().map(|f| f.raw_fd()).collect();
        let write_fds: Vec<i32> = write.iter().map(|f| f.raw_fd()).collect();
        let (rmask, wmask, _) = select_fds(&read_fds, &write_fds, None, timeout)?;
        Ok((rmask, wmask))
    }

    fn global_symbol_lookup(name: &str) -> Result<usize> {
        module::global_symbol_lookup(name)
    }
}

pub(crate) fn map_io(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound => Error::NameNotFound,
        io::ErrorKind::WouldBlock => Error::WouldBlock,
        io::ErrorKind::TimedOut => Error::Timeout,
        io::ErrorKind::InvalidInput => Error::InvalidSize,
        _ => Error::FileError,
    }
}

/// One `select(2)` round over explicit descriptor lists. Returns position
/// bitmasks over the read and write lists plus whether the exceptional
/// descriptor fired. Retries EINTR against an absolute deadline.
fn select_fds(
    read: &[i32],
    write: &[i32],
    except: Option<i32>,
    timeout: Timeout,
) -> Result<(u64, u64, bool)> {
    let deadline = match timeout {
        Timeout::After(d) => Some(Instant::now() + d),
        _ => None,
    };

    loop {
        // Safety: an all-zero fd_set is the valid empty set per FD_ZERO
        let mut rset: libc::fd_set = unsafe { core::mem::zeroed() };
        // Safety: as above
        let mut wset: libc::fd_set = unsafe { core::mem::zeroed() };
        // Safety: as above
        let mut eset: libc::fd_set = unsafe { core::mem::zeroed() };
        let mut nfds = 0;

        for &fd in read {
            check_fd(fd)?;
            // Safety: fd checked against FD_SETSIZE above
            unsafe { libc::FD_SET(fd, &raw mut rset) };
            nfds = nfds.max(fd + 1);
        }
        for &fd in write {
            check_fd(fd)?;
            // Safety: fd checked against FD_SETSIZE above
            unsafe { libc::FD_SET(fd, &raw mut wset) };
            nfds = nfds.max(fd + 1);
        }
        if let Some(fd) = except {
            check_fd(fd)?;
            // Safety: fd checked against FD_SETSIZE above
            unsafe { libc::FD_SET(fd, &raw mut eset) };
            nfds = nfds.max(fd + 1);
        }

        let mut tv = libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        let tv_ptr = match timeout {
            Timeout::Forever => core::ptr::null_mut(),
            Timeout::Poll => &raw mut tv,
            Timeout::After(_) => {
                let remaining = deadline
                    .map(|d| d.saturating_duration_since(Instant::now()))
                    .unwrap_or(Duration::ZERO);
                tv.tv_sec = libc::time_t::try_from(remaining.as_secs()).unwrap_or(libc::time_t::MAX);
                tv.tv_usec = remaining.subsec_micros().into();
                &raw mut tv
            }
        };

        // Safety: the three sets and the timeval live across the call; nfds
        // bounds every descriptor placed in them
        let rc = unsafe {
            libc::select(nfds, &raw mut rset, &raw mut wset, &raw mut eset, tv_ptr)
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(Error::Error);
        }
        if rc == 0 {
            return match timeout {
                Timeout::Poll => Err(Error::WouldBlock),
                _ => Err(Error::Timeout),
            };
        }

        let mut rmask = 0u64;
        for (i, &fd) in read.iter().enumerate() {
            // Safety: rset was populated by select above
            if unsafe { libc::FD_ISSET(fd, &raw const rset) } {
                rmask |= 1 << i;
            }
        }
        let mut wmask = 0u64;
        for (i, &fd) in write.iter().enumerate() {
            // Safety: wset was populated by select above
            if unsafe { libc::FD_ISSET(fd, &raw const wset) } {
                wmask |= 1 << i;
            }
        }
        let emask = if let Some(fd) = except {
            // Safety: eset was populated by select above
            unsafe { libc::FD_ISSET(fd, &raw const eset) }
        } else {
            false
        };
        return Ok((rmask, wmask, emask));
    }
}

fn check_fd(fd: i32) -> Result<()> {
    if fd < 0 || fd >= i32::try_from(libc::FD_SETSIZE).unwrap_or(i32::MAX) {
        return Err(Error::Error);
    }
    Ok(())
}
