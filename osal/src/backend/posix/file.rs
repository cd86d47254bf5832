// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use super::map_io;
use crate::backend::FileImpl;
use crate::error::{Error, Result};
use crate::file::{AccessMode, OpenFlags, SeekBase};

pub(crate) struct PosixFile {
    fd: OwnedFd,
    /// Regular files seek; everything else selects.
    regular: bool,
}

impl PosixFile {
    pub(crate) fn raw_fd(&self) -> i32 {
        self.fd.as_raw_fd()
    }
}

impl FileImpl for PosixFile {
    fn open(path: &str, flags: OpenFlags, access: AccessMode) -> Result<Self> {
        let mut oflags = match access {
            AccessMode::ReadOnly => libc::O_RDONLY,
            AccessMode::WriteOnly => libc::O_WRONLY,
            AccessMode::ReadWrite => libc::O_RDWR,
        };
        if flags.contains(OpenFlags::CREATE) {
            oflags |= libc::O_CREAT;
        }
        if flags.contains(OpenFlags::TRUNCATE) {
            oflags |= libc::O_TRUNC;
        }
        if flags.contains(OpenFlags::EXCL) {
            oflags |= libc::O_EXCL;
        }
        if flags.contains(OpenFlags::APPEND) {
            oflags |= libc::O_APPEND;
        }

        let cpath = CString::new(path).map_err(|_| Error::InvalidPointer)?;
        let mode: libc::mode_t = 0o644;
        // Safety: cpath is a valid NUL-terminated string
        let fd = unsafe { libc::open(cpath.as_ptr(), oflags, mode) };
        if fd < 0 {
            return Err(map_io(io::Error::last_os_error()));
        }
        // Safety: fd was just returned by open and is owned by no one else
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        // Safety: zeroed stat is a valid out-buffer for fstat
        let mut st: libc::stat = unsafe { core::mem::zeroed() };
        // Safety: st is a valid out-pointer and fd is open
        let rc = unsafe { libc::fstat(fd.as_raw_fd(), &raw mut st) };
        if rc != 0 {
            return Err(map_io(io::Error::last_os_error()));
        }
        let regular = (st.st_mode & libc::S_IFMT) == libc::S_IFREG;

        Ok(Self { fd, regular })
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            // Safety: the buffer pointer and length come from a valid slice
            let n = unsafe { libc::read(self.raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
            if n >= 0 {
                return Ok(usize::try_from(n).unwrap_or(0));
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(map_io(err));
            }
        }
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        loop {
            // Safety: the buffer pointer and length come from a valid slice
            let n = unsafe { libc::write(self.raw_fd(), buf.as_ptr().cast(), buf.len()) };
            if n >= 0 {
                return Ok(usize::try_from(n).unwrap_or(0));
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(map_io(err));
            }
        }
    }

    fn seek(&self, offset: i64, whence: SeekBase) -> Result<u64> {
        if !self.regular {
            return Err(Error::InvalidId);
        }
        let whence = match whence {
            SeekBase::Set => libc::SEEK_SET,
            SeekBase::Current => libc::SEEK_CUR,
            SeekBase::End => libc::SEEK_END,
        };
        // Safety: lseek on an open descriptor has no memory preconditions
        let pos = unsafe { libc::lseek(self.raw_fd(), offset, whence) };
        if pos < 0 {
            return Err(map_io(io::Error::last_os_error()));
        }
        Ok(u64::try_from(pos).unwrap_or(0))
    }

    fn selectable(&self) -> bool {
        !self.regular
    }
}
