// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::ffi::{CStr, CString, c_void};

use crate::backend::ModuleImpl;
use crate::error::{Error, Result};
use crate::module::ModuleFlags;

pub(crate) struct PosixModule {
    handle: DlHandle,
}

struct DlHandle(*mut c_void);

// Safety: dlopen handles are process-global references; the dl* entry points
// are required to be thread-safe by POSIX
unsafe impl Send for DlHandle {}
// Safety: as above
unsafe impl Sync for DlHandle {}

fn last_dl_error() -> String {
    // Safety: dlerror returns either null or a valid NUL-terminated string
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        return String::new();
    }
    // Safety: non-null dlerror result points at a valid C string
    unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}

impl ModuleImpl for PosixModule {
    fn load(path: &str, flags: ModuleFlags) -> Result<Self> {
        let cpath = CString::new(path).map_err(|_| Error::InvalidPointer)?;
        let mode = libc::RTLD_NOW
            | if flags.contains(ModuleFlags::GLOBAL) {
                libc::RTLD_GLOBAL
            } else {
                libc::RTLD_LOCAL
            };

        // Safety: cpath is a valid NUL-terminated string
        let handle = unsafe { libc::dlopen(cpath.as_ptr(), mode) };
        if handle.is_null() {
            tracing::debug!(path, error = %last_dl_error(), "dlopen failed");
            return Err(Error::ModuleError);
        }
        Ok(Self {
            handle: DlHandle(handle),
        })
    }

    fn symbol(&self, name: &str) -> Result<usize> {
        lookup(self.handle.0, name)
    }

    fn unload(&self) -> Result<()> {
        // Safety: the handle came from dlopen and is closed at most once by
        // the shared layer's delete path
        let rc = unsafe { libc::dlclose(self.handle.0) };
        if rc != 0 {
            tracing::debug!(error = %last_dl_error(), "dlclose failed");
            return Err(Error::ModuleError);
        }
        Ok(())
    }
}

pub(crate) fn global_symbol_lookup(name: &str) -> Result<usize> {
    lookup(libc::RTLD_DEFAULT, name)
}

fn lookup(handle: *mut c_void, name: &str) -> Result<usize> {
    let cname = CString::new(name).map_err(|_| Error::InvalidPointer)?;
    // clear any stale error so a null result can be told apart from a
    // legitimately-null symbol
    let _ = last_dl_error();
    // Safety: handle is a live dlopen handle (or the RTLD_DEFAULT sentinel)
    // and cname is a valid NUL-terminated string
    let addr = unsafe { libc::dlsym(handle, cname.as_ptr()) };
    if addr.is_null() {
        return Err(Error::SymbolNotFound);
    }
    Ok(addr as usize)
}
