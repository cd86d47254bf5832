// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fs::ReadDir;

use parking_lot::Mutex;

use super::map_io;
use crate::backend::DirImpl;
use crate::error::Result;

pub(crate) struct PosixDir {
    path: String,
    iter: Mutex<ReadDir>,
}

impl DirImpl for PosixDir {
    fn open(path: &str) -> Result<Self> {
        let iter = std::fs::read_dir(path).map_err(map_io)?;
        Ok(Self {
            path: path.to_owned(),
            iter: Mutex::new(iter),
        })
    }

    fn next(&self) -> Result<Option<String>> {
        let mut iter = self.iter.lock();
        match iter.next() {
            None => Ok(None),
            Some(Ok(entry)) => Ok(Some(entry.file_name().to_string_lossy().into_owned())),
            Some(Err(err)) => Err(map_io(err)),
        }
    }

    fn rewind(&self) -> Result<()> {
        let fresh = std::fs::read_dir(&self.path).map_err(map_io)?;
        *self.iter.lock() = fresh;
        Ok(())
    }
}
