// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! System heap statistics. Few platforms can actually answer this; the
//! POSIX back-end reports `NotImplemented`.

use crate::backend::{Backend, Platform};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapInfo {
    pub free_bytes: u64,
    pub free_blocks: u64,
    pub largest_free_block: u64,
}

/// Queries the platform allocator's free-space statistics.
pub fn info() -> Result<HeapInfo> {
    Platform::heap_info()
}
