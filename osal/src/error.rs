// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The status taxonomy.
//!
//! Every public operation resolves to a status: `0` for success or one of the
//! negative codes below. Codes are a stable contract, partitioned into
//! per-subsystem ranges and never renumbered, and each code maps
//! one-to-one to a stable upper-case name. The platform back-end may
//! contribute additional codes through its extension name table; those are
//! consulted by the reverse lookup before giving up with `OS_UNKNOWN(<n>)`.

use core::fmt;

use arrayvec::ArrayString;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Error status of a failed operation.
///
/// The discriminants are the wire-stable negative status codes.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, thiserror::Error)]
#[repr(i32)]
pub enum Error {
    // generic
    #[error("OS_ERROR")]
    Error = -1,
    #[error("OS_INVALID_POINTER")]
    InvalidPointer = -2,
    #[error("OS_TIMEOUT")]
    Timeout = -3,
    #[error("OS_INVALID_SIZE")]
    InvalidSize = -4,
    #[error("OS_NAME_TOO_LONG")]
    NameTooLong = -5,
    #[error("OS_NO_FREE_IDS")]
    NoFreeIds = -6,
    #[error("OS_NAME_TAKEN")]
    NameTaken = -7,
    #[error("OS_NAME_NOT_FOUND")]
    NameNotFound = -8,
    #[error("OS_INVALID_ID")]
    InvalidId = -9,
    #[error("OS_WOULD_BLOCK")]
    WouldBlock = -10,
    #[error("OS_NOT_IMPLEMENTED")]
    NotImplemented = -11,
    #[error("OS_INVALID_PRIORITY")]
    InvalidPriority = -12,
    #[error("OS_OUTPUT_TOO_LARGE")]
    OutputTooLarge = -13,

    // semaphores
    #[error("OS_SEM_FAILURE")]
    SemFailure = -30,
    #[error("OS_INVALID_SEM_VALUE")]
    InvalidSemValue = -31,

    // queues
    #[error("OS_QUEUE_EMPTY")]
    QueueEmpty = -40,
    #[error("OS_QUEUE_FULL")]
    QueueFull = -41,
    #[error("OS_QUEUE_INVALID_SIZE")]
    QueueInvalidSize = -42,

    // timers
    #[error("OS_TIMER_INVALID_ARGS")]
    TimerInvalidArgs = -50,
    #[error("OS_TIMER_INTERNAL")]
    TimerInternal = -51,
    #[error("OS_TIMER_UNAVAILABLE")]
    TimerUnavailable = -52,

    // modules
    #[error("OS_MODULE_ERROR")]
    ModuleError = -60,
    #[error("OS_SYMBOL_NOT_FOUND")]
    SymbolNotFound = -61,

    // files
    #[error("OS_FILE_ERROR")]
    FileError = -70,
}

/// Every defined error, in code order. Kept in sync with the enum by the
/// round-trip test below.
pub const ALL_ERRORS: &[Error] = &[
    Error::Error,
    Error::InvalidPointer,
    Error::Timeout,
    Error::InvalidSize,
    Error::NameTooLong,
    Error::NoFreeIds,
    Error::NameTaken,
    Error::NameNotFound,
    Error::InvalidId,
    Error::WouldBlock,
    Error::NotImplemented,
    Error::InvalidPriority,
    Error::OutputTooLarge,
    Error::SemFailure,
    Error::InvalidSemValue,
    Error::QueueEmpty,
    Error::QueueFull,
    Error::QueueInvalidSize,
    Error::TimerInvalidArgs,
    Error::TimerInternal,
    Error::TimerUnavailable,
    Error::ModuleError,
    Error::SymbolNotFound,
    Error::FileError,
];

impl Error {
    /// The stable numeric code.
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// The stable name, e.g. `"OS_NAME_TAKEN"`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Error => "OS_ERROR",
            Self::InvalidPointer => "OS_INVALID_POINTER",
            Self::Timeout => "OS_TIMEOUT",
            Self::InvalidSize => "OS_INVALID_SIZE",
            Self::NameTooLong => "OS_NAME_TOO_LONG",
            Self::NoFreeIds => "OS_NO_FREE_IDS",
            Self::NameTaken => "OS_NAME_TAKEN",
            Self::NameNotFound => "OS_NAME_NOT_FOUND",
            Self::InvalidId => "OS_INVALID_ID",
            Self::WouldBlock => "OS_WOULD_BLOCK",
            Self::NotImplemented => "OS_NOT_IMPLEMENTED",
            Self::InvalidPriority => "OS_INVALID_PRIORITY",
            Self::OutputTooLarge => "OS_OUTPUT_TOO_LARGE",
            Self::SemFailure => "OS_SEM_FAILURE",
            Self::InvalidSemValue => "OS_INVALID_SEM_VALUE",
            Self::QueueEmpty => "OS_QUEUE_EMPTY",
            Self::QueueFull => "OS_QUEUE_FULL",
            Self::QueueInvalidSize => "OS_QUEUE_INVALID_SIZE",
            Self::TimerInvalidArgs => "OS_TIMER_INVALID_ARGS",
            Self::TimerInternal => "OS_TIMER_INTERNAL",
            Self::TimerUnavailable => "OS_TIMER_UNAVAILABLE",
            Self::ModuleError => "OS_MODULE_ERROR",
            Self::SymbolNotFound => "OS_SYMBOL_NOT_FOUND",
            Self::FileError => "OS_FILE_ERROR",
        }
    }

    /// Recovers the error for a stable code, if one is defined.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        ALL_ERRORS.iter().copied().find(|e| e.code() == code)
    }
}

impl From<handle_table::TableError> for Error {
    fn from(err: handle_table::TableError) -> Self {
        match err {
            handle_table::TableError::NameTooLong => Self::NameTooLong,
            handle_table::TableError::NameTaken => Self::NameTaken,
            handle_table::TableError::NoFreeSlots => Self::NoFreeIds,
            handle_table::TableError::Stale => Self::InvalidId,
        }
    }
}

/// Status integer for a completed operation: `0` on success, the error code
/// otherwise.
#[must_use]
pub fn status_of<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}

/// Name for an arbitrary status integer.
///
/// Consults the defined taxonomy first, then the platform back-end's
/// extension table. Unknown codes yield `None`; callers that need a
/// displayable string for those use [`status_to_string`].
#[must_use]
pub fn get_error_name(status: i32) -> Option<&'static str> {
    if status == 0 {
        return Some("OS_SUCCESS");
    }
    if let Some(err) = Error::from_code(status) {
        return Some(err.name());
    }
    crate::backend::platform_error_name(status)
}

/// Bounded formatting buffer for [`status_to_string`]. Large enough for any
/// defined name and for the `OS_UNKNOWN(<n>)` fallback.
pub type StatusString = ArrayString<32>;

/// Formats any status integer into a bounded string.
///
/// Defined statuses format as their stable name; everything else as
/// `OS_UNKNOWN(<n>)`.
#[must_use]
pub fn status_to_string(status: i32) -> StatusString {
    let mut out = StatusString::new();
    match get_error_name(status) {
        Some(name) => {
            // names are chosen to fit the buffer
            let _ = fmt::Write::write_str(&mut out, name);
        }
        None => {
            let _ = fmt::Write::write_fmt(&mut out, format_args!("OS_UNKNOWN({status})"));
        }
    }
    out
}

/// Maps a final status to a process exit code: 0 for success, 1 for the
/// generic error, the low 7 bits otherwise.
#[must_use]
pub fn exit_code(status: i32) -> i32 {
    match status {
        0 => 0,
        s if s == Error::Error.code() => 1,
        s => s & 0x7F,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_round_trip() {
        for &err in ALL_ERRORS {
            assert_eq!(Error::from_code(err.code()), Some(err));
        }
    }

    #[test]
    fn names_are_injective() {
        let names: HashSet<_> = ALL_ERRORS.iter().map(|e| e.name()).collect();
        assert_eq!(names.len(), ALL_ERRORS.len());
        let codes: HashSet<_> = ALL_ERRORS.iter().map(|e| e.code()).collect();
        assert_eq!(codes.len(), ALL_ERRORS.len());
    }

    #[test]
    fn display_matches_name() {
        for &err in ALL_ERRORS {
            assert_eq!(err.to_string(), err.name());
        }
    }

    #[test]
    fn unknown_codes_format_distinctly() {
        assert_eq!(status_to_string(0).as_str(), "OS_SUCCESS");
        assert_eq!(status_to_string(-1).as_str(), "OS_ERROR");
        assert_eq!(status_to_string(-9999).as_str(), "OS_UNKNOWN(-9999)");
        assert_eq!(status_to_string(17).as_str(), "OS_UNKNOWN(17)");
    }

    #[test]
    fn exit_codes() {
        assert_eq!(exit_code(0), 0);
        assert_eq!(exit_code(Error::Error.code()), 1);
        assert_eq!(
            exit_code(Error::NameTaken.code()),
            Error::NameTaken.code() & 0x7F
        );
    }
}
