// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Object ids.
//!
//! An [`ObjectId`] is the only reference the public API ever hands out. It
//! packs three fields into 32 bits:
//!
//! ```text
//! 31        24 23                 8 7          0
//! ┌───────────┬────────────────────┬────────────┐
//! │  type tag │     generation     │ slot index │
//! └───────────┴────────────────────┴────────────┘
//! ```
//!
//! The type tag is non-zero for every defined id, so the all-zero value can
//! serve as [`ObjectId::UNDEFINED`]. The generation field is bumped by the
//! owning table every time the slot is reallocated, which makes an id held
//! across delete/re-create compare unequal to the new occupant's id instead
//! of silently aliasing it.

use core::fmt;

use handle_table::Key;

const TYPE_SHIFT: u32 = 24;
const GENERATION_SHIFT: u32 = 8;
const GENERATION_MASK: u32 = 0xFFFF;
const INDEX_MASK: u32 = 0xFF;

/// Class of resource an [`ObjectId`] refers to.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum ObjectType {
    Task = 1,
    Queue = 2,
    BinSem = 3,
    CountSem = 4,
    Mutex = 5,
    RwLock = 6,
    TimeBase = 7,
    Timer = 8,
    File = 9,
    Dir = 10,
    Module = 11,
    Console = 12,
}

impl ObjectType {
    fn from_tag(tag: u32) -> Option<Self> {
        Some(match tag {
            1 => Self::Task,
            2 => Self::Queue,
            3 => Self::BinSem,
            4 => Self::CountSem,
            5 => Self::Mutex,
            6 => Self::RwLock,
            7 => Self::TimeBase,
            8 => Self::Timer,
            9 => Self::File,
            10 => Self::Dir,
            11 => Self::Module,
            12 => Self::Console,
            _ => return None,
        })
    }

    /// Short lower-case label, used in `Debug` output and thread names.
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Queue => "queue",
            Self::BinSem => "binsem",
            Self::CountSem => "countsem",
            Self::Mutex => "mutex",
            Self::RwLock => "rwlock",
            Self::TimeBase => "timebase",
            Self::Timer => "timer",
            Self::File => "file",
            Self::Dir => "dir",
            Self::Module => "module",
            Self::Console => "console",
        }
    }
}

/// Opaque generation-tagged reference to an object.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ObjectId(u32);

impl ObjectId {
    /// The reserved "no object" value.
    pub const UNDEFINED: Self = Self(0);

    /// Sentinel recorded as the creator of objects created outside any task
    /// context (during init, from a time-base dispatch thread, from plain
    /// threads unknown to the layer). Its slot index is above every table
    /// capacity, so it can never collide with a real task id.
    pub const SYSTEM: Self = Self(
        (ObjectType::Task as u32) << TYPE_SHIFT | GENERATION_MASK << GENERATION_SHIFT | INDEX_MASK,
    );

    pub(crate) fn from_parts(ty: ObjectType, key: Key) -> Self {
        let tag = (ty as u32) << TYPE_SHIFT;
        let generation = (u32::from(key.generation()) & GENERATION_MASK) << GENERATION_SHIFT;
        let index = u32::try_from(key.index()).expect("slot index fits the id field") & INDEX_MASK;
        Self(tag | generation | index)
    }

    /// The raw 32-bit representation.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn from_u32(raw: u32) -> Self {
        Self(raw)
    }

    /// `true` unless this is [`ObjectId::UNDEFINED`].
    #[must_use]
    pub fn is_defined(self) -> bool {
        self.0 != 0
    }

    /// The resource class encoded in this id, if the tag is valid.
    #[must_use]
    pub fn object_type(self) -> Option<ObjectType> {
        ObjectType::from_tag(self.0 >> TYPE_SHIFT)
    }

    /// Recovers the table key, checking that the id is of type `ty`.
    pub(crate) fn key_as(self, ty: ObjectType) -> Option<Key> {
        if self.object_type() != Some(ty) || self == Self::SYSTEM {
            return None;
        }
        let index = (self.0 & INDEX_MASK) as usize;
        #[allow(clippy::cast_possible_truncation, reason = "masked to 16 bits")]
        let generation = ((self.0 >> GENERATION_SHIFT) & GENERATION_MASK) as u16;
        Key::from_raw_parts(index, generation)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_defined() {
            return f.write_str("ObjectId(undefined)");
        }
        if *self == Self::SYSTEM {
            return f.write_str("ObjectId(system)");
        }
        match self.object_type() {
            Some(ty) => write!(
                f,
                "ObjectId({}:{}v{})",
                ty.label(),
                self.0 & INDEX_MASK,
                (self.0 >> GENERATION_SHIFT) & GENERATION_MASK
            ),
            None => write!(f, "ObjectId(invalid:{:#010x})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn undefined_is_zero() {
        assert_eq!(ObjectId::UNDEFINED.as_u32(), 0);
        assert!(!ObjectId::UNDEFINED.is_defined());
        assert_eq!(ObjectId::UNDEFINED.object_type(), None);
    }

    #[test]
    fn system_sentinel_never_resolves_to_a_key() {
        assert!(ObjectId::SYSTEM.is_defined());
        assert_eq!(ObjectId::SYSTEM.object_type(), Some(ObjectType::Task));
        assert_eq!(ObjectId::SYSTEM.key_as(ObjectType::Task), None);
    }

    #[test]
    fn type_mismatch_rejected() {
        let key = Key::from_raw_parts(3, 7).unwrap();
        let id = ObjectId::from_parts(ObjectType::Queue, key);
        assert_eq!(id.key_as(ObjectType::Queue), Some(key));
        assert_eq!(id.key_as(ObjectType::BinSem), None);
    }

    proptest! {
        #[test]
        fn pack_unpack_round_trip(index in 0usize..255, generation in 1u16..) {
            let key = Key::from_raw_parts(index, generation).unwrap();
            for ty in [
                ObjectType::Task, ObjectType::Queue, ObjectType::BinSem,
                ObjectType::CountSem, ObjectType::Mutex, ObjectType::RwLock,
                ObjectType::TimeBase, ObjectType::Timer, ObjectType::File,
                ObjectType::Dir, ObjectType::Module, ObjectType::Console,
            ] {
                let id = ObjectId::from_parts(ty, key);
                prop_assert!(id.is_defined());
                prop_assert_eq!(id.object_type(), Some(ty));
                prop_assert_eq!(id.key_as(ty), Some(key));
            }
        }

        #[test]
        fn distinct_generations_compare_unequal(index in 0usize..255, g1 in 1u16.., g2 in 1u16..) {
            prop_assume!(g1 != g2);
            let a = ObjectId::from_parts(ObjectType::Task, Key::from_raw_parts(index, g1).unwrap());
            let b = ObjectId::from_parts(ObjectType::Task, Key::from_raw_parts(index, g2).unwrap());
            prop_assert_ne!(a, b);
        }
    }
}
