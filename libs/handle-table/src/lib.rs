// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A fixed-capacity table of named, reference-counted objects.
//!
//! Each entry cycles through four states:
//!
//! ```text
//! Free ──reserve──▶ Reserved ──commit──▶ Active ──begin_delete──▶ Deleting ──finish──▶ Free
//!                      │                                              │
//!                      └───────────abort───▶ Free    Active ◀──cancel─┘
//! ```
//!
//! A [`Key`] is the caller's only reference to an entry. It carries the slot
//! index plus a per-slot *generation* counter that is bumped on every
//! allocation of that slot, so a key held across a delete/re-create of the
//! same slot goes stale instead of silently aliasing the new occupant.
//!
//! Access to a live entry is mediated by tokens:
//!
//! - [`ExclusiveToken`] is held while a new entry is being constructed. The
//!   slot is `Reserved` (its name is claimed, its key is assigned) but not
//!   yet visible to lookups. Dropping the token without committing returns
//!   the slot to `Free`.
//! - [`SharedToken`] is held across ordinary operations. It pins the entry's
//!   payload and bumps the entry's reference count; the table mutex is *not*
//!   held while a shared token is alive, so slow payload operations never
//!   block unrelated table traffic.
//! - [`DeleteToken`] is returned by [`Table::begin_delete`] once every
//!   outstanding shared token has been released. The payload can then be
//!   torn down without racing any reader.
//!
//! Allocation scans for a free slot round-robin starting just past the most
//! recently allocated index, spreading generation wear across the table.
//! Names are unique among reserved and active entries; lookup is a linear
//! scan under the table mutex.

use core::fmt;
use core::num::NonZeroU16;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Reference to a table entry: slot index plus the generation the slot had
/// when the entry was allocated.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    index: u16,
    generation: NonZeroU16,
}

impl Key {
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.index)
    }

    #[must_use]
    pub fn generation(self) -> u16 {
        self.generation.get()
    }

    /// Reassembles a key from its raw parts, e.g. after a round-trip through
    /// a packed external id. Returns `None` for the never-valid zero
    /// generation.
    #[must_use]
    pub fn from_raw_parts(index: usize, generation: u16) -> Option<Self> {
        let index = u16::try_from(index).ok()?;
        let generation = NonZeroU16::new(generation)?;
        Some(Self { index, generation })
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({}v{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// The name exceeds the cap this table was constructed with.
    #[error("name is longer than the table's name cap")]
    NameTooLong,
    /// A reserved or active entry already claims this name.
    #[error("name is already in use")]
    NameTaken,
    /// Every slot is reserved, active, or mid-deletion.
    #[error("no free slots")]
    NoFreeSlots,
    /// The key's slot is not active, or the generation does not match.
    #[error("key does not reference a live entry")]
    Stale,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum State {
    Free,
    Reserved,
    Active,
    Deleting,
}

struct Slot<T> {
    state: State,
    /// Generation of the current (or most recent) occupant. Zero only before
    /// the first allocation.
    generation: u16,
    name: String,
    /// Opaque owner tag recorded at reservation; the table never interprets it.
    creator: u32,
    /// Outstanding shared tokens.
    refs: u32,
    payload: Option<Arc<T>>,
}

impl<T> Slot<T> {
    fn vacant() -> Self {
        Self {
            state: State::Free,
            generation: 0,
            name: String::new(),
            creator: 0,
            refs: 0,
            payload: None,
        }
    }

    fn matches(&self, key: Key) -> bool {
        self.generation == key.generation() && self.state != State::Free
    }
}

struct Inner<T> {
    slots: Box<[Slot<T>]>,
    /// Index of the most recent allocation; scans start just past it.
    last_alloc: usize,
}

/// Snapshot of an entry's bookkeeping fields, taken under the table mutex.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub name: String,
    pub creator: u32,
}

/// See the [crate docs](crate) for the state machine and token protocol.
pub struct Table<T> {
    name_cap: usize,
    inner: Mutex<Inner<T>>,
    /// Signalled whenever a shared token is released on an entry that a
    /// deleter is waiting to drain.
    drained: Condvar,
}

// === impl Table ===

impl<T> Table<T> {
    /// Creates a table with `capacity` slots whose entry names may be at most
    /// `name_cap` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or does not fit the key index width.
    #[must_use]
    pub fn new(capacity: usize, name_cap: usize) -> Self {
        assert!(capacity > 0, "table capacity must be non-zero");
        assert!(
            u16::try_from(capacity).is_ok(),
            "table capacity exceeds key index width"
        );

        let slots = (0..capacity).map(|_| Slot::vacant()).collect();
        Self {
            name_cap,
            inner: Mutex::new(Inner {
                slots,
                last_alloc: capacity - 1,
            }),
            drained: Condvar::new(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Claims a free slot for a new entry named `name`.
    ///
    /// On success the slot is `Reserved`: its name is taken and its key is
    /// assigned, but lookups do not see it until [`ExclusiveToken::commit`].
    ///
    /// # Errors
    ///
    /// [`TableError::NameTooLong`] if `name` exceeds the name cap,
    /// [`TableError::NameTaken`] if a reserved or active entry claims `name`,
    /// [`TableError::NoFreeSlots`] if the table is full.
    pub fn reserve(&self, name: &str, creator: u32) -> Result<ExclusiveToken<'_, T>, TableError> {
        if name.len() > self.name_cap {
            return Err(TableError::NameTooLong);
        }

        let mut inner = self.inner.lock();
        let len = inner.slots.len();

        if inner
            .slots
            .iter()
            .any(|s| matches!(s.state, State::Reserved | State::Active) && s.name == name)
        {
            return Err(TableError::NameTaken);
        }

        let start = inner.last_alloc;
        let index = (1..=len)
            .map(|off| (start + off) % len)
            .find(|&i| inner.slots[i].state == State::Free)
            .ok_or(TableError::NoFreeSlots)?;

        inner.last_alloc = index;
        let slot = &mut inner.slots[index];
        slot.state = State::Reserved;
        slot.generation = match slot.generation.wrapping_add(1) {
            0 => 1,
            g => g,
        };
        slot.name.clear();
        slot.name.push_str(name);
        slot.creator = creator;
        debug_assert_eq!(slot.refs, 0, "free slot had outstanding references");

        let key = Key::from_raw_parts(index, slot.generation)
            .expect("slot index fits the key width and generation is non-zero");
        tracing::trace!(?key, name, "reserved");

        Ok(ExclusiveToken {
            table: self,
            key,
            done: false,
        })
    }

    /// Acquires a shared token for the entry at `key`.
    ///
    /// # Errors
    ///
    /// [`TableError::Stale`] if the entry is not active or `key`'s generation
    /// does not match the slot's current occupant.
    pub fn shared(&self, key: Key) -> Result<SharedToken<'_, T>, TableError> {
        let mut inner = self.inner.lock();
        let slot = inner.slots.get_mut(key.index()).ok_or(TableError::Stale)?;
        if slot.state != State::Active || !slot.matches(key) {
            return Err(TableError::Stale);
        }

        slot.refs += 1;
        let payload = Arc::clone(slot.payload.as_ref().unwrap_or_else(|| {
            unreachable!("active entry without payload");
        }));

        Ok(SharedToken {
            table: self,
            key,
            payload,
        })
    }

    /// Transitions the entry at `key` from `Active` to `Deleting`, then
    /// blocks until every outstanding shared token has been released.
    ///
    /// While the entry is `Deleting` no new token can be acquired on it, so
    /// once this returns the caller holds the only reference to the payload.
    ///
    /// # Errors
    ///
    /// [`TableError::Stale`] if the entry is not active or the generation
    /// does not match (including when another deleter got there first).
    pub fn begin_delete(&self, key: Key) -> Result<DeleteToken<'_, T>, TableError> {
        let mut inner = self.inner.lock();
        {
            let slot = inner.slots.get_mut(key.index()).ok_or(TableError::Stale)?;
            if slot.state != State::Active || !slot.matches(key) {
                return Err(TableError::Stale);
            }
            slot.state = State::Deleting;
        }

        while inner.slots[key.index()].refs > 0 {
            tracing::trace!(?key, refs = inner.slots[key.index()].refs, "delete waiting");
            self.drained.wait(&mut inner);
        }

        let slot = &mut inner.slots[key.index()];
        debug_assert_eq!(slot.state, State::Deleting);
        let payload = slot.payload.take().unwrap_or_else(|| {
            unreachable!("deleting entry without payload");
        });

        Ok(DeleteToken {
            table: self,
            key,
            payload: Some(payload),
        })
    }

    /// Finds the active entry named `name`.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<Key> {
        let inner = self.inner.lock();
        inner.slots.iter().enumerate().find_map(|(i, slot)| {
            if slot.state == State::Active && slot.name == name {
                Key::from_raw_parts(i, slot.generation)
            } else {
                None
            }
        })
    }

    /// Snapshot of the bookkeeping fields of the active entry at `key`.
    ///
    /// # Errors
    ///
    /// [`TableError::Stale`] if the entry is not active or the generation
    /// does not match.
    pub fn info(&self, key: Key) -> Result<EntryInfo, TableError> {
        let inner = self.inner.lock();
        let slot = inner.slots.get(key.index()).ok_or(TableError::Stale)?;
        if slot.state != State::Active || !slot.matches(key) {
            return Err(TableError::Stale);
        }
        Ok(EntryInfo {
            name: slot.name.clone(),
            creator: slot.creator,
        })
    }

    /// Keys of every currently active entry, in slot order.
    #[must_use]
    pub fn active_keys(&self) -> Vec<Key> {
        let inner = self.inner.lock();
        inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.state == State::Active)
            .filter_map(|(i, s)| Key::from_raw_parts(i, s.generation))
            .collect()
    }
}

impl<T> fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        let active = inner
            .slots
            .iter()
            .filter(|s| s.state == State::Active)
            .count();
        f.debug_struct("Table")
            .field("capacity", &inner.slots.len())
            .field("active", &active)
            .field("name_cap", &self.name_cap)
            .finish()
    }
}

// === impl ExclusiveToken ===

/// Write access to a `Reserved` slot. Commit installs the payload and makes
/// the entry visible; dropping without committing frees the slot again.
#[derive(Debug)]
#[must_use = "dropping an exclusive token aborts the reservation"]
pub struct ExclusiveToken<'t, T> {
    table: &'t Table<T>,
    key: Key,
    done: bool,
}

impl<T> ExclusiveToken<'_, T> {
    /// The key this entry will be visible under once committed.
    #[must_use]
    pub fn key(&self) -> Key {
        self.key
    }

    /// Installs `payload` and transitions the slot to `Active`.
    pub fn commit(mut self, payload: T) -> Key {
        let mut inner = self.table.inner.lock();
        let slot = &mut inner.slots[self.key.index()];
        debug_assert_eq!(slot.state, State::Reserved);
        slot.payload = Some(Arc::new(payload));
        slot.state = State::Active;
        self.done = true;
        tracing::trace!(key = ?self.key, "committed");
        self.key
    }

    /// Returns the slot to `Free`, releasing the claimed name.
    pub fn abort(mut self) {
        self.done = true;
        self.table.release_reservation(self.key);
    }
}

impl<T> Drop for ExclusiveToken<'_, T> {
    fn drop(&mut self) {
        if !self.done {
            self.table.release_reservation(self.key);
        }
    }
}

// === impl SharedToken ===

/// Pins an active entry's payload across a caller operation.
#[derive(Debug)]
pub struct SharedToken<'t, T> {
    table: &'t Table<T>,
    key: Key,
    payload: Arc<T>,
}

impl<T> SharedToken<'_, T> {
    #[must_use]
    pub fn key(&self) -> Key {
        self.key
    }

    /// The payload behind this token. Cloning the `Arc` lets long-lived
    /// internal machinery (e.g. a dispatch thread) keep the payload alive
    /// without holding a token and thereby wedging deletion.
    #[must_use]
    pub fn payload(&self) -> &Arc<T> {
        &self.payload
    }
}

impl<T> core::ops::Deref for SharedToken<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.payload
    }
}

impl<T> Drop for SharedToken<'_, T> {
    fn drop(&mut self) {
        let mut inner = self.table.inner.lock();
        let slot = &mut inner.slots[self.key.index()];
        debug_assert!(slot.refs > 0, "shared token released twice");
        slot.refs -= 1;
        if slot.refs == 0 && slot.state == State::Deleting {
            drop(inner);
            self.table.drained.notify_all();
        }
    }
}

// === impl DeleteToken ===

/// Sole ownership of an entry mid-deletion. The payload has been removed from
/// the slot and no other token can be acquired until the delete resolves.
#[derive(Debug)]
#[must_use = "an unresolved delete token leaves the slot stuck in Deleting"]
pub struct DeleteToken<'t, T> {
    table: &'t Table<T>,
    key: Key,
    payload: Option<Arc<T>>,
}

impl<T> DeleteToken<'_, T> {
    #[must_use]
    pub fn key(&self) -> Key {
        self.key
    }

    /// The payload being deleted. The strong count is one plus any clones the
    /// caller makes; no shared token can exist.
    #[must_use]
    pub fn payload(&self) -> &Arc<T> {
        self.payload.as_ref().unwrap_or_else(|| unreachable!())
    }

    /// Completes the deletion: the slot becomes `Free` and the payload is
    /// dropped.
    pub fn finish(mut self) {
        let payload = self.payload.take();
        {
            let mut inner = self.table.inner.lock();
            let slot = &mut inner.slots[self.key.index()];
            debug_assert_eq!(slot.state, State::Deleting);
            slot.state = State::Free;
            slot.name.clear();
            slot.creator = 0;
        }
        tracing::trace!(key = ?self.key, "deleted");
        drop(payload);
    }

    /// Backs out of the deletion, restoring the entry to `Active` (used when
    /// the underlying resource refused to be torn down).
    pub fn cancel(mut self) {
        let payload = self.payload.take();
        let mut inner = self.table.inner.lock();
        let slot = &mut inner.slots[self.key.index()];
        debug_assert_eq!(slot.state, State::Deleting);
        slot.payload = payload;
        slot.state = State::Active;
    }
}

impl<T> Drop for DeleteToken<'_, T> {
    fn drop(&mut self) {
        // A token abandoned mid-delete (e.g. a panic in the caller) must not
        // wedge the slot; treat it as a completed delete.
        if let Some(payload) = self.payload.take() {
            let mut inner = self.table.inner.lock();
            let slot = &mut inner.slots[self.key.index()];
            if slot.state == State::Deleting {
                slot.state = State::Free;
                slot.name.clear();
                slot.creator = 0;
            }
            drop(inner);
            drop(payload);
        }
    }
}

impl<T> Table<T> {
    fn release_reservation(&self, key: Key) {
        let mut inner = self.inner.lock();
        let slot = &mut inner.slots[key.index()];
        debug_assert_eq!(slot.state, State::Reserved);
        slot.state = State::Free;
        slot.name.clear();
        slot.creator = 0;
        tracing::trace!(?key, "reservation aborted");
    }
}
