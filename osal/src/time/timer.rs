// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Application timers: one-shot or periodic callbacks multiplexed onto a
//! time base.
//!
//! [`create`] provisions a dedicated (hidden) time base whose tick train is
//! programmed by the first [`set`], so simple timers need no explicit time
//! base management. [`add`] binds a timer to an existing base instead; its
//! resolution is that base's tick quantum. Start and interval round *up* to
//! the quantum, never down.

use core::time::Duration;
use std::sync::Arc;

use handle_table::SharedToken;
use parking_lot::Mutex;

use crate::backend::TimeBaseImpl;
use crate::error::{Error, Result};
use crate::id::{ObjectId, ObjectType};
use crate::state::tables;
use crate::task::current_creator;
use crate::time::timebase::{self, TimeBaseObj, TimerCallback};

pub(crate) struct TimerObj {
    pub(crate) timebase: ObjectId,
    /// Set for timers created through [`create`], which own their hidden
    /// base and delete it along with themselves.
    dedicated: bool,
    /// Effective (tick-rounded) schedule, microseconds, for info queries.
    config: Mutex<(u32, u32)>,
}

fn token(id: ObjectId) -> Result<SharedToken<'static, TimerObj>> {
    let key = id.key_as(ObjectType::Timer).ok_or(Error::InvalidId)?;
    Ok(tables().timers.shared(key)?)
}

fn timebase_token(id: ObjectId) -> Result<SharedToken<'static, TimeBaseObj>> {
    let key = id.key_as(ObjectType::TimeBase).ok_or(Error::InvalidId)?;
    Ok(tables().timebases.shared(key)?)
}

/// Creates a timer with a dedicated time base and returns `(id,
/// accuracy_us)`; the accuracy is the expected callback precision in
/// microseconds. The timer does not run until [`set`] programs it.
pub fn create<F>(name: &str, callback: F) -> Result<(ObjectId, u32)>
where
    F: Fn(ObjectId) + Send + Sync + 'static,
{
    let base = timebase::create(name)?;
    match add_inner(name, base, Arc::new(callback), true) {
        Ok(id) => {
            let accuracy = timebase_token(base).map(|tb| timebase::accuracy_us(&tb))?;
            Ok((id, accuracy))
        }
        Err(err) => {
            let _ = timebase::delete(base);
            Err(err)
        }
    }
}

/// Binds a new timer to an existing time base. Its precision is the base's
/// tick quantum, and its callback runs on the base's dispatch thread.
pub fn add<F>(name: &str, timebase_id: ObjectId, callback: F) -> Result<ObjectId>
where
    F: Fn(ObjectId) + Send + Sync + 'static,
{
    add_inner(name, timebase_id, Arc::new(callback), false)
}

fn add_inner(
    name: &str,
    timebase_id: ObjectId,
    callback: TimerCallback,
    dedicated: bool,
) -> Result<ObjectId> {
    // holding the base token across registration keeps a concurrent
    // timebase delete from slipping between the check and the bind
    let base = timebase_token(timebase_id)?;

    let reservation = tables().timers.reserve(name, current_creator())?;
    let key = reservation.commit(TimerObj {
        timebase: timebase_id,
        dedicated,
        config: Mutex::new((0, 0)),
    });
    let id = ObjectId::from_parts(ObjectType::Timer, key);
    base.handler.lock().register(id, callback);
    tracing::debug!(?id, name, ?timebase_id, "timer bound");
    Ok(id)
}

/// Programs the timer: first firing after `start`, then every `interval`
/// (zero interval means one-shot). Both zero is invalid. Times round up to
/// the base's tick quantum.
pub fn set(id: ObjectId, start: Duration, interval: Duration) -> Result<()> {
    if start.is_zero() && interval.is_zero() {
        return Err(Error::TimerInvalidArgs);
    }

    let timer = token(id)?;
    let base = timebase_token(timer.timebase)?;

    let start_us = timebase::as_micros(start);
    let interval_us = timebase::as_micros(interval);

    let (start_ticks, period_ticks, effective) = if timer.dedicated {
        // the hidden base ticks at the timer's own cadence: the first train
        // tick is the first firing, every subsequent tick is a period
        timebase::set(timer.timebase, start, interval)?;
        let period = if interval.is_zero() { 0 } else { 1 };
        (1, period, (start_us, interval_us))
    } else {
        // a shared base has its own quantum; round up, never down
        let quantum = timebase::as_micros(base.source.tick_interval());
        if quantum == 0 {
            return Err(Error::TimerUnavailable);
        }
        let start_ticks = u64::from(start_us.div_ceil(quantum));
        let period_ticks = u64::from(interval_us.div_ceil(quantum));
        let rounded = |ticks: u64| {
            ticks
                .checked_mul(u64::from(quantum))
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(u32::MAX)
        };
        (
            start_ticks,
            period_ticks,
            (rounded(start_ticks), rounded(period_ticks)),
        )
    };

    if !base.handler.lock().arm(id, start_ticks, period_ticks) {
        return Err(Error::TimerInternal);
    }
    // recompute the dispatch target for the new schedule
    base.source.wake();

    *timer.config.lock() = effective;
    Ok(())
}

/// Deletes the timer, unbinding it from its base. A callback currently in
/// flight completes before the binding disappears; a dedicated base is
/// deleted along with the timer.
pub fn delete(id: ObjectId) -> Result<()> {
    let key = id.key_as(ObjectType::Timer).ok_or(Error::InvalidId)?;
    let pending = tables().timers.begin_delete(key)?;

    let (timebase_id, dedicated) = {
        let timer = pending.payload();
        (timer.timebase, timer.dedicated)
    };
    if let Ok(base) = timebase_token(timebase_id) {
        base.handler.lock().unregister(id);
        base.source.wake();
    }
    pending.finish();

    if dedicated {
        timebase::delete(timebase_id)?;
    }
    tracing::debug!(?id, "timer deleted");
    Ok(())
}

pub fn get_id_by_name(name: &str) -> Result<ObjectId> {
    if name.len() > crate::config::MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    tables()
        .timers
        .find_by_name(name)
        .map(|key| ObjectId::from_parts(ObjectType::Timer, key))
        .ok_or(Error::NameNotFound)
}

#[derive(Debug, Clone)]
pub struct TimerInfo {
    pub name: String,
    pub creator: ObjectId,
    /// Effective first-firing delay, microseconds, after tick rounding.
    pub start_us: u32,
    /// Effective period, microseconds, after tick rounding. Zero for
    /// one-shot timers.
    pub interval_us: u32,
    pub accuracy_us: u32,
    pub timebase: ObjectId,
}

pub fn get_info(id: ObjectId) -> Result<TimerInfo> {
    let key = id.key_as(ObjectType::Timer).ok_or(Error::InvalidId)?;
    let token = tables().timers.shared(key)?;
    let entry = tables().timers.info(key)?;
    let accuracy = timebase_token(token.timebase)
        .map(|tb| timebase::accuracy_us(&tb))
        .unwrap_or(crate::config::CLOCK_ACCURACY_US);
    let (start_us, interval_us) = *token.config.lock();
    Ok(TimerInfo {
        name: entry.name,
        creator: ObjectId::from_u32(entry.creator),
        start_us,
        interval_us,
        accuracy_us: accuracy,
        timebase: token.timebase,
    })
}
