// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Time bases: one tick source, one dispatch thread, many timers.
//!
//! The dispatch thread is the only place timer callbacks ever run, so all
//! callbacks multiplexed onto one base are serialised with each other. The
//! loop waits for the tick that matches the earliest armed deadline (no
//! periodic idle wakeups), advances the base's monotonic tick count,
//! collects due timers and advances their deadlines under the handler
//! mutex, then invokes the callbacks with the mutex released.
//!
//! Deadlines are absolute tick counts derived from the source's epoch, so a
//! periodic timer does not accumulate drift: a late tick makes one callback
//! late but leaves the schedule anchored. When the dispatch falls more than
//! one full period behind, the skipped periods are counted as overruns
//! rather than being silently dropped.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::Arc;
use std::thread::JoinHandle;

use handle_table::SharedToken;
use parking_lot::Mutex;

use crate::backend::{Backend, Platform, TickWait, TimeBaseImpl};
use crate::error::{Error, Result};
use crate::id::{ObjectId, ObjectType};
use crate::state::tables;
use crate::task::current_creator;

pub(crate) type TimerCallback = Arc<dyn Fn(ObjectId) + Send + Sync>;

pub(crate) struct TimeBaseObj {
    pub(crate) source: <Platform as Backend>::TimeBase,
    pub(crate) handler: Mutex<Dispatch>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    dispatcher_thread: Mutex<Option<std::thread::ThreadId>>,
    shutdown: AtomicBool,
    external: bool,
}

/// Bookkeeping guarded by the handler mutex: the tick train configuration
/// and the timers bound to this base, in registration order.
pub(crate) struct Dispatch {
    pub(crate) interval_us: u32,
    /// Monotonic across reprograms.
    pub(crate) ticks: u64,
    /// `ticks` value at the last (re)program; train tick `n` is absolute
    /// tick `train_base + n`.
    train_base: u64,
    reset_pending: bool,
    pub(crate) overruns: u64,
    pub(crate) timers: Vec<Binding>,
}

pub(crate) struct Binding {
    pub(crate) timer: ObjectId,
    pub(crate) callback: TimerCallback,
    pub(crate) armed: bool,
    fired_once: bool,
    /// Absolute deadline in `Dispatch::ticks` units.
    pub(crate) deadline: u64,
    pub(crate) start_ticks: u64,
    pub(crate) period_ticks: u64,
}

fn token(id: ObjectId) -> Result<SharedToken<'static, TimeBaseObj>> {
    let key = id.key_as(ObjectType::TimeBase).ok_or(Error::InvalidId)?;
    Ok(tables().timebases.shared(key)?)
}

/// Creates a time base driven by the platform clock.
pub fn create(name: &str) -> Result<ObjectId> {
    create_inner(name, None)
}

/// Creates a time base whose ticks are produced by `sync`: the dispatch
/// thread calls it and treats each return as one tick.
pub fn create_with_sync<F>(name: &str, sync: F) -> Result<ObjectId>
where
    F: Fn() + Send + Sync + 'static,
{
    create_inner(name, Some(Box::new(sync)))
}

fn create_inner(name: &str, external: Option<crate::backend::ExternalSync>) -> Result<ObjectId> {
    let is_external = external.is_some();
    let reservation = tables().timebases.reserve(name, current_creator())?;
    let source = <Platform as Backend>::TimeBase::create(external)?;

    let key = reservation.commit(TimeBaseObj {
        source,
        handler: Mutex::new(Dispatch {
            interval_us: 0,
            ticks: 0,
            train_base: 0,
            reset_pending: false,
            overruns: 0,
            timers: Vec::new(),
        }),
        dispatcher: Mutex::new(None),
        dispatcher_thread: Mutex::new(None),
        shutdown: AtomicBool::new(false),
        external: is_external,
    });
    let id = ObjectId::from_parts(ObjectType::TimeBase, key);

    // the dispatch thread holds a plain Arc, not a token, so it never blocks
    // deletion by itself
    let payload = Arc::clone(tables().timebases.shared(key)?.payload());
    let thread_payload = Arc::clone(&payload);
    let spawned = std::thread::Builder::new()
        .name(format!("timebase-{name}"))
        .spawn(move || dispatch_loop(id, &thread_payload));
    match spawned {
        Ok(handle) => {
            Platform::promote_dispatcher(&handle);
            *payload.dispatcher_thread.lock() = Some(handle.thread().id());
            *payload.dispatcher.lock() = Some(handle);
        }
        Err(err) => {
            tracing::warn!(%err, name, "dispatch thread spawn failed");
            if let Ok(pending) = tables().timebases.begin_delete(key) {
                pending.finish();
            }
            return Err(Error::TimerInternal);
        }
    }

    tracing::debug!(?id, name, external = is_external, "time base created");
    Ok(id)
}

/// Programs the tick train: first tick after `start`, one tick per
/// `interval` thereafter. Also resets the schedule of every bound timer
/// relative to the current tick count.
pub fn set(id: ObjectId, start: Duration, interval: Duration) -> Result<()> {
    let token = token(id)?;
    if called_from_dispatcher(&token) {
        return Err(Error::Error);
    }
    token.source.program(start, interval)?;
    let mut dispatch = token.handler.lock();
    dispatch.interval_us = as_micros(interval);
    dispatch.reset_pending = true;
    drop(dispatch);
    // the program above already interrupts a clock-driven source; external
    // sources pick the reset up on their next pulse
    Ok(())
}

/// Deletes the time base. Refused while any timer is still bound to it, and
/// refused from its own dispatch thread (a callback cannot join the thread
/// it runs on).
pub fn delete(id: ObjectId) -> Result<()> {
    let key = id.key_as(ObjectType::TimeBase).ok_or(Error::InvalidId)?;
    {
        let token = tables().timebases.shared(key)?;
        if called_from_dispatcher(&token) {
            return Err(Error::Error);
        }
    }

    let pending = tables().timebases.begin_delete(key)?;
    {
        let tb = pending.payload();
        if !tb.handler.lock().timers.is_empty() {
            pending.cancel();
            return Err(Error::Error);
        }
        tb.shutdown.store(true, Ordering::Release);
        tb.source.wake();
        let handle = tb.dispatcher.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        let _ = tb.source.destroy();
    }
    pending.finish();
    tracing::debug!(?id, "time base deleted");
    Ok(())
}

pub fn get_id_by_name(name: &str) -> Result<ObjectId> {
    if name.len() > crate::config::MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    tables()
        .timebases
        .find_by_name(name)
        .map(|key| ObjectId::from_parts(ObjectType::TimeBase, key))
        .ok_or(Error::NameNotFound)
}

#[derive(Debug, Clone)]
pub struct TimeBaseInfo {
    pub name: String,
    pub creator: ObjectId,
    /// Programmed tick interval, in microseconds.
    pub nominal_interval_us: u32,
    /// The tick quantum actually in effect, in microseconds.
    pub accuracy_us: u32,
    pub tick_count: u64,
    pub external_sync: bool,
}

pub fn get_info(id: ObjectId) -> Result<TimeBaseInfo> {
    let key = id.key_as(ObjectType::TimeBase).ok_or(Error::InvalidId)?;
    let token = tables().timebases.shared(key)?;
    let entry = tables().timebases.info(key)?;
    let dispatch = token.handler.lock();
    Ok(TimeBaseInfo {
        name: entry.name,
        creator: ObjectId::from_u32(entry.creator),
        nominal_interval_us: dispatch.interval_us,
        accuracy_us: accuracy_us(&token),
        tick_count: dispatch.ticks,
        external_sync: token.external,
    })
}

/// The tick quantum in microseconds, falling back to the nominal scheduling
/// resolution while the base is unprogrammed.
pub(crate) fn accuracy_us(tb: &TimeBaseObj) -> u32 {
    let quantum = as_micros(tb.source.tick_interval());
    if quantum == 0 {
        crate::config::CLOCK_ACCURACY_US
    } else {
        quantum
    }
}

fn called_from_dispatcher(tb: &TimeBaseObj) -> bool {
    *tb.dispatcher_thread.lock() == Some(std::thread::current().id())
}

pub(crate) fn as_micros(d: Duration) -> u32 {
    u32::try_from(d.as_micros()).unwrap_or(u32::MAX)
}

fn dispatch_loop(id: ObjectId, tb: &Arc<TimeBaseObj>) {
    tracing::trace!(?id, "dispatch thread running");
    loop {
        if tb.shutdown.load(Ordering::Acquire) {
            break;
        }

        // pick the train tick matching the earliest armed deadline
        let target = {
            let mut dispatch = tb.handler.lock();
            if dispatch.reset_pending {
                let now = dispatch.ticks;
                for binding in &mut dispatch.timers {
                    if binding.armed {
                        binding.deadline = now + binding.next_delay();
                    }
                }
                dispatch.reset_pending = false;
                dispatch.train_base = now;
            }

            let next = dispatch
                .timers
                .iter()
                .filter(|b| b.armed)
                .map(|b| b.deadline)
                .min();
            match next {
                // nothing armed: park until a set/delete/shutdown wakes us
                None => 0,
                Some(deadline) => {
                    let elapsed = dispatch.ticks - dispatch.train_base;
                    deadline.saturating_sub(dispatch.train_base).max(elapsed + 1)
                }
            }
        };

        match tb.source.wait_for_tick(target) {
            TickWait::Interrupted => continue,
            TickWait::Tick(train_now) => {
                let due = collect_due(tb, train_now);
                // handler mutex is released while callbacks run
                for (timer, callback) in due {
                    callback(timer);
                }
            }
        }
    }
    tracing::trace!(?id, "dispatch thread stopped");
}

/// Advances the tick count to the arrived train tick and harvests every due
/// timer, advancing periodic deadlines (accounting overruns past one missed
/// period) and disarming completed one-shots.
fn collect_due(tb: &TimeBaseObj, train_now: u64) -> Vec<(ObjectId, TimerCallback)> {
    let mut dispatch = tb.handler.lock();

    let absolute = dispatch.train_base.saturating_add(train_now);
    if absolute > dispatch.ticks {
        dispatch.ticks = absolute;
    } else {
        // an external pulse or a stale train tick still advances time
        dispatch.ticks += 1;
    }
    let now = dispatch.ticks;

    let mut due = Vec::new();
    let mut overruns = 0;
    for binding in &mut dispatch.timers {
        if !binding.armed || binding.deadline > now {
            continue;
        }
        due.push((binding.timer, Arc::clone(&binding.callback)));
        binding.fired_once = true;

        if binding.period_ticks > 0 {
            binding.deadline += binding.period_ticks;
            if binding.deadline <= now {
                let missed = (now - binding.deadline) / binding.period_ticks + 1;
                binding.deadline += missed * binding.period_ticks;
                overruns += missed;
            }
        } else {
            binding.armed = false;
        }
    }
    dispatch.overruns += overruns;
    if overruns > 0 {
        tracing::warn!(overruns, tick = now, "timer dispatch fell behind");
    }

    due
}

impl Binding {
    /// Ticks from "now" to the next firing when (re)arming.
    fn next_delay(&self) -> u64 {
        if !self.fired_once && self.start_ticks > 0 {
            self.start_ticks
        } else {
            self.period_ticks.max(1)
        }
    }
}

impl Dispatch {
    /// Registers a timer with this base, initially disarmed. Callbacks fire
    /// in registration order when several timers share a tick.
    pub(crate) fn register(&mut self, timer: ObjectId, callback: TimerCallback) {
        self.timers.push(Binding {
            timer,
            callback,
            armed: false,
            fired_once: false,
            deadline: 0,
            start_ticks: 0,
            period_ticks: 0,
        });
    }

    pub(crate) fn unregister(&mut self, timer: ObjectId) {
        self.timers.retain(|b| b.timer != timer);
    }

    /// (Re)arms a registered timer. Returns `false` if the timer is not
    /// bound to this base.
    pub(crate) fn arm(&mut self, timer: ObjectId, start_ticks: u64, period_ticks: u64) -> bool {
        let now = self.ticks;
        for binding in &mut self.timers {
            if binding.timer != timer {
                continue;
            }
            binding.start_ticks = start_ticks;
            binding.period_ticks = period_ticks;
            binding.armed = true;
            binding.fired_once = false;
            binding.deadline = now
                + if start_ticks > 0 {
                    start_ticks
                } else {
                    period_ticks.max(1)
                };
            return true;
        }
        false
    }

}
