//! # Synchronization Primitives
//!
//! A mutex with direct ownership handoff and a level-triggered event, both
//! built from a FIFO wait queue plus the scheduler's block/wake internals.
//! Storage is caller-owned and initialized in place with `const fn new()`;
//! there is nothing to tear down as long as no task is waiting when the
//! value is dropped.
//!
//! Neither primitive is `Send` or `Sync`: like every task they guard, they
//! belong to a single scheduler on a single thread of execution.

use core::cell::Cell;
use core::fmt;
use core::ptr;

use log::trace;

use crate::list::TaskQueue;
use crate::scheduler::Scheduler;
use crate::task::{Task, WaitResult};

/// A bounded wait ended by its deadline instead of its condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout;

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("wait timed out")
    }
}

// ---------------------------------------------------------------------------
// Mutex
// ---------------------------------------------------------------------------

/// Cooperative mutex with FIFO waiters and direct handoff.
///
/// Releasing a contended mutex transfers ownership straight to the head
/// waiter — the lock is never observable as free in between, so there is
/// no retry loop and no way for a late arrival to steal the lock. The
/// releaser keeps running; the new owner resumes at its turn in the run
/// queue.
///
/// Locking is not recursive: a second `lock` by the owner is a programmer
/// error and asserts.
pub struct Mutex {
    /// Owning task, or null when free. Invariant: if null, `waiters` is
    /// empty.
    owner: Cell<*mut Task>,
    waiters: TaskQueue,
}

impl Mutex {
    pub const fn new() -> Self {
        Self {
            owner: Cell::new(ptr::null_mut()),
            waiters: TaskQueue::new(),
        }
    }

    /// Acquire the mutex, suspending while another task holds it. When
    /// this returns, the current task is the owner.
    pub fn lock(&self, sched: &Scheduler) {
        let cur = sched.current_ptr();
        if self.owner.get().is_null() {
            debug_assert!(self.waiters.is_empty());
            self.owner.set(cur);
            trace!("mutex {:p} locked by {:p}", self, cur);
            return;
        }
        assert!(
            self.owner.get() != cur,
            "mutex locked twice by the same task"
        );
        trace!("mutex {:p}: {:p} waiting", self, cur);
        let _result = unsafe { sched.block_current(&self.waiters, None) };
        // Woken only by the handoff in `unlock`, which made us the owner.
        debug_assert_eq!(_result, WaitResult::Normal);
        debug_assert_eq!(self.owner.get(), cur);
    }

    /// Release the mutex. With waiters queued, ownership passes to the
    /// head waiter, which becomes runnable; otherwise the mutex is free.
    ///
    /// # Panics
    /// If the current task is not the owner.
    pub fn unlock(&self, sched: &Scheduler) {
        let cur = sched.current_ptr();
        assert!(
            self.owner.get() == cur,
            "mutex unlocked by a task that does not own it"
        );
        match unsafe { self.waiters.pop_front() } {
            Some(next) => {
                self.owner.set(next);
                trace!("mutex {:p} handed off to {:p}", self, next);
                unsafe { sched.make_runnable(next, WaitResult::Normal) };
            }
            None => {
                self.owner.set(ptr::null_mut());
                trace!("mutex {:p} released", self);
            }
        }
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Level-triggered event flag with FIFO waiters and broadcast wakeup.
///
/// `set` with no waiters leaves the flag raised until the next `wait`
/// consumes it; `set` with waiters wakes *all* of them and leaves the flag
/// down. Invariant: the flag is never raised while tasks wait (a waiter
/// arriving at a raised flag consumes it immediately).
pub struct Event {
    flagged: Cell<bool>,
    waiters: TaskQueue,
}

impl Event {
    pub const fn new() -> Self {
        Self {
            flagged: Cell::new(false),
            waiters: TaskQueue::new(),
        }
    }

    /// Raise the event. Every queued waiter is released, in wait order;
    /// with nobody waiting the flag stays raised for the next `wait`.
    /// Setting an already-raised event is a no-op. Does not suspend.
    pub fn set(&self, sched: &Scheduler) {
        if self.waiters.is_empty() {
            self.flagged.set(true);
            trace!("event {:p} flagged", self);
            return;
        }
        debug_assert!(!self.flagged.get());
        while let Some(waiter) = unsafe { self.waiters.pop_front() } {
            trace!("event {:p} wakes {:p}", self, waiter);
            unsafe { sched.make_runnable(waiter, WaitResult::Normal) };
        }
    }

    /// Consume the flag, suspending until it is raised if it is not yet.
    pub fn wait(&self, sched: &Scheduler) {
        if self.flagged.get() {
            self.flagged.set(false);
            return;
        }
        let _result = unsafe { sched.block_current(&self.waiters, None) };
        debug_assert_eq!(_result, WaitResult::Normal);
    }

    /// Like [`wait`](Self::wait), but give up after `ms` milliseconds.
    ///
    /// Whichever wakeup fires first — the `set` or the deadline — wins and
    /// unlinks the task from the other queue, so a timed-out waiter is
    /// never woken twice and a signalled waiter's deadline is dropped.
    pub fn wait_timeout(&self, sched: &Scheduler, ms: u32) -> Result<(), Timeout> {
        if self.flagged.get() {
            self.flagged.set(false);
            return Ok(());
        }
        match unsafe { sched.block_current(&self.waiters, Some(ms)) } {
            WaitResult::Normal => Ok(()),
            WaitResult::TimedOut => Err(Timeout),
        }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
