//! Sorted timer queue driving sleeps and bounded waits.
//!
//! A doubly-linked list of task records ordered by `wake_tick`, earliest
//! first, using the dedicated `timer_next`/`timer_prev` links so a task can
//! be on a wait queue and the timer queue at once. Ties wake in insertion
//! order, which is what gives bounded waits their FIFO guarantee when
//! several deadlines land on the same tick.
//!
//! A linear insertion scan is deliberate: the expected population is the
//! handful of concurrently sleeping tasks on a small system. The interface
//! (`insert` / `cancel` / `pop_expired`) would be unchanged by a heap or
//! hierarchical wheel if a port ever needs one.

use core::cell::Cell;
use core::ptr;

use crate::clock::{ticks_at_or_before, ticks_before, Ticks};
use crate::task::Task;

pub(crate) struct TimerQueue {
    head: Cell<*mut Task>,
}

impl TimerQueue {
    pub(crate) const fn new() -> Self {
        Self {
            head: Cell::new(ptr::null_mut()),
        }
    }

    /// Earliest pending deadline, if any.
    pub(crate) fn next_wake(&self) -> Option<Ticks> {
        let head = self.head.get();
        if head.is_null() {
            None
        } else {
            Some(unsafe { (*head).wake_tick })
        }
    }

    /// Schedule `task` to expire at `wake_tick`. Equal deadlines keep
    /// insertion order.
    ///
    /// # Safety
    /// `task` must be live and not already on the timer queue.
    pub(crate) unsafe fn insert(&self, task: *mut Task, wake_tick: Ticks) {
        debug_assert!(!(*task).in_timer_queue);
        (*task).wake_tick = wake_tick;

        // Walk past every entry due at or before the new deadline.
        let mut prev: *mut Task = ptr::null_mut();
        let mut cursor = self.head.get();
        while !cursor.is_null() && ticks_at_or_before((*cursor).wake_tick, wake_tick) {
            prev = cursor;
            cursor = (*cursor).timer_next;
        }

        (*task).timer_prev = prev;
        (*task).timer_next = cursor;
        if prev.is_null() {
            self.head.set(task);
        } else {
            (*prev).timer_next = task;
        }
        if !cursor.is_null() {
            (*cursor).timer_prev = task;
        }
        (*task).in_timer_queue = true;
    }

    /// Drop `task`'s pending deadline if it has one. Idempotent, so wakeup
    /// paths can call it unconditionally.
    ///
    /// # Safety
    /// `task` must be live.
    pub(crate) unsafe fn cancel(&self, task: *mut Task) {
        if !(*task).in_timer_queue {
            return;
        }
        let next = (*task).timer_next;
        let prev = (*task).timer_prev;
        if prev.is_null() {
            self.head.set(next);
        } else {
            (*prev).timer_next = next;
        }
        if !next.is_null() {
            (*next).timer_prev = prev;
        }
        (*task).timer_next = ptr::null_mut();
        (*task).timer_prev = ptr::null_mut();
        (*task).in_timer_queue = false;
    }

    /// Detach and return the earliest entry whose deadline is at or before
    /// `now`, or `None` when nothing is due.
    ///
    /// # Safety
    /// Every queued task must still be live.
    pub(crate) unsafe fn pop_expired(&self, now: Ticks) -> Option<*mut Task> {
        let head = self.head.get();
        if head.is_null() || ticks_before(now, (*head).wake_tick) {
            return None;
        }
        self.cancel(head);
        Some(head)
    }
}
