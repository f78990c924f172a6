//! # Task Model
//!
//! Defines the task record and the stack buffer it lives in. A task owns no
//! memory of its own: the caller hands [`Scheduler::spawn`] a [`Stack<N>`]
//! buffer, the task record is carved from its low end, the entry closure is
//! parked just under its high end, and whatever remains in between is the
//! task's call stack. The record's address doubles as the task's identity,
//! surfaced to callers as an opaque [`TaskHandle`].
//!
//! ```text
//!  low address                                              high address
//!  ┌───────────────┬────────────────────────────┬─────────┬────────────┐
//!  │  Task record  │      usable stack  ──────► │ closure │ (alignment)│
//!  └───────────────┴────────────────────────────┴─────────┴────────────┘
//!   ▲                                            ▲
//!   handle                                       initial stack top
//! ```
//!
//! [`Scheduler::spawn`]: crate::scheduler::Scheduler::spawn

use core::ptr;

use crate::arch::Context;
use crate::clock::Ticks;
use crate::list::TaskQueue;
use crate::scheduler::Scheduler;

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Execution state of a task.
///
/// ```text
///   ┌─────────┐    dispatch     ┌─────────┐  entry returns  ┌────────┐
///   │  Ready  │ ──────────────► │ Running │ ──────────────► │ Zombie │
///   └─────────┘                 └─────────┘                 └────────┘
///        ▲                           │
///        │   timer expiry / wakeup   │  suspend (sleep, join,
///        │                           ▼  contended lock, event wait)
///        │                      ┌─────────┐
///        └───────────────────── │ Waiting │
///                               └─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// On the run queue, waiting to be dispatched.
    Ready,
    /// Currently executing. Exactly one task per scheduler is `Running`.
    Running,
    /// Blocked on a wait queue and/or the timer queue.
    Waiting,
    /// Entry function returned; the record persists only until joined.
    Zombie,
}

/// How a suspension ended, written by the waker and read by the waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// The awaited condition occurred (event set, mutex handed off, join
    /// target exited).
    Normal,
    /// The wait's deadline expired first.
    TimedOut,
}

// ---------------------------------------------------------------------------
// Task record
// ---------------------------------------------------------------------------

/// Per-task bookkeeping, carved from the low end of the caller's stack
/// buffer. All access goes through raw pointers held by the scheduler and
/// the queues; the record is never moved once placed.
///
/// `ctx` must stay the first field: the context-switch routine passes the
/// resumed context's address through to the entry trampoline, and with
/// `ctx` at offset zero that address *is* the task record.
#[repr(C)]
pub(crate) struct Task {
    /// Saved machine context. Must remain at offset 0.
    pub(crate) ctx: Context,
    pub(crate) state: TaskState,
    pub(crate) wait_result: WaitResult,

    /// Run-queue / wait-queue linkage. A task sits on at most one such
    /// queue; `queue` points back at it (null when unqueued).
    pub(crate) next: *mut Task,
    pub(crate) prev: *mut Task,
    pub(crate) queue: *mut TaskQueue,

    /// Timer-queue linkage, valid only while `in_timer_queue` is set.
    pub(crate) timer_next: *mut Task,
    pub(crate) timer_prev: *mut Task,
    pub(crate) in_timer_queue: bool,
    pub(crate) wake_tick: Ticks,

    /// Tasks blocked in `join` on this task.
    pub(crate) joiners: TaskQueue,

    /// Monomorphized thunk that reads the parked closure out of
    /// `entry_data` and calls it. `None` for the main task, and taken
    /// before the first call so it runs exactly once.
    pub(crate) entry: Option<unsafe fn(*mut u8)>,
    pub(crate) entry_data: *mut u8,

    /// Owning scheduler, so the entry trampoline can re-enter the
    /// dispatch loop when the task returns.
    pub(crate) sched: *const Scheduler,
}

impl Task {
    /// An unlinked, idle record. Used for the main task slot and in unit
    /// tests; `spawn` fills in the interesting fields.
    pub(crate) const fn empty() -> Self {
        Self {
            ctx: Context::ZERO,
            state: TaskState::Ready,
            wait_result: WaitResult::Normal,
            next: ptr::null_mut(),
            prev: ptr::null_mut(),
            queue: ptr::null_mut(),
            timer_next: ptr::null_mut(),
            timer_prev: ptr::null_mut(),
            in_timer_queue: false,
            wake_tick: 0,
            joiners: TaskQueue::new(),
            entry: None,
            entry_data: ptr::null_mut(),
            sched: ptr::null(),
        }
    }
}

// ---------------------------------------------------------------------------
// Caller-owned stack buffer
// ---------------------------------------------------------------------------

/// A correctly aligned stack buffer for one task.
///
/// The buffer is owned by the caller, who must keep it alive and untouched
/// from [`Scheduler::spawn`] until [`Scheduler::join`] on the returned
/// handle completes; after that it may be reused or dropped freely.
///
/// [`Scheduler::spawn`]: crate::scheduler::Scheduler::spawn
/// [`Scheduler::join`]: crate::scheduler::Scheduler::join
#[repr(align(16))]
pub struct Stack<const N: usize>([u8; N]);

impl<const N: usize> Stack<N> {
    pub const fn new() -> Self {
        Self([0u8; N])
    }

    pub(crate) fn base(&mut self) -> *mut u8 {
        self.0.as_mut_ptr()
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }
}

impl<const N: usize> Default for Stack<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Task handle
// ---------------------------------------------------------------------------

/// Opaque identity of a spawned task, valid until the task has been joined
/// and its stack buffer reclaimed by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle(pub(crate) *mut Task);

// Address arithmetic used when carving the task record out of the buffer.

#[inline]
pub(crate) const fn align_up(addr: usize, align: usize) -> usize {
    (addr + align - 1) & !(align - 1)
}

#[inline]
pub(crate) const fn align_down(addr: usize, align: usize) -> usize {
    addr & !(align - 1)
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record() {
        let t = Task::empty();
        assert_eq!(t.state, TaskState::Ready);
        assert!(t.queue.is_null());
        assert!(!t.in_timer_queue);
        assert!(t.entry.is_none());
    }

    #[test]
    fn test_context_is_first_field() {
        // The dispatch trampoline depends on this layout.
        assert_eq!(core::mem::offset_of!(Task, ctx), 0);
    }

    #[test]
    fn test_stack_alignment() {
        let mut s = Stack::<256>::new();
        assert_eq!(s.base() as usize % 16, 0);
        assert_eq!(s.len(), 256);
    }

    #[test]
    fn test_align_helpers() {
        assert_eq!(align_up(17, 16), 32);
        assert_eq!(align_up(32, 16), 32);
        assert_eq!(align_down(47, 16), 32);
        assert_eq!(align_down(48, 16), 48);
    }
}
