//! # Scheduler
//!
//! The dispatch loop and the task lifecycle operations built on it. One
//! [`Scheduler`] multiplexes any number of tasks over the single execution
//! context that initialized it.
//!
//! ## Dispatch loop
//!
//! Whenever the running task suspends, the dispatch loop runs:
//!
//! 1. Move every timer-queue entry whose deadline has passed to the run
//!    queue, unlinking each from whatever wait queue also held it and
//!    stamping its wait result as timed out.
//! 2. If the run queue is non-empty, pop its head and switch to it (or
//!    return immediately if the head is the suspending task itself).
//! 3. Otherwise call the platform idle hook, bounded by the time until the
//!    next deadline, and loop.
//!
//! ## Re-entrancy
//!
//! Every operation takes `&self`: while one task sits suspended inside
//! `join` or `msleep`, the task that replaced it re-enters the scheduler
//! through its own shared reference. All mutable state is therefore held
//! in `Cell`s or reached through raw task pointers, and the type is
//! `!Send`/`!Sync`, which pins each instance to one thread of execution —
//! exactly the concurrency model the runtime promises.

use core::cell::{Cell, UnsafeCell};
use core::mem;
use core::ptr;

use log::{debug, info, trace};

use crate::arch::{self, Context};
use crate::clock::{ms_to_ticks, ticks_at_or_before, ticks_to_ms, Platform, Ticks};
use crate::config::{IDLE_SLICE_MS, MIN_STACK_SIZE, STACK_ALIGN};
use crate::list::TaskQueue;
use crate::task::{align_down, align_up, Stack, Task, TaskHandle, TaskState, WaitResult};
use crate::timer::TimerQueue;

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Cooperative scheduler for one execution context.
///
/// Holds the run queue, the timer queue, the current-task pointer, and the
/// record for the *main task* — the context of whoever called
/// [`init_system`](Self::init_system). The scheduler owns none of the other
/// task records; they live in caller-provided stack buffers and are linked
/// in intrusively.
pub struct Scheduler {
    /// FIFO of `Ready` tasks.
    run_queue: TaskQueue,
    /// Pending deadlines, earliest first.
    timers: TimerQueue,
    /// The `Running` task. Null until `init_system`.
    current: Cell<*mut Task>,
    /// Task record for the initial caller's context.
    main_task: UnsafeCell<Task>,
    /// Clock and idle shims.
    platform: Platform,
}

impl Scheduler {
    /// Scheduler with explicit platform shims. This is the hook for
    /// integration layers: wrap the default `idle` with one that pumps an
    /// external event source, and tasks can be woken by I/O completions.
    pub const fn with_platform(platform: Platform) -> Self {
        Self {
            run_queue: TaskQueue::new(),
            timers: TimerQueue::new(),
            current: Cell::new(ptr::null_mut()),
            main_task: UnsafeCell::new(Task::empty()),
            platform,
        }
    }

    /// Scheduler with this target's default clock and idle shims.
    #[cfg(any(feature = "std", target_os = "none"))]
    pub const fn new() -> Self {
        Self::with_platform(Platform::DEFAULT)
    }

    /// Designate the calling context as the main task and make the
    /// scheduler operational.
    ///
    /// # Safety
    /// The scheduler must not move in memory after this call: task records
    /// hold its address, and the main task's record lives inside it. Keep
    /// it in place (a local that is never moved out of, or a `static`)
    /// until every spawned task has been joined.
    ///
    /// # Panics
    /// If called twice.
    pub unsafe fn init_system(&self) {
        assert!(
            self.current.get().is_null(),
            "scheduler already initialized"
        );
        let main = self.main_task.get();
        (*main).state = TaskState::Running;
        (*main).sched = self as *const Scheduler;
        self.current.set(main);
        info!("scheduler up; caller is the main task");
    }

    /// Current monotonic tick count, via the platform shim.
    pub fn now(&self) -> Ticks {
        (self.platform.now)()
    }

    // -----------------------------------------------------------------------
    // Task lifecycle
    // -----------------------------------------------------------------------

    /// Spawn a task running `f` on the given stack buffer. The new task is
    /// appended to the run queue; the spawner keeps running.
    ///
    /// The task record and the closure itself are both placed inside
    /// `stack`, so the runtime allocates nothing. The returned handle is
    /// the record's identity and stays valid until [`join`](Self::join)
    /// returns.
    ///
    /// # Safety
    /// The caller must keep `stack` alive and untouched until `join` on
    /// the returned handle completes, and must not drop the scheduler
    /// while the task is live. `f` runs on the same thread, but the
    /// compiler cannot see through the stack switch — anything it borrows
    /// must outlive the task.
    ///
    /// # Panics
    /// If the buffer is too small to hold the task record, the closure,
    /// and [`MIN_STACK_SIZE`] bytes of stack.
    pub unsafe fn spawn<F, const N: usize>(&self, stack: &mut Stack<N>, f: F) -> TaskHandle
    where
        F: FnOnce(),
    {
        assert!(!self.current.get().is_null(), "scheduler not initialized");

        let base = stack.base() as usize;
        let task_addr = align_up(base, mem::align_of::<Task>());
        let record_end = task_addr + mem::size_of::<Task>();

        // Park the entry closure just under the buffer top; the stack top
        // goes below it, re-aligned for the ABI.
        let top = align_down(base + N, STACK_ALIGN);
        let data = align_down(
            top.saturating_sub(mem::size_of::<F>()),
            mem::align_of::<F>(),
        );
        let stack_top = align_down(data, STACK_ALIGN);
        assert!(
            stack_top > record_end && stack_top - record_end >= MIN_STACK_SIZE,
            "stack buffer too small"
        );

        ptr::write(data as *mut F, f);

        let task = task_addr as *mut Task;
        ptr::write(task, Task::empty());
        (*task).ctx = Context::prepare(stack_top as *mut u8, task_trampoline);
        (*task).entry = Some(invoke_closure::<F>);
        (*task).entry_data = data as *mut u8;
        (*task).sched = self as *const Scheduler;
        (*task).state = TaskState::Ready;
        self.run_queue.push_back(task);

        info!("task {:p} spawned", task);
        debug!(
            "task {:p} stack {:#x}..{:#x} ({} usable bytes)",
            task,
            record_end,
            stack_top,
            stack_top - record_end
        );
        TaskHandle(task)
    }

    /// Suspend until the target task's entry function has returned.
    /// Returns immediately if it already has. Multiple tasks may join the
    /// same target; all are woken together, in join order.
    ///
    /// After `join` returns the target's stack buffer may be reused.
    ///
    /// # Panics
    /// If a task joins itself.
    pub fn join(&self, handle: TaskHandle) {
        let cur = self.cur();
        let target = handle.0;
        assert!(target != cur, "a task cannot join itself");
        unsafe {
            if (*target).state == TaskState::Zombie {
                return;
            }
            (*cur).state = TaskState::Waiting;
            (*target).joiners.push_back(cur);
            self.schedule();
        }
    }

    /// Go to the back of the run queue, behind every currently runnable
    /// peer, and dispatch.
    pub fn yield_now(&self) {
        let cur = self.cur();
        unsafe {
            (*cur).state = TaskState::Ready;
            self.run_queue.push_back(cur);
        }
        self.schedule();
    }

    /// Suspend for at least `ms` milliseconds.
    pub fn msleep(&self, ms: u32) {
        let cur = self.cur();
        unsafe {
            (*cur).state = TaskState::Waiting;
            self.timers
                .insert(cur, self.now().wrapping_add(ms_to_ticks(ms)));
            self.schedule();
        }
    }

    /// Suspend for at least `secs` seconds.
    pub fn sleep(&self, secs: u32) {
        self.msleep(secs.saturating_mul(1_000));
    }

    // -----------------------------------------------------------------------
    // Internals shared with the sync primitives
    // -----------------------------------------------------------------------

    pub(crate) fn current_ptr(&self) -> *mut Task {
        self.cur()
    }

    /// Park the current task on `waiters`, optionally arming a deadline,
    /// and dispatch. Both links are placed before any switch happens, so
    /// the wakeup paths (waker and timer) each see the other's link and
    /// can clear it — whichever fires first wins and the loser is a no-op.
    ///
    /// # Safety
    /// `waiters` must outlive the wait.
    pub(crate) unsafe fn block_current(
        &self,
        waiters: &TaskQueue,
        timeout_ms: Option<u32>,
    ) -> WaitResult {
        let cur = self.cur();
        (*cur).state = TaskState::Waiting;
        waiters.push_back(cur);
        if let Some(ms) = timeout_ms {
            self.timers
                .insert(cur, self.now().wrapping_add(ms_to_ticks(ms)));
        }
        self.schedule();
        (*cur).wait_result
    }

    /// Move a blocked task (already unlinked from its wait queue) to the
    /// run queue, cancelling any pending deadline.
    ///
    /// # Safety
    /// `task` must be live, `Waiting`, and off every wait queue.
    pub(crate) unsafe fn make_runnable(&self, task: *mut Task, result: WaitResult) {
        debug_assert!((*task).queue.is_null());
        self.timers.cancel(task);
        (*task).wait_result = result;
        (*task).state = TaskState::Ready;
        self.run_queue.push_back(task);
    }

    /// Terminal path for a finished task: mark it `Zombie`, release its
    /// joiners, and dispatch away for good. The task's context is never
    /// resumed again; its storage is the caller's to reclaim after join.
    pub(crate) fn exit_current(&self) -> ! {
        let cur = self.cur();
        unsafe {
            (*cur).state = TaskState::Zombie;
            while let Some(joiner) = (*cur).joiners.pop_front() {
                self.make_runnable(joiner, WaitResult::Normal);
            }
        }
        info!("task {:p} exited", cur);
        loop {
            self.schedule();
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// The dispatch loop. Called with the current task already parked
    /// wherever it belongs (run queue tail, a wait queue, the timer queue,
    /// or nowhere if it exited). Returns once the current task is resumed.
    pub(crate) fn schedule(&self) {
        let cur = self.cur();
        loop {
            self.expire_timers();
            if let Some(next) = unsafe { self.run_queue.pop_front() } {
                unsafe {
                    (*next).state = TaskState::Running;
                    if next == cur {
                        return;
                    }
                    self.current.set(next);
                    trace!("switch {:p} -> {:p}", cur, next);
                    arch::switch(
                        ptr::addr_of_mut!((*cur).ctx),
                        ptr::addr_of_mut!((*next).ctx),
                    );
                    // Back from suspension; whoever resumed us has already
                    // restored the current pointer and our Running state.
                }
                return;
            }
            let max_ms = self.idle_limit();
            if max_ms > 0 {
                trace!("idle for up to {} ms", max_ms);
                (self.platform.idle)(max_ms);
            }
        }
    }

    /// Sweep expired deadlines onto the run queue, in deadline order
    /// (insertion order for equal deadlines). An expired waiter is
    /// unlinked from its wait queue here, so a later waker skips it.
    fn expire_timers(&self) {
        let now = self.now();
        unsafe {
            while let Some(task) = self.timers.pop_expired(now) {
                let queue = (*task).queue;
                if !queue.is_null() {
                    (*queue).remove(task);
                }
                (*task).wait_result = WaitResult::TimedOut;
                (*task).state = TaskState::Ready;
                self.run_queue.push_back(task);
                trace!("deadline hit for task {:p}", task);
            }
        }
    }

    /// Milliseconds the idle hook may block: until the next deadline, or
    /// one idle slice when no deadline is pending (so idle hooks that pump
    /// external event sources keep getting polled).
    fn idle_limit(&self) -> u32 {
        match self.timers.next_wake() {
            Some(wake) => {
                let now = self.now();
                if ticks_at_or_before(wake, now) {
                    0
                } else {
                    ticks_to_ms(wake.wrapping_sub(now)).min(u32::MAX as u64) as u32
                }
            }
            None => IDLE_SLICE_MS,
        }
    }

    fn cur(&self) -> *mut Task {
        let cur = self.current.get();
        assert!(!cur.is_null(), "scheduler not initialized");
        cur
    }
}

#[cfg(any(feature = "std", target_os = "none"))]
impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Task entry trampoline
// ---------------------------------------------------------------------------

/// First code a fresh task executes. The arch layer guarantees `ctx` is
/// the resumed context's address, which is the task record itself (the
/// context is the record's first field).
extern "C" fn task_trampoline(_prev: *mut Context, ctx: *mut Context) -> ! {
    let task = ctx.cast::<Task>();
    let (sched, entry, data) = unsafe {
        let Some(entry) = (*task).entry.take() else {
            unreachable!()
        };
        (&*(*task).sched, entry, (*task).entry_data)
    };

    #[cfg(feature = "std")]
    {
        use std::panic::{catch_unwind, AssertUnwindSafe};
        if catch_unwind(AssertUnwindSafe(|| unsafe { entry(data) })).is_err() {
            log::error!("task {:p} panicked; treating it as returned", task);
        }
    }
    #[cfg(not(feature = "std"))]
    unsafe {
        entry(data)
    };

    sched.exit_current()
}

/// Monomorphized per spawn call: moves the parked closure off the task
/// stack and runs it.
unsafe fn invoke_closure<F: FnOnce()>(data: *mut u8) {
    let f: F = ptr::read(data.cast::<F>());
    f();
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
