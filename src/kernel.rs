//! # Kernel
//!
//! The global single-scheduler surface, for programs — embedded firmware
//! above all — that want the runtime as a set of free functions rather
//! than a value they thread around. Hosted code that prefers explicit
//! handles can ignore this module and hold a [`Scheduler`] directly; both
//! surfaces share the same core.
//!
//! ## Startup sequence
//!
//! ```text
//! main()
//!   ├─► kernel::init()          ← caller's context becomes the main task
//!   ├─► kernel::spawn(stack, f) ← register tasks (×N)
//!   └─► kernel::join(handle)    ← main task blocks; tasks run
//! ```
//!
//! The runtime is cooperative and single-context: everything behind this
//! module must be driven from the one thread (or bare-metal main context)
//! that called [`init`]. Driving it from a second OS thread is a
//! programmer error this module cannot detect.

use core::cell::UnsafeCell;

use crate::scheduler::Scheduler;
use crate::task::{Stack, TaskHandle};

// ---------------------------------------------------------------------------
// Global scheduler instance
// ---------------------------------------------------------------------------

struct KernelCell(UnsafeCell<Scheduler>);

// Safety: the scheduler itself is single-threaded by contract (see the
// module docs); this impl only lets the static exist. All mutation goes
// through the scheduler's own interior-mutability discipline.
unsafe impl Sync for KernelCell {}

static KERNEL: KernelCell = KernelCell(UnsafeCell::new(Scheduler::new()));

/// The global scheduler. Needed to use the [`crate::sync`] primitives with
/// the kernel surface: `mutex.lock(kernel::scheduler())`.
pub fn scheduler() -> &'static Scheduler {
    // Safety: the static never moves, so the address-stability contract of
    // `init_system` holds for it by construction.
    unsafe { &*KERNEL.0.get() }
}

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Initialize the runtime and designate the caller as the main task. Call
/// once, before any other kernel function.
///
/// # Panics
/// If called twice.
pub fn init() {
    // Safety: a static scheduler satisfies the no-move requirement.
    unsafe { scheduler().init_system() }
}

/// Spawn a task on the given stack buffer. See [`Scheduler::spawn`].
///
/// # Safety
/// As for [`Scheduler::spawn`]: the buffer must stay alive and untouched
/// until [`join`] on the returned handle completes, and everything the
/// closure borrows must outlive the task.
pub unsafe fn spawn<F, const N: usize>(stack: &mut Stack<N>, f: F) -> TaskHandle
where
    F: FnOnce(),
{
    scheduler().spawn(stack, f)
}

/// Suspend until the given task has exited. See [`Scheduler::join`].
pub fn join(handle: TaskHandle) {
    scheduler().join(handle)
}

/// Reschedule behind all currently runnable tasks.
pub fn yield_now() {
    scheduler().yield_now()
}

/// Suspend the current task for at least `ms` milliseconds.
pub fn msleep(ms: u32) {
    scheduler().msleep(ms)
}

/// Suspend the current task for at least `secs` seconds.
pub fn sleep(secs: u32) {
    scheduler().sleep(secs)
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_STACK_SIZE;
    use crate::sync::Event;
    use std::cell::RefCell;

    // The global instance exists once per process, so this module keeps to
    // a single test; everything else exercises per-instance schedulers.
    #[test]
    fn test_kernel_surface_end_to_end() {
        init();
        let order = RefCell::new(Vec::new());
        let e = Event::new();
        let mut s1 = Stack::<DEFAULT_STACK_SIZE>::new();
        let mut s2 = Stack::<DEFAULT_STACK_SIZE>::new();

        let h1 = unsafe {
            spawn(&mut s1, || {
                e.wait(scheduler());
                order.borrow_mut().push("woken");
            })
        };
        let h2 = unsafe {
            spawn(&mut s2, || {
                msleep(10);
                order.borrow_mut().push("slept");
            })
        };
        yield_now();
        e.set(scheduler());
        join(h1);
        join(h2);
        assert_eq!(*order.borrow(), ["woken", "slept"]);
    }
}
