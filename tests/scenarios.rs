//! End-to-end scenarios driving the runtime through its public surface:
//! interleaved sleepers, FIFO mutex handoff, event broadcast, bounded
//! waits, and join-after-exit storage reuse.

use std::cell::RefCell;
use std::time::Instant;

use strand::config::DEFAULT_STACK_SIZE;
use strand::{Event, Mutex, Scheduler, Stack, Timeout};

type TaskStack = Stack<DEFAULT_STACK_SIZE>;

#[test]
fn two_sleepers_interleave() {
    let sched = Scheduler::new();
    unsafe { sched.init_system() };
    let order = RefCell::new(Vec::new());
    let mut sa = TaskStack::new();
    let mut sb = TaskStack::new();
    let started = Instant::now();

    let a = unsafe {
        sched.spawn(&mut sa, || {
            sched.msleep(200);
            order.borrow_mut().push("A");
        })
    };
    let b = unsafe {
        sched.spawn(&mut sb, || {
            sched.msleep(100);
            order.borrow_mut().push("B");
        })
    };
    sched.join(a);
    sched.join(b);

    let elapsed = started.elapsed().as_millis();
    assert_eq!(*order.borrow(), ["B", "A"]);
    // Total wall time tracks the longest sleeper, not the sum.
    assert!(elapsed >= 200, "woke early: {elapsed} ms");
    assert!(elapsed < 1_000, "sleeps did not overlap: {elapsed} ms");
}

#[test]
fn contended_mutex_is_fifo() {
    let sched = Scheduler::new();
    unsafe { sched.init_system() };
    let m = Mutex::new();
    let order = RefCell::new(Vec::new());
    let mut stacks = [TaskStack::new(), TaskStack::new(), TaskStack::new()];

    m.lock(&sched);
    let mut handles = Vec::new();
    for (i, stack) in stacks.iter_mut().enumerate() {
        let (sched, m, order) = (&sched, &m, &order);
        handles.push(unsafe {
            sched.spawn(stack, move || {
                m.lock(sched);
                order.borrow_mut().push(i + 1);
                m.unlock(sched);
            })
        });
    }
    sched.yield_now(); // all three queue up behind the held lock
    m.unlock(&sched);
    for h in handles {
        sched.join(h);
    }
    assert_eq!(*order.borrow(), [1, 2, 3]);
}

#[test]
fn event_set_is_broadcast() {
    let sched = Scheduler::new();
    unsafe { sched.init_system() };
    let e = Event::new();
    let order = RefCell::new(Vec::new());
    let mut s1 = TaskStack::new();
    let mut s2 = TaskStack::new();

    let w1 = unsafe {
        sched.spawn(&mut s1, || {
            e.wait(&sched);
            order.borrow_mut().push("w1");
        })
    };
    let w2 = unsafe {
        sched.spawn(&mut s2, || {
            e.wait(&sched);
            order.borrow_mut().push("w2");
        })
    };
    sched.yield_now(); // let both park
    e.set(&sched);
    sched.join(w1);
    sched.join(w2);

    assert_eq!(*order.borrow(), ["w1", "w2"]);
    // The broadcast left the event unflagged: a fresh bounded wait blocks
    // until its deadline.
    assert_eq!(e.wait_timeout(&sched, 10), Err(Timeout));
}

#[test]
fn unsignalled_wait_times_out() {
    let sched = Scheduler::new();
    unsafe { sched.init_system() };
    let e = Event::new();
    let result = RefCell::new(None);
    let mut s1 = TaskStack::new();
    let started = Instant::now();

    let t = unsafe {
        sched.spawn(&mut s1, || {
            *result.borrow_mut() = Some(e.wait_timeout(&sched, 100));
        })
    };
    sched.join(t);

    let elapsed = started.elapsed().as_millis();
    assert_eq!(*result.borrow(), Some(Err(Timeout)));
    assert!(elapsed >= 100, "timed out early: {elapsed} ms");
    assert!(elapsed < 1_000, "timed out late: {elapsed} ms");
}

#[test]
fn signal_beats_deadline() {
    let sched = Scheduler::new();
    unsafe { sched.init_system() };
    let e = Event::new();
    let result = RefCell::new(None);
    let mut s1 = TaskStack::new();
    let started = Instant::now();

    let t = unsafe {
        sched.spawn(&mut s1, || {
            *result.borrow_mut() = Some(e.wait_timeout(&sched, 1_000));
        })
    };
    sched.msleep(10);
    e.set(&sched);
    sched.join(t);

    // The waiter reported the signal, promptly, and its armed deadline was
    // discarded rather than firing later.
    let elapsed = started.elapsed().as_millis();
    assert_eq!(*result.borrow(), Some(Ok(())));
    assert!(elapsed < 900, "woke via the deadline, not the set: {elapsed} ms");
}

#[test]
fn randomized_mixed_workload_preserves_invariants() {
    // Six tasks walk an LCG-driven mix of suspending operations. The mutex
    // protects an `in_critical` flag that must never be seen raised by a
    // fresh owner, even though owners deliberately suspend while holding
    // the lock.
    let sched = Scheduler::new();
    unsafe { sched.init_system() };
    let m = Mutex::new();
    let e = Event::new();
    let in_critical = RefCell::new(false);
    let completed = RefCell::new(0usize);
    let mut stacks = [
        TaskStack::new(),
        TaskStack::new(),
        TaskStack::new(),
        TaskStack::new(),
        TaskStack::new(),
        TaskStack::new(),
    ];

    let mut handles = Vec::new();
    for (seed, stack) in stacks.iter_mut().enumerate() {
        let (sched, m, e, in_critical, completed) = (&sched, &m, &e, &in_critical, &completed);
        handles.push(unsafe {
            sched.spawn(stack, move || {
                let mut state = (seed as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
                for _ in 0..20 {
                    state = state
                        .wrapping_mul(6364136223846793005)
                        .wrapping_add(1442695040888963407);
                    match (state >> 33) % 4 {
                        0 => sched.yield_now(),
                        1 => sched.msleep((state % 3) as u32 + 1),
                        2 => {
                            m.lock(sched);
                            assert!(!*in_critical.borrow(), "two owners inside the mutex");
                            *in_critical.borrow_mut() = true;
                            // Suspend while holding the lock to tempt others in.
                            sched.yield_now();
                            *in_critical.borrow_mut() = false;
                            m.unlock(sched);
                        }
                        _ => {
                            let _ = e.wait_timeout(sched, (state % 2) as u32 + 1);
                        }
                    }
                }
                *completed.borrow_mut() += 1;
            })
        });
    }

    // Nudge the event occasionally so both wakeup paths get exercised.
    for _ in 0..10 {
        sched.msleep(2);
        e.set(&sched);
    }
    for h in handles {
        sched.join(h);
    }
    assert_eq!(*completed.borrow(), 6);
    assert!(!*in_critical.borrow());
    // The mutex ends indistinguishable from a fresh one.
    m.lock(&sched);
    m.unlock(&sched);
}

#[test]
fn join_after_exit_and_storage_reuse() {
    let sched = Scheduler::new();
    unsafe { sched.init_system() };
    let mut stack = TaskStack::new();

    let t = unsafe { sched.spawn(&mut stack, || {}) };
    sched.yield_now(); // task runs to completion
    let before = Instant::now();
    sched.join(t); // target is already a zombie
    assert!(before.elapsed().as_millis() < 50);

    // The stack buffer is immediately reusable for a fresh task.
    let count = RefCell::new(0);
    let t2 = unsafe {
        sched.spawn(&mut stack, || {
            sched.msleep(10);
            *count.borrow_mut() += 1;
        })
    };
    sched.join(t2);
    assert_eq!(*count.borrow(), 1);
}
