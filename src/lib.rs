//! # strand — stackful cooperative multitasking
//!
//! A cooperative runtime that multiplexes many long-running activities over a
//! single execution context. Each task is an ordinary straight-line function
//! with its own caller-provided stack; it runs until it voluntarily suspends
//! (yield, sleep, join, lock a contended mutex, wait for an event), at which
//! point the scheduler switches to the next runnable task.
//!
//! The same core serves hosted processes (x86-64 and AArch64) and bare-metal
//! ARMv7-M microcontrollers: only the context-switch routine, the tick
//! source, and the idle hook differ per target.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                   Application Tasks                     │
//! ├────────────────────────────────────────────────────────┤
//! │                Kernel API (kernel.rs)                   │
//! │    init() · spawn() · join() · yield_now() · msleep()   │
//! ├──────────────┬────────────────────┬────────────────────┤
//! │  Scheduler   │   Timer Queue      │  Sync Primitives   │
//! │  scheduler.rs│   timer.rs         │  sync.rs           │
//! │  ─ dispatch  │   ─ insert()       │  ─ Mutex (handoff) │
//! │  ─ spawn()   │   ─ cancel()       │  ─ Event (level)   │
//! │  ─ join()    │   ─ expire()       │                    │
//! ├──────────────┴────────────────────┴────────────────────┤
//! │       Task Model (task.rs) · Wait Queues (list.rs)      │
//! │       Task record · Stack<N> · intrusive FIFO links     │
//! ├────────────────────────────────────────────────────────┤
//! │       Clock + Idle Shims (clock.rs)                     │
//! ├────────────────────────────────────────────────────────┤
//! │       Arch Port (arch/) — context make/jump             │
//! │       x86_64 · aarch64 · ARMv7-M                        │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scheduling model
//!
//! - Single-threaded and cooperative: no preemption, no task migration. A
//!   task keeps the CPU until it calls a suspending operation.
//! - FIFO everywhere: the run queue, every wait queue, and timer ties all
//!   wake in arrival order. A yielding task goes behind all runnable peers.
//! - Timeouts ride a sorted timer queue. A bounded wait links the task on
//!   both its wait queue and the timer queue; whichever wakeup fires first
//!   unlinks it from both, so the loser is a no-op.
//! - Mutexes release by direct handoff: ownership transfers to the head
//!   waiter without ever being observable as free in between.
//!
//! ## Memory model
//!
//! - **No heap**: the core allocates nothing. Each task lives entirely inside
//!   a stack buffer supplied by the caller ([`Stack<N>`](task::Stack)); the
//!   task record is carved from one end, the usable stack is the rest.
//! - The caller keeps the buffer alive until [`Scheduler::join`] returns,
//!   then may reuse it immediately.
//! - Queue membership is via intrusive links in the task record, so queue
//!   operations never allocate either.
//!
//! ## One scheduler per thread
//!
//! A [`Scheduler`] instance is pinned to the OS thread (or the bare-metal
//! main context) that initialized it. The type holds raw task pointers and is
//! deliberately `!Send`/`!Sync`. Hosted code passes a `&Scheduler` around;
//! embedded code uses the static instance behind the [`kernel`] module.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod arch;
pub mod clock;
pub mod config;
pub(crate) mod list;
pub mod scheduler;
pub mod sync;
pub mod task;
pub(crate) mod timer;

#[cfg(any(feature = "std", target_os = "none"))]
pub mod kernel;

pub use clock::{Platform, Ticks};
pub use scheduler::Scheduler;
pub use sync::{Event, Mutex, Timeout};
pub use task::{Stack, TaskHandle, TaskState, WaitResult};
