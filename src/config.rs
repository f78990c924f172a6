//! # Runtime Configuration
//!
//! Compile-time constants governing the scheduler and task layout.
//! All limits are fixed at compile time — the core performs no dynamic
//! allocation.

/// Scheduler tick frequency. The hosted clock shim and the reference
/// bare-metal port both run at millisecond resolution; ports with a
/// different hardware tick adjust their shim, not this constant's users
/// (all conversions go through [`crate::clock::ms_to_ticks`]).
pub const TICKS_PER_SECOND: u64 = 1_000;

/// Minimum usable stack a task must be left with after the task record
/// and the parked entry closure are carved out of its buffer. Spawning
/// with less is a programmer error and asserts.
pub const MIN_STACK_SIZE: usize = 1024;

/// Default per-task stack size for hosted use. Bare-metal callers size
/// their buffers by hand; hosted callers can afford to be generous.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Stack alignment maintained at task entry. 16 bytes satisfies both the
/// x86-64 System V and AArch64 ABIs and over-satisfies ARM AAPCS.
pub const STACK_ALIGN: usize = 16;

/// Upper bound, in milliseconds, passed to the idle hook when the timer
/// queue is empty and nothing is runnable. Bounding the wait lets idle
/// hooks that pump external event sources re-check them periodically.
pub const IDLE_SLICE_MS: u32 = 100;
