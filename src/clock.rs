//! # Clock and Platform Shims
//!
//! The scheduler's only contact with the outside world: a monotonic tick
//! source and an idle hook, bundled as a [`Platform`] value of plain
//! function pointers so integration layers can swap either without
//! touching the core.
//!
//! Ticks may wrap. All ordering comparisons therefore go through
//! [`ticks_before`]/[`ticks_at_or_before`], which use signed wrapping
//! difference; correctness only requires that no task sleeps for more
//! than half the tick range, which at millisecond resolution is not a
//! practical concern.

use crate::config::TICKS_PER_SECOND;

/// Monotonic tick count. See the module docs for wrap-around rules.
pub type Ticks = u64;

/// `true` if tick `a` lies strictly before tick `b`, under wrap-around.
#[inline]
pub fn ticks_before(a: Ticks, b: Ticks) -> bool {
    (a.wrapping_sub(b) as i64) < 0
}

/// `true` if tick `a` lies at or before tick `b`, under wrap-around.
#[inline]
pub fn ticks_at_or_before(a: Ticks, b: Ticks) -> bool {
    !ticks_before(b, a)
}

/// Convert a millisecond duration to ticks, rounding up so that a sleep
/// never wakes short of the requested duration.
#[inline]
pub fn ms_to_ticks(ms: u32) -> Ticks {
    (ms as u64 * TICKS_PER_SECOND).div_ceil(1_000)
}

/// Convert a tick delta to whole milliseconds, rounding up.
#[inline]
pub fn ticks_to_ms(ticks: Ticks) -> u64 {
    (ticks * 1_000).div_ceil(TICKS_PER_SECOND)
}

// ---------------------------------------------------------------------------
// Platform shims
// ---------------------------------------------------------------------------

/// The host services the scheduler needs: a tick source and an idle hook.
///
/// `idle(max_ms)` is called when nothing is runnable; it should block for at
/// most `max_ms` milliseconds, or less if an external wakeup arrives.
/// Integration layers that feed the scheduler from callback-based I/O
/// override `idle` with a bounded event-pump wait and marshal completions
/// through their own mailbox before waking tasks.
#[derive(Clone, Copy)]
pub struct Platform {
    /// Current monotonic tick count.
    pub now: fn() -> Ticks,
    /// Block for at most `max_ms` milliseconds.
    pub idle: fn(max_ms: u32),
}

#[cfg(feature = "std")]
impl Platform {
    /// Hosted shims: ticks are milliseconds since first use, idle is a
    /// plain `thread::sleep`.
    pub const DEFAULT: Platform = Platform {
        now: hosted::now,
        idle: hosted::idle,
    };
}

#[cfg(all(not(feature = "std"), target_os = "none"))]
impl Platform {
    /// Bare-metal shims: ticks come from a counter the host advances from
    /// its timer interrupt via [`advance_ticks`]; idle waits for the next
    /// interrupt.
    pub const DEFAULT: Platform = Platform {
        now: bare::now,
        idle: bare::idle,
    };
}

#[cfg(feature = "std")]
mod hosted {
    use super::{Ticks, TICKS_PER_SECOND};
    use std::sync::OnceLock;
    use std::time::{Duration, Instant};

    static EPOCH: OnceLock<Instant> = OnceLock::new();

    pub(super) fn now() -> Ticks {
        let epoch = EPOCH.get_or_init(Instant::now);
        epoch.elapsed().as_millis() as u64 * TICKS_PER_SECOND / 1_000
    }

    pub(super) fn idle(max_ms: u32) {
        if max_ms > 0 {
            std::thread::sleep(Duration::from_millis(max_ms as u64));
        }
    }
}

#[cfg(all(not(feature = "std"), target_os = "none"))]
mod bare {
    use super::Ticks;
    use core::cell::Cell;

    static TICK_COUNT: critical_section::Mutex<Cell<Ticks>> =
        critical_section::Mutex::new(Cell::new(0));

    /// Advance the system tick count by `n`. Call this from the periodic
    /// timer interrupt handler (e.g. SysTick firing at `TICKS_PER_SECOND`).
    pub fn advance_ticks(n: u32) {
        critical_section::with(|cs| {
            let ticks = TICK_COUNT.borrow(cs);
            ticks.set(ticks.get().wrapping_add(n as Ticks));
        });
    }

    pub(super) fn now() -> Ticks {
        critical_section::with(|cs| TICK_COUNT.borrow(cs).get())
    }

    /// The tick interrupt bounds the wait, so the duration hint is unused.
    #[cfg(target_arch = "arm")]
    pub(super) fn idle(_max_ms: u32) {
        cortex_m::asm::wfi();
    }

    #[cfg(not(target_arch = "arm"))]
    pub(super) fn idle(_max_ms: u32) {
        core::hint::spin_loop();
    }
}

#[cfg(all(not(feature = "std"), target_os = "none"))]
pub use bare::advance_ticks;

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_ordering() {
        assert!(ticks_before(0, 1));
        assert!(!ticks_before(1, 0));
        assert!(!ticks_before(7, 7));
        assert!(ticks_at_or_before(7, 7));
        assert!(ticks_at_or_before(6, 7));
    }

    #[test]
    fn test_tick_ordering_wraps() {
        // Just before and just after the wrap point still compare correctly.
        assert!(ticks_before(Ticks::MAX - 1, 2));
        assert!(!ticks_before(2, Ticks::MAX - 1));
        assert!(ticks_at_or_before(Ticks::MAX, 0));
    }

    #[test]
    fn test_ms_conversion_rounds_up() {
        assert_eq!(ms_to_ticks(0), 0);
        assert_eq!(ms_to_ticks(1), TICKS_PER_SECOND.div_ceil(1_000));
        assert_eq!(ms_to_ticks(1_000), TICKS_PER_SECOND);
        assert_eq!(ticks_to_ms(TICKS_PER_SECOND), 1_000);
    }

    #[test]
    fn test_hosted_clock_is_monotonic() {
        let a = (Platform::DEFAULT.now)();
        let b = (Platform::DEFAULT.now)();
        assert!(ticks_at_or_before(a, b));
    }
}
