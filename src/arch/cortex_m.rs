//! Bare-metal ARMv7-M context switching.
//!
//! Unlike a preemptive PendSV port, a cooperative switch is an ordinary
//! function call, so only the AAPCS callee-saved set (r4–r11) plus the
//! return address needs saving. The registers live on the suspended task's
//! own stack; the [`Context`] holds just the resulting stack pointer.

use core::arch::naked_asm;

/// Stack pointer of a suspended task, whose callee-saved registers sit in
/// a 9-word frame at that address: r4–r11, then LR.
#[repr(C)]
#[derive(Debug)]
pub struct Context {
    sp: usize,
}

/// Words in the saved-register frame (r4–r11 + LR).
const FRAME_WORDS: usize = 9;

impl Context {
    pub(crate) const ZERO: Context = Context { sp: 0 };

    /// Lay out a fresh context that will enter `entry` on its first resume.
    ///
    /// The frame's LR slot is seeded with the entry address (the Thumb bit
    /// comes with the function pointer); popping the frame leaves SP at
    /// the 8-aligned buffer top, as AAPCS requires at a call boundary.
    ///
    /// # Safety
    /// `stack_top` must be the one-past-the-end address of a writable
    /// buffer with room for the register frame below it.
    pub(crate) unsafe fn prepare(stack_top: *mut u8, entry: super::Trampoline) -> Context {
        let top = (stack_top as usize) & !7;
        let sp = top - FRAME_WORDS * 4;
        let frame = sp as *mut u32;
        for i in 0..8 {
            core::ptr::write(frame.add(i), 0); // r4-r11
        }
        core::ptr::write(frame.add(8), entry as usize as u32); // lr
        Context { sp }
    }
}

/// Save the current callee-saved state into `old` and resume `new`.
///
/// Returns when some later switch targets `old` again. For a fresh `new`
/// the final `bx lr` lands in the trampoline with r0/r1 still holding
/// `old`/`new`.
///
/// # Safety
/// Both pointers must be valid, and `new` must hold either state saved by
/// an earlier switch or state built by [`Context::prepare`]. Must be
/// called from thread mode.
#[unsafe(naked)]
pub unsafe extern "C" fn switch(_old: *mut Context, _new: *mut Context) {
    naked_asm!(
        "mov r2, sp",
        "stmdb r2!, {{r4-r11, lr}}",
        "str r2, [r0]",
        "ldr r2, [r1]",
        "ldmia r2!, {{r4-r11, lr}}",
        "mov sp, r2",
        "bx lr",
    );
}
