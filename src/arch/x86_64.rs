//! x86-64 (System V) context switching.

use core::arch::naked_asm;

/// Callee-saved register state of a suspended task.
///
/// Per the System V ABI these are the only registers a function call must
/// preserve; the XMM registers are all caller-saved and need no slot.
#[repr(C)]
#[derive(Debug)]
pub struct Context {
    rsp: u64,
    rbp: u64,
    rbx: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
}

impl Context {
    pub(crate) const ZERO: Context = Context {
        rsp: 0,
        rbp: 0,
        rbx: 0,
        r12: 0,
        r13: 0,
        r14: 0,
        r15: 0,
    };

    /// Lay out a fresh context that will enter `entry` on its first resume.
    ///
    /// The ABI wants RSP ≡ 16n+8 on function entry (the state left by a
    /// `call`). [`switch`] resumes with `ret`, which pops the seeded entry
    /// address, so the address is planted 16 bytes below an aligned top.
    ///
    /// # Safety
    /// `stack_top` must be the one-past-the-end address of a writable
    /// buffer with at least 16 bytes below it.
    pub(crate) unsafe fn prepare(stack_top: *mut u8, entry: super::Trampoline) -> Context {
        let rsp = ((stack_top as usize) & !15) - 16;
        core::ptr::write(rsp as *mut u64, entry as usize as u64);
        Context {
            rsp: rsp as u64,
            ..Context::ZERO
        }
    }
}

/// Save the current callee-saved state into `old` and resume `new`.
///
/// Returns when some later switch targets `old` again. For a fresh `new`
/// the final `ret` lands in the trampoline with RDI/RSI still holding
/// `old`/`new`.
///
/// # Safety
/// Both pointers must be valid, and `new` must hold either state saved by
/// an earlier switch or state built by [`Context::prepare`].
#[unsafe(naked)]
pub unsafe extern "C" fn switch(_old: *mut Context, _new: *mut Context) {
    naked_asm!(
        "mov [rdi + 0x00], rsp",
        "mov [rdi + 0x08], rbp",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], r12",
        "mov [rdi + 0x20], r13",
        "mov [rdi + 0x28], r14",
        "mov [rdi + 0x30], r15",
        "mov rsp, [rsi + 0x00]",
        "mov rbp, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov r12, [rsi + 0x18]",
        "mov r13, [rsi + 0x20]",
        "mov r14, [rsi + 0x28]",
        "mov r15, [rsi + 0x30]",
        "ret",
    );
}
