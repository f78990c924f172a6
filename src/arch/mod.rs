//! # Architecture Port Layer
//!
//! The context-switch primitive, per CPU/ABI: a saved-register [`Context`],
//! `Context::prepare` to lay out a fresh context on a task stack, and
//! [`switch`] to save the running context and resume another.
//!
//! Every port keeps the same two contracts:
//!
//! - `switch(old, new)` preserves exactly the callee-saved register set of
//!   the target ABI; everything caller-saved is clobbered, which is fine
//!   because `switch` is only ever reached through an ordinary call.
//! - The first switch into a prepared context enters the trampoline with
//!   the *argument registers still holding `switch`'s own arguments*, so
//!   the trampoline receives `(old, new)` — and since `Context` sits at
//!   offset 0 of the task record, `new` is also the new task's address.

#[cfg(target_arch = "x86_64")]
mod x86_64;
#[cfg(target_arch = "x86_64")]
pub use x86_64::{switch, Context};

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "aarch64")]
pub use aarch64::{switch, Context};

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod cortex_m;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use cortex_m::{switch, Context};

/// Entry point of a fresh context: `(previous context, own context)`.
pub(crate) type Trampoline = extern "C" fn(*mut Context, *mut Context) -> !;

#[cfg(all(target_arch = "x86_64", windows))]
compile_error!("the x86_64 port implements the System V ABI; Windows is not supported");

#[cfg(all(target_arch = "arm", not(target_os = "none")))]
compile_error!("the ARM port targets bare-metal ARMv7-M only");

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    all(target_arch = "arm", target_os = "none")
)))]
compile_error!("no context-switch port for this architecture");
