//! Critical sections.
//!
//! A critical section is a region with interrupts masked. Entering captures
//! the mask state, exiting restores it. The token returned by
//! [`critical_enter`] restores on drop, so forgetting to exit cannot leave
//! interrupts masked; [`critical_exit`] makes the exit point explicit.
//!
//! Nesting is only safe when pairs are strictly nested:
//!
//! ```
//! use hal_common::sync::critical::{critical_enter, critical_exit};
//!
//! let outer = critical_enter();
//! let inner = critical_enter();
//! critical_exit(inner);
//! critical_exit(outer);
//! ```

use core::marker::PhantomData;

use super::irq::IrqControl;
use crate::arch::PlatformIrq;

/// Token proving interrupts are masked by `I`.
///
/// Not `Send`: the captured state belongs to the context that entered.
#[must_use = "dropping the token exits the critical section immediately"]
pub struct CriticalSection<I: IrqControl = PlatformIrq> {
    state: I::State,
    _not_send: PhantomData<*const ()>,
}

impl<I: IrqControl> CriticalSection<I> {
    /// Capture the mask state and mask interrupts.
    #[inline]
    pub fn enter() -> Self {
        Self {
            state: I::disable(),
            _not_send: PhantomData,
        }
    }

    /// Restore the captured mask state.
    #[inline]
    pub fn exit(self) {
        drop(self);
    }

    /// Run `f` with interrupts masked.
    #[inline]
    pub fn with<R>(f: impl FnOnce(&Self) -> R) -> R {
        let cs = Self::enter();
        f(&cs)
    }
}

impl<I: IrqControl> Drop for CriticalSection<I> {
    #[inline]
    fn drop(&mut self) {
        I::restore(self.state);
    }
}

/// Enter a critical section on the platform interrupt controller.
#[inline]
pub fn critical_enter() -> CriticalSection {
    CriticalSection::enter()
}

/// Leave a critical section entered with [`critical_enter`].
#[inline]
pub fn critical_exit(cs: CriticalSection) {
    cs.exit();
}

/// Run `f` inside a critical section on the platform interrupt controller.
#[inline]
pub fn critical_section<R>(f: impl FnOnce() -> R) -> R {
    CriticalSection::<PlatformIrq>::with(|_| f())
}
