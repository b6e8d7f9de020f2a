//! Single-word atomics.
//!
//! [`AtomicCell`] emulates atomic read-modify-write by running each operation
//! entirely inside one critical section, for cores without exclusive-access
//! instructions. [`NativeAtomic`] uses the instructions directly where the
//! target has them. Both implement [`AtomicWord`].

use core::cell::UnsafeCell;
use core::marker::PhantomData;

use super::critical::CriticalSection;
use super::irq::IrqControl;
use crate::arch::PlatformIrq;

/// Operations shared by every atomic word implementation.
pub trait AtomicWord {
    fn load(&self) -> u32;

    fn store(&self, value: u32);

    /// Replace the value with `desired` if it equals `*expected`.
    ///
    /// On failure `*expected` is updated to the value observed and `false`
    /// is returned.
    fn compare_exchange(&self, expected: &mut u32, desired: u32) -> bool;

    /// Add `delta` (wrapping) and return the previous value.
    fn fetch_add(&self, delta: u32) -> u32;

    /// Subtract `delta` (wrapping) and return the previous value.
    fn fetch_sub(&self, delta: u32) -> u32 {
        self.fetch_add(delta.wrapping_neg())
    }
}

/// Critical-section emulated atomic word.
///
/// Embedded by value in its owner; shares the owner's lifetime.
pub struct AtomicCell<I: IrqControl = PlatformIrq> {
    value: UnsafeCell<u32>,
    _irq: PhantomData<I>,
}

// SAFETY: every access to `value` happens with interrupts masked by `I`.
unsafe impl<I: IrqControl> Sync for AtomicCell<I> {}
unsafe impl<I: IrqControl> Send for AtomicCell<I> {}

impl<I: IrqControl> AtomicCell<I> {
    pub const fn new(value: u32) -> Self {
        Self {
            value: UnsafeCell::new(value),
            _irq: PhantomData,
        }
    }

    pub fn into_inner(self) -> u32 {
        self.value.into_inner()
    }

    #[inline]
    fn with<R>(&self, f: impl FnOnce(&mut u32) -> R) -> R {
        CriticalSection::<I>::with(|_| {
            // SAFETY: interrupts are masked for the whole closure, so no
            // other context can observe or mutate the word.
            f(unsafe { &mut *self.value.get() })
        })
    }
}

impl<I: IrqControl> Default for AtomicCell<I> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<I: IrqControl> AtomicWord for AtomicCell<I> {
    fn load(&self) -> u32 {
        self.with(|v| *v)
    }

    fn store(&self, value: u32) {
        self.with(|v| *v = value);
    }

    fn compare_exchange(&self, expected: &mut u32, desired: u32) -> bool {
        self.with(|v| {
            if *v == *expected {
                *v = desired;
                true
            } else {
                *expected = *v;
                false
            }
        })
    }

    fn fetch_add(&self, delta: u32) -> u32 {
        self.with(|v| {
            let old = *v;
            *v = old.wrapping_add(delta);
            old
        })
    }
}

impl<I: IrqControl> core::fmt::Debug for AtomicCell<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("AtomicCell").field(&self.load()).finish()
    }
}

/// Atomic word using the core's native instructions.
#[cfg(target_has_atomic = "32")]
#[derive(Debug, Default)]
pub struct NativeAtomic(core::sync::atomic::AtomicU32);

#[cfg(target_has_atomic = "32")]
impl NativeAtomic {
    pub const fn new(value: u32) -> Self {
        Self(core::sync::atomic::AtomicU32::new(value))
    }
}

#[cfg(target_has_atomic = "32")]
impl AtomicWord for NativeAtomic {
    fn load(&self) -> u32 {
        self.0.load(core::sync::atomic::Ordering::Acquire)
    }

    fn store(&self, value: u32) {
        self.0.store(value, core::sync::atomic::Ordering::Release);
    }

    fn compare_exchange(&self, expected: &mut u32, desired: u32) -> bool {
        use core::sync::atomic::Ordering;

        match self
            .0
            .compare_exchange(*expected, desired, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(observed) => {
                *expected = observed;
                false
            }
        }
    }

    fn fetch_add(&self, delta: u32) -> u32 {
        self.0.fetch_add(delta, core::sync::atomic::Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise_cas<A: AtomicWord>(cell: &A) {
        let mut expected = 5;
        assert!(cell.compare_exchange(&mut expected, 9));
        assert_eq!(cell.load(), 9);

        let mut stale = 5;
        assert!(!cell.compare_exchange(&mut stale, 11));
        assert_eq!(stale, 9);
        assert_eq!(cell.load(), 9);
    }

    #[test]
    fn emulated_cas_succeeds_once() {
        let cell: AtomicCell = AtomicCell::new(5);
        exercise_cas(&cell);
    }

    #[test]
    fn native_cas_succeeds_once() {
        let cell = NativeAtomic::new(5);
        exercise_cas(&cell);
    }

    #[test]
    fn fetch_add_returns_previous_and_wraps() {
        let cell: AtomicCell = AtomicCell::new(u32::MAX);
        assert_eq!(cell.fetch_add(2), u32::MAX);
        assert_eq!(cell.load(), 1);
        assert_eq!(cell.fetch_sub(1), 1);
        assert_eq!(cell.load(), 0);
    }

    #[test]
    fn store_then_load() {
        let cell: AtomicCell = AtomicCell::default();
        cell.store(0xDEAD_BEEF);
        assert_eq!(cell.load(), 0xDEAD_BEEF);
        assert_eq!(cell.into_inner(), 0xDEAD_BEEF);
    }
}
