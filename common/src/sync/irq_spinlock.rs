use core::{
    cell::UnsafeCell,
    marker::PhantomData,
    sync::atomic::{AtomicBool, Ordering},
};

use super::irq::IrqControl;
use crate::arch::PlatformIrq;

/// IRQ-safe spinlock.
///
/// - Masks interrupts on lock
/// - Spins until acquired
/// - Restores the captured interrupt state on drop
///
/// This is the protection used for every piece of HAL state an interrupt
/// handler may touch: registry slots, device instances, the memory manager.
///
/// Not fair. Not reentrant.
pub struct IrqSpinLock<T, I: IrqControl = PlatformIrq> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
    _irq: PhantomData<I>,
}

unsafe impl<T: Send, I: IrqControl> Send for IrqSpinLock<T, I> {}
unsafe impl<T: Send, I: IrqControl> Sync for IrqSpinLock<T, I> {}

impl<T, I: IrqControl> IrqSpinLock<T, I> {
    /// Create a new IRQ-safe spinlock.
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
            _irq: PhantomData,
        }
    }

    /// Acquire the lock with interrupts masked.
    pub fn lock(&self) -> IrqSpinLockGuard<'_, T, I> {
        // Mask first so the holder cannot be preempted by a handler that
        // spins on the same lock.
        let irq_state = I::disable();

        while self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }

        IrqSpinLockGuard {
            lock: self,
            irq_state,
        }
    }

    /// Acquire the lock only if it is free right now.
    pub fn try_lock(&self) -> Option<IrqSpinLockGuard<'_, T, I>> {
        let irq_state = I::disable();

        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(IrqSpinLockGuard {
                lock: self,
                irq_state,
            })
        } else {
            I::restore(irq_state);
            None
        }
    }

    /// Whether some context currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Exclusive access without locking; `&mut self` already proves it.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

/// Guard returned by `IrqSpinLock::lock`.
///
/// Restores interrupt state on drop.
pub struct IrqSpinLockGuard<'a, T, I: IrqControl = PlatformIrq> {
    lock: &'a IrqSpinLock<T, I>,
    irq_state: I::State,
}

impl<T, I: IrqControl> core::ops::Deref for IrqSpinLockGuard<'_, T, I> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the lock is held
        unsafe { &*self.lock.data.get() }
    }
}

impl<T, I: IrqControl> core::ops::DerefMut for IrqSpinLockGuard<'_, T, I> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: the lock is held
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T, I: IrqControl> Drop for IrqSpinLockGuard<'_, T, I> {
    fn drop(&mut self) {
        // Release lock first
        self.lock.locked.store(false, Ordering::Release);

        I::restore(self.irq_state);
    }
}
