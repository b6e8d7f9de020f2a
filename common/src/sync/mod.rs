//! Synchronization primitives that hold up under both bare-metal interrupts
//! and a host OS.

pub mod atomic;
pub mod critical;
pub mod irq;
pub mod irq_spinlock;
pub mod mutex;

pub use atomic::{AtomicCell, AtomicWord};
#[cfg(target_has_atomic = "32")]
pub use atomic::NativeAtomic;
pub use critical::{CriticalSection, critical_enter, critical_exit, critical_section};
pub use irq::IrqControl;
pub use irq_spinlock::{IrqSpinLock, IrqSpinLockGuard};
pub use mutex::{Mutex, MutexGuard};
