//! Shared HAL services
//!
//! Process-wide infrastructure consumed by every device implementation but
//! owned by none of them.
//!
//! # Module Organization
//!
//! - [`error`]: The closed status-code taxonomy returned by every operation
//! - [`sync`]: Critical sections, spinlocks, timed mutexes and atomic words
//! - [`arch`]: Interrupt-mask control for the supported cores
//! - [`time`]: Millisecond clocks and timeouts for blocking operations
//! - [`mm`]: Static-pool, heap and custom allocation with bookkeeping

#![no_std]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod arch;
pub mod error;
pub mod mm;
pub mod sync;
pub mod time;

pub use error::HalError;
