//! Device Model and Peripheral Drivers
//!
//! This crate turns the services of `hal-common` into a device layer:
//!
//! # Module Organization
//!
//! - [`hal`]: Capability traits every peripheral composes from
//! - [`device`]: The [`Device`] composition point and capability flags
//! - [`registry`]: Static registration table, lazy construction, handles
//! - [`context`]: The [`Hal`] context value (registry + memory manager)
//! - [`buffer`]: Circular byte buffer used by streaming drivers
//! - [`peripheral`]: Reusable peripheral drivers
//! - [`platform`]: Board registration tables, selected by feature
//!
//! # Usage Example
//!
//! ```no_run
//! use hal_common::time::Timeout;
//! use hal_drivers::{Hal, HalConfig, Lifecycle};
//! use hal_drivers::platform::sim::DEVICES;
//!
//! let hal = Hal::new(HalConfig::default(), DEVICES).unwrap();
//! hal.init().unwrap();
//!
//! let uart = hal.lookup("uart0").unwrap();
//! let mut dev = uart.lock().unwrap();
//! dev.init().unwrap();
//! if let Some(tx) = dev.tx_sync() {
//!     tx.send(b"Hello, world!\n", Timeout::Millis(10)).unwrap();
//! }
//! ```

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod buffer;
pub mod context;
pub mod device;
pub mod hal;
pub mod peripheral;
pub mod platform;
pub mod registry;

// Re-export commonly used types
pub use buffer::RingBuffer;
pub use context::{Hal, HalConfig};
pub use device::{Capabilities, Device, DeviceKind};
pub use hal::lifecycle::{DeviceState, Lifecycle};
pub use registry::{DeviceGuard, DeviceHandle, DeviceRegistration, Placed, Placement, Registry};
