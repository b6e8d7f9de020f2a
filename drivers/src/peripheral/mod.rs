//! Peripheral Drivers
//!
//! Drivers that can be found behind any board's registration table. The
//! simulated parts stand in for silicon on the host, with hooks in place of
//! interrupt handlers.
//!
//! # Available Peripherals
//!
//! - [`sim_serial`]: UART with ring-buffered transmit and receive
//! - [`sim_bus`]: Addressed bus controller (I2C/SPI-like)
//! - [`sim_crc`]: CRC-32 engine, no data path

pub mod sim_bus;
pub mod sim_crc;
pub mod sim_serial;

pub use sim_bus::{BusConfig, BusTargets, SimBus};
pub use sim_crc::SimCrc;
pub use sim_serial::{SerialLine, SimSerial};
