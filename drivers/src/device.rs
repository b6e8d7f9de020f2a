//! The device composition point.
//!
//! [`Device`] ties the capability traits together. Lifecycle is a supertrait
//! and therefore always present; every other capability is retrieved through
//! an accessor that returns `None` when the peripheral does not support it.
//! This mirrors how a serial port hands out its non-blocking half only when
//! it has one.

use core::any::Any;

use bitflags::bitflags;

use crate::hal::diagnostic::Diagnostic;
use crate::hal::lifecycle::Lifecycle;
use crate::hal::power::Power;
use crate::hal::transfer::{Addressable, RxAsync, RxSync, TxAsync, TxSync};

/// Peripheral class a registration declares.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Uart,
    Spi,
    I2c,
    Sdio,
    Crc,
    Dac,
    OptionBytes,
    Other,
}

bitflags! {
    /// Capabilities a device populates.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Capabilities: u8 {
        const LIFECYCLE = 1 << 0;
        const POWER = 1 << 1;
        const DIAGNOSTIC = 1 << 2;
        const TX_SYNC = 1 << 3;
        const RX_SYNC = 1 << 4;
        const TX_ASYNC = 1 << 5;
        const RX_ASYNC = 1 << 6;
        const ADDRESSABLE = 1 << 7;
    }
}

/// A peripheral instance as seen by application code.
pub trait Device: Lifecycle + Send {
    fn kind(&self) -> DeviceKind;

    fn name(&self) -> &'static str;

    fn power(&mut self) -> Option<&mut dyn Power> {
        None
    }

    fn diagnostic(&mut self) -> Option<&mut dyn Diagnostic> {
        None
    }

    fn tx_sync(&mut self) -> Option<&mut dyn TxSync> {
        None
    }

    fn rx_sync(&mut self) -> Option<&mut dyn RxSync> {
        None
    }

    fn tx_async(&mut self) -> Option<&mut dyn TxAsync> {
        None
    }

    fn rx_async(&mut self) -> Option<&mut dyn RxAsync> {
        None
    }

    fn addressable(&mut self) -> Option<&mut dyn Addressable> {
        None
    }

    /// Access to the concrete type, for board code and simulation hooks.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Which accessors return `Some`.
    fn capabilities(&mut self) -> Capabilities {
        let mut caps = Capabilities::LIFECYCLE;
        caps.set(Capabilities::POWER, self.power().is_some());
        caps.set(Capabilities::DIAGNOSTIC, self.diagnostic().is_some());
        caps.set(Capabilities::TX_SYNC, self.tx_sync().is_some());
        caps.set(Capabilities::RX_SYNC, self.rx_sync().is_some());
        caps.set(Capabilities::TX_ASYNC, self.tx_async().is_some());
        caps.set(Capabilities::RX_ASYNC, self.rx_async().is_some());
        caps.set(Capabilities::ADDRESSABLE, self.addressable().is_some());
        caps
    }
}
