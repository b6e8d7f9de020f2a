//! Power capability.

use hal_common::HalError;

/// Power level of a peripheral.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PowerMode {
    /// Clock and supply gated.
    Off,
    /// Retains state, wakes on activity.
    Sleep,
    /// Reduced clock.
    Low,
    /// Normal operation.
    Full,
}

/// Optional power-management capability.
pub trait Power {
    /// Switch to `mode`.
    ///
    /// # Errors
    ///
    /// `InvalidState` when turning a running device `Off`; suspend or
    /// de-initialize it first.
    fn set_power(&mut self, mode: PowerMode) -> Result<(), HalError>;

    fn power_mode(&self) -> PowerMode;
}
