//! Serial line configuration.
//!
//! Carried as the configuration blob of UART registrations and checked by
//! the driver when the instance is brought up.

use hal_common::HalError;

/// Serial port configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Baud rate in bits per second.
    pub baud_rate: u32,
    /// Number of data bits per frame.
    pub data_bits: DataBits,
    /// Parity checking mode.
    pub parity: Parity,
    /// Number of stop bits.
    pub stop_bits: StopBits,
    /// Route transmitted bytes straight back into the receiver.
    pub loopback: bool,
}

impl SerialConfig {
    /// Create a standard 8N1 configuration at the specified baud rate.
    ///
    /// 8N1 means: 8 data bits, no parity, 1 stop bit.
    pub const fn new_8n1(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            loopback: false,
        }
    }

    pub const fn with_loopback(mut self) -> Self {
        self.loopback = true;
        self
    }

    /// Reject settings no line can run with.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for a zero or out-of-range baud rate, or 9-bit
    /// frames combined with parity.
    pub fn validate(&self) -> Result<(), HalError> {
        if self.baud_rate == 0 || self.baud_rate > MAX_BAUD_RATE {
            return Err(HalError::InvalidParameter);
        }
        if self.data_bits == DataBits::Nine && self.parity != Parity::None {
            return Err(HalError::InvalidParameter);
        }
        Ok(())
    }
}

impl Default for SerialConfig {
    /// Default configuration: 115200 baud, 8N1.
    fn default() -> Self {
        Self::new_8n1(115200)
    }
}

/// Highest baud rate accepted by [`SerialConfig::validate`].
pub const MAX_BAUD_RATE: u32 = 12_000_000;

/// Number of data bits per frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
    Nine,
}

/// Parity mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

/// Number of stop bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}
