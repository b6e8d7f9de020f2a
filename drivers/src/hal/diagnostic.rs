//! Diagnostic capability.

use hal_common::HalError;

/// Transfer counters kept by every streaming device.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TransferStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Failed transfers of any kind
    pub errors: u32,
    /// Synchronous transfers that hit their deadline
    pub timeouts: u32,
    /// Incoming bytes dropped because the receive buffer was full
    pub overruns: u32,
}

/// Optional diagnostic capability.
pub trait Diagnostic {
    fn statistics(&self) -> TransferStats;

    fn reset_statistics(&mut self);

    /// Exercise the device's internal path without external traffic.
    fn self_test(&mut self) -> Result<(), HalError>;

    /// Most recent failure the device reported, if any.
    fn last_error(&self) -> Option<HalError>;
}
