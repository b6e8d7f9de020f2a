//! Data-movement capabilities.
//!
//! Four contracts shared by every streaming peripheral:
//!
//! - [`TxSync`]: block (up to a timeout) until the data is queued
//! - [`RxSync`]: block (up to a timeout) until the buffer is filled
//! - [`TxAsync`]: enqueue and return; poll [`TxAsync::is_busy`] or
//!   [`TxAsync::free_space`]
//! - [`RxAsync`]: get a callback from whatever context sees new data, or
//!   poll [`RxAsync::available`] and pull with [`RxAsync::read`]
//!
//! Only the synchronous pair ever waits. `Busy` is advisory: it is reported
//! but not enforced by any lock, so a caller ignoring it interleaves data.

use core::fmt;

use hal_common::HalError;
use hal_common::time::Timeout;

use super::diagnostic::TransferStats;

/// Failure of a synchronous transfer, with the progress made before it.
///
/// A timed-out transfer is not rolled back: `transferred` bytes were
/// queued (or received) and stay that way.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransferError {
    pub error: HalError,
    pub transferred: usize,
}

impl TransferError {
    pub const fn new(error: HalError, transferred: usize) -> Self {
        Self { error, transferred }
    }
}

impl From<HalError> for TransferError {
    fn from(error: HalError) -> Self {
        Self::new(error, 0)
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} after {} bytes", self.error, self.transferred)
    }
}

/// Synchronous transmit.
pub trait TxSync {
    /// Queue all of `data`, waiting at most `timeout` for room.
    ///
    /// # Errors
    ///
    /// - `NotInitialized`: the device is not running
    /// - `Busy`: an asynchronous transmission is still in flight
    /// - `Timeout`: not everything was queued in time
    fn send(&mut self, data: &[u8], timeout: Timeout) -> Result<usize, TransferError>;
}

/// Synchronous receive.
pub trait RxSync {
    /// Fill `buffer`, waiting at most `timeout` for data to arrive.
    ///
    /// # Errors
    ///
    /// - `NotInitialized`: the device is not running
    /// - `Timeout`: fewer than `buffer.len()` bytes arrived in time
    fn receive(&mut self, buffer: &mut [u8], timeout: Timeout) -> Result<usize, TransferError>;
}

/// Asynchronous transmit.
pub trait TxAsync {
    /// Enqueue as much of `data` as fits and return immediately.
    ///
    /// # Errors
    ///
    /// `NotInitialized` when not running, `Full` when nothing fits.
    fn send_async(&mut self, data: &[u8]) -> Result<usize, HalError>;

    /// Whether queued bytes are still waiting to go out.
    fn is_busy(&self) -> bool;

    /// Bytes that can be enqueued right now.
    fn free_space(&self) -> usize;
}

/// Called with the number of bytes available after new data arrives.
///
/// May run in interrupt context.
pub type RxCallback = fn(available: usize);

/// Asynchronous receive.
pub trait RxAsync {
    /// Install (or with `None`, remove) the data-arrival callback.
    fn set_rx_callback(&mut self, callback: Option<RxCallback>) -> Result<(), HalError>;

    /// Bytes buffered and ready to read.
    fn available(&self) -> usize;

    /// Pull up to `buffer.len()` buffered bytes without waiting.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, HalError>;
}

/// Devices that talk to one selected target on a shared bus.
pub trait Addressable {
    /// Select the target for subsequent transfers.
    fn set_target(&mut self, address: u16) -> Result<(), HalError>;

    fn target(&self) -> Option<u16>;
}

/// Whether a device needs a target configured before transferring.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TargetMode {
    NotApplicable,
    Required,
}

/// Per-device transfer bookkeeping: statistics and the current target.
#[derive(Debug)]
pub struct TransferState {
    stats: TransferStats,
    target: Option<u16>,
    mode: TargetMode,
    last_error: Option<HalError>,
}

impl TransferState {
    pub const fn new(mode: TargetMode) -> Self {
        Self {
            stats: TransferStats {
                bytes_sent: 0,
                bytes_received: 0,
                errors: 0,
                timeouts: 0,
                overruns: 0,
            },
            target: None,
            mode,
            last_error: None,
        }
    }

    /// Fails with `InvalidState` when a target is required but unset.
    pub fn check_target(&self) -> Result<(), HalError> {
        match (self.mode, self.target) {
            (TargetMode::Required, None) => Err(HalError::InvalidState),
            _ => Ok(()),
        }
    }

    pub fn set_target(&mut self, address: u16) {
        self.target = Some(address);
    }

    pub fn target(&self) -> Option<u16> {
        self.target
    }

    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    pub fn last_error(&self) -> Option<HalError> {
        self.last_error
    }

    pub fn record_sent(&mut self, bytes: usize) {
        self.stats.bytes_sent += bytes as u64;
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.stats.bytes_received += bytes as u64;
    }

    pub fn record_overrun(&mut self, dropped: usize) {
        self.stats.overruns = self.stats.overruns.saturating_add(dropped as u32);
    }

    /// Count a failed operation and hand the error back.
    pub fn record_error(&mut self, error: HalError) -> HalError {
        self.stats.errors = self.stats.errors.saturating_add(1);
        if error == HalError::Timeout {
            self.stats.timeouts = self.stats.timeouts.saturating_add(1);
        }
        self.last_error = Some(error);
        error
    }

    pub fn reset_stats(&mut self) {
        self.stats = TransferStats::default();
        self.last_error = None;
    }

    /// Forget statistics and target.
    pub fn reset(&mut self) {
        self.reset_stats();
        self.target = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_target_gates_transfers() {
        let mut state = TransferState::new(TargetMode::Required);
        assert_eq!(state.check_target(), Err(HalError::InvalidState));
        state.set_target(0x50);
        assert_eq!(state.check_target(), Ok(()));
        state.reset();
        assert_eq!(state.target(), None);
    }

    #[test]
    fn timeouts_count_as_errors() {
        let mut state = TransferState::new(TargetMode::NotApplicable);
        assert_eq!(state.record_error(HalError::Timeout), HalError::Timeout);
        state.record_error(HalError::Busy);
        let stats = state.stats();
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(state.last_error(), Some(HalError::Busy));
    }
}
