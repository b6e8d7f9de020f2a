//! Simulated UART
//!
//! A UART with a transmit and a receive ring in place of hardware FIFOs.
//! The rings live in a [`SerialLine`] shared between the driver and the
//! simulation hooks standing in for the interrupt handlers of a real part:
//!
//! - [`SerialLine::on_rx`]: bytes arrive from the line (RX interrupt)
//! - [`SerialLine::service_tx`]: the shifter drains the transmit ring (TX
//!   interrupt); with loopback enabled the bytes come straight back in
//! - [`SerialLine::set_stalled`]: hold the transmitter, e.g. flow control
//!
//! The line takes its own short interrupt-masking lock per access, so the
//! hooks run while a synchronous transfer waits on the device.
//!
//! # Example
//!
//! ```
//! use hal_common::time::{SimClock, Timeout};
//! use hal_drivers::hal::lifecycle::Lifecycle;
//! use hal_drivers::hal::serial::SerialConfig;
//! use hal_drivers::hal::transfer::{RxSync, TxSync};
//! use hal_drivers::peripheral::sim_serial::SimSerial;
//!
//! static CLOCK: SimClock = SimClock::new(1);
//!
//! let mut uart = SimSerial::<16, 16>::new("uart", SerialConfig::default().with_loopback(), &CLOCK);
//! uart.init().unwrap();
//! uart.send(b"ping", Timeout::Millis(5)).unwrap();
//!
//! let mut echo = [0u8; 4];
//! uart.receive(&mut echo, Timeout::Millis(5)).unwrap();
//! assert_eq!(&echo, b"ping");
//! ```

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;

use hal_common::HalError;
use hal_common::sync::IrqSpinLock;
use hal_common::time::{Clock, Deadline, Timeout};
use log::trace;

use crate::buffer::RingBuffer;
use crate::device::{Device, DeviceKind};
use crate::hal::diagnostic::{Diagnostic, TransferStats};
use crate::hal::lifecycle::{DeviceState, Lifecycle, StateMachine};
use crate::hal::power::{Power, PowerMode};
use crate::hal::serial::SerialConfig;
use crate::hal::transfer::{
    RxAsync, RxCallback, RxSync, TargetMode, TransferError, TransferState, TxAsync, TxSync,
};

/// Bytes moved per step when draining the transmit ring.
const SHIFT_CHUNK: usize = 16;

/// Interrupt-side state of one UART.
struct LineState<const TX: usize, const RX: usize> {
    tx: RingBuffer<TX>,
    rx: RingBuffer<RX>,
    /// Everything that left the transmitter, oldest first
    wire: Vec<u8>,
    stalled: bool,
    loopback: bool,
    /// Set while the device is running; a closed line drops incoming bytes
    open: bool,
    callback: Option<RxCallback>,
    overruns: usize,
}

impl<const TX: usize, const RX: usize> LineState<TX, RX> {
    fn accept(&mut self, name: &str, bytes: &[u8]) -> usize {
        let accepted = self.rx.write(bytes);
        let dropped = bytes.len() - accepted;
        if dropped > 0 {
            trace!("{}: rx overrun, {} bytes dropped", name, dropped);
            self.overruns += dropped;
        }
        accepted
    }
}

/// The wire side of a [`SimSerial`]: its rings and interrupt hooks.
///
/// Cloning yields another handle to the same line, which is how a
/// simulated interrupt source reaches the UART without going through the
/// device lock.
pub struct SerialLine<const TX: usize, const RX: usize> {
    name: &'static str,
    state: Arc<IrqSpinLock<LineState<TX, RX>>>,
}

impl<const TX: usize, const RX: usize> Clone for SerialLine<TX, RX> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            state: Arc::clone(&self.state),
        }
    }
}

impl<const TX: usize, const RX: usize> SerialLine<TX, RX> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(IrqSpinLock::new(LineState {
                tx: RingBuffer::new(),
                rx: RingBuffer::new(),
                wire: Vec::new(),
                stalled: false,
                loopback: false,
                open: false,
                callback: None,
                overruns: 0,
            })),
        }
    }

    /// Feed bytes arriving from the line.
    ///
    /// Returns how many were buffered; the rest are counted as overruns.
    /// Nothing is accepted unless the device is running.
    pub fn on_rx(&self, bytes: &[u8]) -> usize {
        let (accepted, available, callback) = {
            let mut line = self.state.lock();
            if !line.open {
                return 0;
            }
            let accepted = line.accept(self.name, bytes);
            (accepted, line.rx.count(), line.callback)
        };
        if let (true, Some(callback)) = (accepted > 0, callback) {
            callback(available);
        }
        accepted
    }

    /// Shift queued bytes out onto the wire.
    ///
    /// Returns the number of bytes that left the transmit ring.
    pub fn service_tx(&self) -> usize {
        let (moved, echoed, available, callback) = {
            let mut line = self.state.lock();
            if line.stalled || !line.open {
                return 0;
            }

            let mut moved = 0;
            let mut echoed = 0;
            let mut chunk = [0u8; SHIFT_CHUNK];
            loop {
                let n = line.tx.read(&mut chunk);
                if n == 0 {
                    break;
                }
                line.wire.extend_from_slice(&chunk[..n]);
                if line.loopback {
                    echoed += line.accept(self.name, &chunk[..n]);
                }
                moved += n;
            }
            (moved, echoed, line.rx.count(), line.callback)
        };
        if let (true, Some(callback)) = (echoed > 0, callback) {
            callback(available);
        }
        moved
    }

    /// Take everything transmitted so far.
    pub fn take_wire(&self) -> Vec<u8> {
        core::mem::take(&mut self.state.lock().wire)
    }

    /// Hold (or release) the transmitter.
    pub fn set_stalled(&self, stalled: bool) {
        self.state.lock().stalled = stalled;
    }

    /// Bytes waiting in the receive ring.
    pub fn available(&self) -> usize {
        self.state.lock().rx.count()
    }

    fn queue(&self, data: &[u8]) -> usize {
        self.state.lock().tx.write(data)
    }

    fn drain(&self, buffer: &mut [u8]) -> usize {
        self.state.lock().rx.read(buffer)
    }

    fn with<R>(&self, f: impl FnOnce(&mut LineState<TX, RX>) -> R) -> R {
        f(&mut self.state.lock())
    }
}

/// Simulated UART with `TX`/`RX`-byte rings.
pub struct SimSerial<const TX: usize, const RX: usize> {
    name: &'static str,
    config: SerialConfig,
    clock: &'static (dyn Clock + Sync),
    lifecycle: StateMachine,
    power: PowerMode,
    line: SerialLine<TX, RX>,
    transfer: TransferState,
}

impl<const TX: usize, const RX: usize> SimSerial<TX, RX> {
    pub fn new(
        name: &'static str,
        config: SerialConfig,
        clock: &'static (dyn Clock + Sync),
    ) -> Self {
        Self {
            name,
            config,
            clock,
            lifecycle: StateMachine::new(name),
            power: PowerMode::Off,
            line: SerialLine::new(name),
            transfer: TransferState::new(TargetMode::NotApplicable),
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Another handle to this UART's wire side.
    pub fn line(&self) -> SerialLine<TX, RX> {
        self.line.clone()
    }

    /// See [`SerialLine::on_rx`].
    pub fn on_rx(&self, bytes: &[u8]) -> usize {
        self.line.on_rx(bytes)
    }

    /// See [`SerialLine::service_tx`].
    pub fn service_tx(&self) -> usize {
        self.line.service_tx()
    }

    pub fn take_wire(&self) -> Vec<u8> {
        self.line.take_wire()
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.line.set_stalled(stalled);
    }

    /// Record an unrecoverable fault; the device reports `Error` until it is
    /// re-initialized or de-initialized.
    pub fn fault(&mut self) {
        self.lifecycle.fault();
        self.line.with(|line| line.open = false);
    }

    fn require_running(&mut self) -> Result<(), HalError> {
        self.lifecycle
            .require_running()
            .map_err(|e| self.transfer.record_error(e))
    }

    /// Run a byte pattern through `ring` and check it comes back intact.
    fn loop_through<const N: usize>(ring: &mut RingBuffer<N>) -> bool {
        const PATTERN: [u8; 4] = [0x55, 0xAA, 0x00, 0xFF];
        let n = ring.write(&PATTERN);
        let mut back = [0u8; PATTERN.len()];
        ring.read(&mut back[..n]) == n && back[..n] == PATTERN[..n]
    }
}

impl<const TX: usize, const RX: usize> Lifecycle for SimSerial<TX, RX> {
    fn init(&mut self) -> Result<(), HalError> {
        self.lifecycle.init(|| {
            self.config.validate()?;
            self.line.with(|line| {
                line.tx.clear();
                line.rx.clear();
                line.wire.clear();
                line.overruns = 0;
                line.loopback = self.config.loopback;
                line.open = true;
            });
            self.transfer.reset();
            self.power = PowerMode::Full;
            Ok(())
        })
    }

    fn deinit(&mut self) -> Result<(), HalError> {
        self.lifecycle.deinit(|| {
            self.line.with(|line| {
                line.tx.clear();
                line.rx.clear();
                line.callback = None;
                line.open = false;
            });
            self.power = PowerMode::Off;
            Ok(())
        })
    }

    fn suspend(&mut self) -> Result<(), HalError> {
        self.lifecycle.suspend(|| {
            self.line.with(|line| line.open = false);
            Ok(())
        })
    }

    fn resume(&mut self) -> Result<(), HalError> {
        self.lifecycle.resume(|| {
            self.line.with(|line| line.open = true);
            Ok(())
        })
    }

    fn state(&self) -> DeviceState {
        self.lifecycle.state()
    }
}

impl<const TX: usize, const RX: usize> Power for SimSerial<TX, RX> {
    fn set_power(&mut self, mode: PowerMode) -> Result<(), HalError> {
        if mode == PowerMode::Off && self.lifecycle.state() == DeviceState::Running {
            return Err(HalError::InvalidState);
        }
        self.power = mode;
        Ok(())
    }

    fn power_mode(&self) -> PowerMode {
        self.power
    }
}

impl<const TX: usize, const RX: usize> Diagnostic for SimSerial<TX, RX> {
    fn statistics(&self) -> TransferStats {
        let mut stats = self.transfer.stats();
        let overruns = self.line.with(|line| line.overruns);
        stats.overruns = stats.overruns.saturating_add(overruns as u32);
        stats
    }

    fn reset_statistics(&mut self) {
        self.transfer.reset_stats();
        self.line.with(|line| line.overruns = 0);
    }

    /// Loop a pattern through both rings.
    ///
    /// Needs a running device with nothing buffered (`Busy` otherwise).
    fn self_test(&mut self) -> Result<(), HalError> {
        self.require_running()?;
        let outcome = self.line.with(|line| {
            if !line.tx.is_empty() || !line.rx.is_empty() {
                return Err(HalError::Busy);
            }
            if Self::loop_through(&mut line.tx) && Self::loop_through(&mut line.rx) {
                Ok(())
            } else {
                Err(HalError::InvalidState)
            }
        });
        if outcome == Err(HalError::InvalidState) {
            self.fault();
        }
        outcome.map_err(|e| self.transfer.record_error(e))
    }

    fn last_error(&self) -> Option<HalError> {
        self.transfer.last_error()
    }
}

impl<const TX: usize, const RX: usize> TxSync for SimSerial<TX, RX> {
    fn send(&mut self, data: &[u8], timeout: Timeout) -> Result<usize, TransferError> {
        self.require_running()?;
        if self.line.with(|line| !line.tx.is_empty()) {
            return Err(self.transfer.record_error(HalError::Busy).into());
        }

        let deadline = Deadline::start(self.clock, timeout);
        let mut sent = 0;
        loop {
            let n = self.line.queue(&data[sent..]);
            sent += n;
            self.transfer.record_sent(n);
            self.line.service_tx();

            if sent == data.len() {
                return Ok(sent);
            }
            if deadline.expired(self.clock) {
                let error = self.transfer.record_error(HalError::Timeout);
                return Err(TransferError::new(error, sent));
            }
            core::hint::spin_loop();
        }
    }
}

impl<const TX: usize, const RX: usize> RxSync for SimSerial<TX, RX> {
    fn receive(&mut self, buffer: &mut [u8], timeout: Timeout) -> Result<usize, TransferError> {
        self.require_running()?;

        let deadline = Deadline::start(self.clock, timeout);
        let mut received = 0;
        loop {
            let n = self.line.drain(&mut buffer[received..]);
            received += n;
            self.transfer.record_received(n);

            if received == buffer.len() {
                return Ok(received);
            }
            if deadline.expired(self.clock) {
                let error = self.transfer.record_error(HalError::Timeout);
                return Err(TransferError::new(error, received));
            }
            core::hint::spin_loop();
        }
    }
}

impl<const TX: usize, const RX: usize> TxAsync for SimSerial<TX, RX> {
    fn send_async(&mut self, data: &[u8]) -> Result<usize, HalError> {
        self.require_running()?;
        if data.is_empty() {
            return Ok(0);
        }

        let n = self.line.queue(data);
        if n == 0 {
            return Err(self.transfer.record_error(HalError::Full));
        }
        self.transfer.record_sent(n);
        Ok(n)
    }

    fn is_busy(&self) -> bool {
        self.line.with(|line| !line.tx.is_empty())
    }

    fn free_space(&self) -> usize {
        self.line.with(|line| line.tx.free())
    }
}

impl<const TX: usize, const RX: usize> RxAsync for SimSerial<TX, RX> {
    fn set_rx_callback(&mut self, callback: Option<RxCallback>) -> Result<(), HalError> {
        self.line.with(|line| line.callback = callback);
        Ok(())
    }

    fn available(&self) -> usize {
        self.line.available()
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, HalError> {
        self.require_running()?;
        let n = self.line.drain(buffer);
        self.transfer.record_received(n);
        Ok(n)
    }
}

impl<const TX: usize, const RX: usize> Device for SimSerial<TX, RX> {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Uart
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn power(&mut self) -> Option<&mut dyn Power> {
        Some(self)
    }

    fn diagnostic(&mut self) -> Option<&mut dyn Diagnostic> {
        Some(self)
    }

    fn tx_sync(&mut self) -> Option<&mut dyn TxSync> {
        Some(self)
    }

    fn rx_sync(&mut self) -> Option<&mut dyn RxSync> {
        Some(self)
    }

    fn tx_async(&mut self) -> Option<&mut dyn TxAsync> {
        Some(self)
    }

    fn rx_async(&mut self) -> Option<&mut dyn RxAsync> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use hal_common::time::{SimClock, StdClock};
    use std::boxed::Box;
    use std::thread;
    use std::time::Duration;

    static CLOCK: SimClock = SimClock::new(1);

    fn uart() -> SimSerial<8, 8> {
        SimSerial::new("uart", SerialConfig::default(), &CLOCK)
    }

    #[test]
    fn transfers_need_a_running_device() {
        let mut uart = uart();
        let err = uart.send(b"x", Timeout::Immediate).unwrap_err();
        assert_eq!(err, TransferError::new(HalError::NotInitialized, 0));
        assert_eq!(uart.send_async(b"x"), Err(HalError::NotInitialized));

        uart.init().unwrap();
        uart.suspend().unwrap();
        assert_eq!(uart.send_async(b"x"), Err(HalError::InvalidState));
    }

    #[test]
    fn async_send_fills_until_full() {
        let mut uart = uart();
        uart.init().unwrap();

        assert_eq!(uart.send_async(b"0123456789"), Ok(8));
        assert!(uart.is_busy());
        assert_eq!(uart.free_space(), 0);
        assert_eq!(uart.send_async(b"a"), Err(HalError::Full));

        assert_eq!(uart.service_tx(), 8);
        assert!(!uart.is_busy());
        assert_eq!(uart.take_wire(), b"01234567");
    }

    #[test]
    fn sync_send_is_busy_while_async_data_is_queued() {
        let mut uart = uart();
        uart.init().unwrap();
        uart.send_async(b"ab").unwrap();

        let err = uart.send(b"cd", Timeout::Forever).unwrap_err();
        assert_eq!(err.error, HalError::Busy);
    }

    #[test]
    fn stalled_transmitter_times_out_with_partial_progress() {
        let mut uart = uart();
        uart.init().unwrap();
        uart.set_stalled(true);

        let err = uart.send(b"0123456789ab", Timeout::Millis(3)).unwrap_err();
        assert_eq!(err, TransferError::new(HalError::Timeout, 8));
        assert_eq!(uart.statistics().timeouts, 1);

        uart.set_stalled(false);
        uart.service_tx();
        assert_eq!(uart.take_wire(), b"01234567");
    }

    #[test]
    fn rx_overrun_is_counted() {
        let mut uart = uart();
        uart.init().unwrap();
        assert_eq!(uart.on_rx(b"0123456789"), 8);
        assert_eq!(uart.statistics().overruns, 2);
        assert_eq!(uart.available(), 8);
    }

    #[test]
    fn callback_sees_available_bytes() {
        static SEEN: AtomicUsize = AtomicUsize::new(0);
        fn on_data(available: usize) {
            SEEN.store(available, Ordering::SeqCst);
        }

        let mut uart = uart();
        uart.init().unwrap();
        uart.set_rx_callback(Some(on_data)).unwrap();
        uart.on_rx(b"abc");
        assert_eq!(SEEN.load(Ordering::SeqCst), 3);

        let mut out = [0u8; 2];
        assert_eq!(RxAsync::read(&mut uart, &mut out), Ok(2));
        assert_eq!(&out, b"ab");
        assert_eq!(uart.available(), 1);
    }

    #[test]
    fn suspend_keeps_buffered_data() {
        let mut uart = uart();
        uart.init().unwrap();
        uart.on_rx(b"kept");
        uart.suspend().unwrap();
        uart.resume().unwrap();

        let mut out = [0u8; 4];
        assert_eq!(uart.receive(&mut out, Timeout::Immediate), Ok(4));
        assert_eq!(&out, b"kept");
    }

    #[test]
    fn power_off_requires_leaving_running() {
        let mut uart = uart();
        uart.init().unwrap();
        assert_eq!(uart.power_mode(), PowerMode::Full);
        assert_eq!(uart.set_power(PowerMode::Off), Err(HalError::InvalidState));
        uart.set_power(PowerMode::Low).unwrap();

        uart.suspend().unwrap();
        uart.set_power(PowerMode::Off).unwrap();
        assert_eq!(uart.power_mode(), PowerMode::Off);
    }

    #[test]
    fn self_test_and_bad_config() {
        let mut uart = uart();
        uart.init().unwrap();
        assert_eq!(uart.self_test(), Ok(()));
        assert!(uart.line.with(|line| line.tx.is_empty() && line.rx.is_empty()));

        let mut broken = SimSerial::<8, 8>::new("bad", SerialConfig::new_8n1(0), &CLOCK);
        assert_eq!(broken.init(), Err(HalError::InvalidParameter));
        assert_eq!(broken.state(), DeviceState::Uninitialized);
    }

    fn wall_clock() -> &'static StdClock {
        Box::leak(Box::new(StdClock::new()))
    }

    #[test]
    fn receive_sees_bytes_arriving_while_it_waits() {
        let mut uart = SimSerial::<8, 8>::new("uart", SerialConfig::default(), wall_clock());
        uart.init().unwrap();
        let line = uart.line();

        let feeder = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            line.on_rx(b"data")
        });

        let mut buf = [0u8; 4];
        assert_eq!(uart.receive(&mut buf, Timeout::Millis(2_000)), Ok(4));
        assert_eq!(&buf, b"data");
        assert_eq!(feeder.join().unwrap(), 4);
    }

    #[test]
    fn receive_deadline_keeps_bytes_that_made_it() {
        let mut uart = SimSerial::<8, 8>::new("uart", SerialConfig::default(), wall_clock());
        uart.init().unwrap();
        let line = uart.line();

        let feeder = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            line.on_rx(b"ab");
            thread::sleep(Duration::from_millis(300));
            line.on_rx(b"cd");
        });

        let mut buf = [0u8; 4];
        let err = uart.receive(&mut buf, Timeout::Millis(100)).unwrap_err();
        assert_eq!(err, TransferError::new(HalError::Timeout, 2));
        assert_eq!(&buf[..2], b"ab");

        feeder.join().unwrap();
        assert_eq!(uart.available(), 2);
    }

    #[test]
    fn stalled_send_completes_once_the_line_frees_up() {
        let mut uart = SimSerial::<8, 8>::new("uart", SerialConfig::default(), wall_clock());
        uart.init().unwrap();
        uart.set_stalled(true);
        let line = uart.line();

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            line.set_stalled(false);
        });

        assert_eq!(uart.send(b"0123456789ab", Timeout::Millis(2_000)), Ok(12));
        releaser.join().unwrap();
        assert_eq!(uart.take_wire(), b"0123456789ab");
    }
}
