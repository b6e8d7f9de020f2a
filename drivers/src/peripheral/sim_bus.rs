//! Simulated addressed bus (I2C/SPI-like controller)
//!
//! Transfers go to the currently selected target, which must be set through
//! [`Addressable::set_target`] (or a `default_target` in the configuration)
//! before any transfer succeeds. Targets are simulated endpoints attached
//! with [`BusTargets::attach`]: each records what the controller wrote to it
//! and replays bytes queued with [`BusTargets::queue_response`] on reads.
//! The endpoints sit behind their own short lock, so a read waiting on the
//! bus sees responses queued from elsewhere in the meantime.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;

use hal_common::HalError;
use hal_common::sync::IrqSpinLock;
use hal_common::time::{Clock, Deadline, Timeout};
use log::debug;

use crate::device::{Device, DeviceKind};
use crate::hal::diagnostic::{Diagnostic, TransferStats};
use crate::hal::lifecycle::{DeviceState, Lifecycle, StateMachine};
use crate::hal::power::{Power, PowerMode};
use crate::hal::transfer::{
    Addressable, RxSync, TargetMode, TransferError, TransferState, TxSync,
};

/// Highest 7-bit I2C address.
const I2C_MAX_ADDRESS: u16 = 0x7F;

/// Bus controller configuration blob.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub bus_speed_hz: u32,
    /// Target selected on init, if any.
    pub default_target: Option<u16>,
}

impl BusConfig {
    /// Standard-mode I2C, no preselected target.
    pub const fn standard() -> Self {
        Self {
            bus_speed_hz: 100_000,
            default_target: None,
        }
    }

    pub fn validate(&self) -> Result<(), HalError> {
        if self.bus_speed_hz == 0 {
            return Err(HalError::InvalidParameter);
        }
        Ok(())
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Default)]
struct Target {
    written: Vec<u8>,
    response: VecDeque<u8>,
}

/// The simulated endpoints of one bus.
///
/// Cloning yields another handle to the same set of endpoints.
#[derive(Clone)]
pub struct BusTargets(Arc<IrqSpinLock<BTreeMap<u16, Target>>>);

impl Default for BusTargets {
    fn default() -> Self {
        Self(Arc::new(IrqSpinLock::new(BTreeMap::new())))
    }
}

impl BusTargets {
    /// Connect a simulated endpoint at `address`.
    pub fn attach(&self, address: u16) {
        self.0.lock().entry(address).or_default();
    }

    pub fn detach(&self, address: u16) {
        self.0.lock().remove(&address);
    }

    /// Bytes the endpoint at `address` will answer with on reads.
    pub fn queue_response(&self, address: u16, bytes: &[u8]) -> Result<(), HalError> {
        let mut targets = self.0.lock();
        let target = targets.get_mut(&address).ok_or(HalError::NotFound)?;
        target.response.extend(bytes);
        Ok(())
    }

    /// Everything written to the endpoint at `address` so far.
    pub fn take_written(&self, address: u16) -> Result<Vec<u8>, HalError> {
        let mut targets = self.0.lock();
        let target = targets.get_mut(&address).ok_or(HalError::NotFound)?;
        Ok(core::mem::take(&mut target.written))
    }

    fn contains(&self, address: u16) -> bool {
        self.0.lock().contains_key(&address)
    }

    fn write(&self, address: u16, data: &[u8]) {
        if let Some(target) = self.0.lock().get_mut(&address) {
            target.written.extend_from_slice(data);
        }
    }

    /// Move queued response bytes into `buffer`.
    fn read(&self, address: u16, buffer: &mut [u8]) -> usize {
        let mut targets = self.0.lock();
        let Some(target) = targets.get_mut(&address) else {
            return 0;
        };
        let mut n = 0;
        while n < buffer.len() {
            match target.response.pop_front() {
                Some(byte) => {
                    buffer[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }
}

/// Simulated bus controller.
pub struct SimBus {
    name: &'static str,
    kind: DeviceKind,
    config: BusConfig,
    clock: &'static (dyn Clock + Sync),
    lifecycle: StateMachine,
    power: PowerMode,
    transfer: TransferState,
    targets: BusTargets,
}

impl SimBus {
    pub fn new(
        name: &'static str,
        kind: DeviceKind,
        config: BusConfig,
        clock: &'static (dyn Clock + Sync),
    ) -> Self {
        Self {
            name,
            kind,
            config,
            clock,
            lifecycle: StateMachine::new(name),
            power: PowerMode::Off,
            transfer: TransferState::new(TargetMode::Required),
            targets: BusTargets::default(),
        }
    }

    /// Another handle to this bus's endpoints.
    pub fn targets(&self) -> BusTargets {
        self.targets.clone()
    }

    pub fn attach(&self, address: u16) {
        self.targets.attach(address);
    }

    pub fn detach(&self, address: u16) {
        self.targets.detach(address);
    }

    pub fn queue_response(&self, address: u16, bytes: &[u8]) -> Result<(), HalError> {
        self.targets.queue_response(address, bytes)
    }

    pub fn take_written(&self, address: u16) -> Result<Vec<u8>, HalError> {
        self.targets.take_written(address)
    }

    fn check_address(kind: DeviceKind, address: u16) -> Result<(), HalError> {
        if kind == DeviceKind::I2c && address > I2C_MAX_ADDRESS {
            return Err(HalError::InvalidParameter);
        }
        Ok(())
    }

    /// Running, target selected, and the target answers.
    fn selected(&mut self) -> Result<u16, HalError> {
        self.lifecycle
            .require_running()
            .and_then(|()| self.transfer.check_target())
            .map_err(|e| self.transfer.record_error(e))?;

        match self.transfer.target() {
            Some(address) if self.targets.contains(address) => Ok(address),
            _ => Err(self.transfer.record_error(HalError::NotFound)),
        }
    }
}

impl Lifecycle for SimBus {
    fn init(&mut self) -> Result<(), HalError> {
        self.lifecycle.init(|| {
            self.config.validate()?;
            self.transfer.reset();
            if let Some(address) = self.config.default_target {
                Self::check_address(self.kind, address)?;
                self.transfer.set_target(address);
            }
            self.power = PowerMode::Full;
            Ok(())
        })
    }

    fn deinit(&mut self) -> Result<(), HalError> {
        self.lifecycle.deinit(|| {
            self.transfer.reset();
            self.power = PowerMode::Off;
            Ok(())
        })
    }

    fn suspend(&mut self) -> Result<(), HalError> {
        self.lifecycle.suspend(|| Ok(()))
    }

    fn resume(&mut self) -> Result<(), HalError> {
        self.lifecycle.resume(|| Ok(()))
    }

    fn state(&self) -> DeviceState {
        self.lifecycle.state()
    }
}

impl Power for SimBus {
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

impl Diagnostic for SimBus {
    fn statistics(&self) -> TransferStats {
        self.transfer.stats()
    }

    fn reset_statistics(&mut self) {
        self.transfer.reset_stats();
    }

    /// Probe the selected target.
    fn self_test(&mut self) -> Result<(), HalError> {
        self.selected().map(|_| ())
    }

    fn last_error(&self) -> Option<HalError> {
        self.transfer.last_error()
    }
}

impl Addressable for SimBus {
    fn set_target(&mut self, address: u16) -> Result<(), HalError> {
        if !self.lifecycle.is_initialized() {
            return Err(HalError::NotInitialized);
        }
        Self::check_address(self.kind, address)?;
        debug!("{}: target {:#x}", self.name, address);
        self.transfer.set_target(address);
        Ok(())
    }

    fn target(&self) -> Option<u16> {
        self.transfer.target()
    }
}

impl TxSync for SimBus {
    /// Writes complete in one bus transaction, so `timeout` never expires.
    fn send(&mut self, data: &[u8], _timeout: Timeout) -> Result<usize, TransferError> {
        let address = self.selected()?;
        self.targets.write(address, data);
        self.transfer.record_sent(data.len());
        Ok(data.len())
    }
}

impl RxSync for SimBus {
    fn receive(&mut self, buffer: &mut [u8], timeout: Timeout) -> Result<usize, TransferError> {
        let address = self.selected()?;

        let deadline = Deadline::start(self.clock, timeout);
        let mut received = 0;
        loop {
            received += self.targets.read(address, &mut buffer[received..]);

            if received == buffer.len() {
                self.transfer.record_received(received);
                return Ok(received);
            }
            if deadline.expired(self.clock) {
                self.transfer.record_received(received);
                let error = self.transfer.record_error(HalError::Timeout);
                return Err(TransferError::new(error, received));
            }
            core::hint::spin_loop();
        }
    }
}

impl Device for SimBus {
    fn kind(&self) -> DeviceKind {
        self.kind
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

    fn addressable(&mut self) -> Option<&mut dyn Addressable> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
