//! Simulated CRC-32 engine
//!
//! A compute-only peripheral: lifecycle, power and diagnostics, but no data
//! path capabilities. Callers reach [`SimCrc::compute`] through
//! [`Device::as_any_mut`].

use core::any::Any;

use hal_common::HalError;

use crate::device::{Device, DeviceKind};
use crate::hal::diagnostic::{Diagnostic, TransferStats};
use crate::hal::lifecycle::{DeviceState, Lifecycle, StateMachine};
use crate::hal::power::{Power, PowerMode};
use crate::hal::transfer::{TargetMode, TransferState};

/// Reflected IEEE 802.3 polynomial.
const POLY: u32 = 0xEDB8_8320;

/// CRC-32 of `"123456789"`.
const CHECK: u32 = 0xCBF4_3926;

pub struct SimCrc {
    name: &'static str,
    lifecycle: StateMachine,
    power: PowerMode,
    /// Only the byte counters and error bookkeeping are used
    transfer: TransferState,
    table: [u32; 256],
}

impl SimCrc {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            lifecycle: StateMachine::new(name),
            power: PowerMode::Off,
            transfer: TransferState::new(TargetMode::NotApplicable),
            table: [0; 256],
        }
    }

    /// CRC-32 (IEEE) of `data`.
    pub fn compute(&mut self, data: &[u8]) -> Result<u32, HalError> {
        self.lifecycle
            .require_running()
            .map_err(|e| self.transfer.record_error(e))?;

        let crc = data.iter().fold(!0u32, |crc, &byte| {
            self.table[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8)
        });
        self.transfer.record_sent(data.len());
        Ok(!crc)
    }

    fn build_table(table: &mut [u32; 256]) {
        for (i, entry) in table.iter_mut().enumerate() {
            let mut crc = i as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 { (crc >> 1) ^ POLY } else { crc >> 1 };
            }
            *entry = crc;
        }
    }
}

impl Lifecycle for SimCrc {
    fn init(&mut self) -> Result<(), HalError> {
        self.lifecycle.init(|| {
            Self::build_table(&mut self.table);
            self.transfer.reset();
            self.power = PowerMode::Full;
            Ok(())
        })
    }

    fn deinit(&mut self) -> Result<(), HalError> {
        self.lifecycle.deinit(|| {
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

impl Power for SimCrc {
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

impl Diagnostic for SimCrc {
    fn statistics(&self) -> TransferStats {
        self.transfer.stats()
    }

    fn reset_statistics(&mut self) {
        self.transfer.reset_stats();
    }

    /// Check the engine against the standard check value.
    fn self_test(&mut self) -> Result<(), HalError> {
        if self.compute(b"123456789")? == CHECK {
            Ok(())
        } else {
            self.lifecycle.fault();
            Err(self.transfer.record_error(HalError::InvalidState))
        }
    }

    fn last_error(&self) -> Option<HalError> {
        self.transfer.last_error()
    }
}

impl Device for SimCrc {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Crc
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

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
