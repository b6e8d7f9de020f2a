//! Device lifecycle.
//!
//! Every device instance moves through the same states:
//!
//! ```text
//! Uninitialized --init--> Running --suspend--> Suspended
//!       ^                  ^   |                   |
//!       |                  |   +<-----resume-------+
//!       +------deinit------+---+-------deinit------+
//! ```
//!
//! `Error` can be entered from any state on an unrecoverable fault and is
//! left only through `deinit` or a fresh `init`.

use hal_common::HalError;
use log::debug;

/// Lifecycle state of one device instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceState {
    Uninitialized,
    Running,
    Suspended,
    Error,
}

/// Lifecycle capability. Mandatory for every device.
pub trait Lifecycle {
    /// Establish buffers and resources, clear statistics.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized` unless the device is `Uninitialized` (or in
    /// `Error`, which allows re-initialization).
    fn init(&mut self) -> Result<(), HalError>;

    /// Release logical ownership of the device's resources.
    ///
    /// # Errors
    ///
    /// `NotInitialized` if the device was never initialized.
    fn deinit(&mut self) -> Result<(), HalError>;

    /// Pause the device, keeping configuration and buffered data.
    ///
    /// # Errors
    ///
    /// `NotInitialized` if uninitialized, `InvalidState` unless `Running`.
    fn suspend(&mut self) -> Result<(), HalError>;

    /// Continue after [`suspend`](Lifecycle::suspend).
    ///
    /// # Errors
    ///
    /// `NotInitialized` if uninitialized, `InvalidState` unless `Suspended`.
    fn resume(&mut self) -> Result<(), HalError>;

    fn state(&self) -> DeviceState;
}

/// State bookkeeping devices embed to implement [`Lifecycle`].
///
/// Each transition checks the current state, runs the device's hook and
/// only commits the new state when the hook succeeds.
#[derive(Debug)]
pub struct StateMachine {
    name: &'static str,
    state: DeviceState,
}

impl StateMachine {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            state: DeviceState::Uninitialized,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Running or suspended.
    pub fn is_initialized(&self) -> bool {
        matches!(self.state, DeviceState::Running | DeviceState::Suspended)
    }

    /// Gate for data-path operations.
    ///
    /// `NotInitialized` when uninitialized, `InvalidState` when suspended or
    /// faulted.
    pub fn require_running(&self) -> Result<(), HalError> {
        match self.state {
            DeviceState::Running => Ok(()),
            DeviceState::Uninitialized => Err(HalError::NotInitialized),
            DeviceState::Suspended | DeviceState::Error => Err(HalError::InvalidState),
        }
    }

    pub fn init(&mut self, setup: impl FnOnce() -> Result<(), HalError>) -> Result<(), HalError> {
        match self.state {
            DeviceState::Uninitialized | DeviceState::Error => {}
            DeviceState::Running | DeviceState::Suspended => {
                return Err(HalError::AlreadyInitialized);
            }
        }
        setup()?;
        self.commit(DeviceState::Running);
        Ok(())
    }

    pub fn deinit(
        &mut self,
        teardown: impl FnOnce() -> Result<(), HalError>,
    ) -> Result<(), HalError> {
        if self.state == DeviceState::Uninitialized {
            return Err(HalError::NotInitialized);
        }
        teardown()?;
        self.commit(DeviceState::Uninitialized);
        Ok(())
    }

    pub fn suspend(&mut self, park: impl FnOnce() -> Result<(), HalError>) -> Result<(), HalError> {
        match self.state {
            DeviceState::Running => {}
            DeviceState::Uninitialized => return Err(HalError::NotInitialized),
            DeviceState::Suspended | DeviceState::Error => return Err(HalError::InvalidState),
        }
        park()?;
        self.commit(DeviceState::Suspended);
        Ok(())
    }

    pub fn resume(&mut self, wake: impl FnOnce() -> Result<(), HalError>) -> Result<(), HalError> {
        match self.state {
            DeviceState::Suspended => {}
            DeviceState::Uninitialized => return Err(HalError::NotInitialized),
            DeviceState::Running | DeviceState::Error => return Err(HalError::InvalidState),
        }
        wake()?;
        self.commit(DeviceState::Running);
        Ok(())
    }

    /// Record an unrecoverable fault.
    pub fn fault(&mut self) {
        self.commit(DeviceState::Error);
    }

    fn commit(&mut self, next: DeviceState) {
        debug!("{}: {:?} -> {:?}", self.name, self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok() -> Result<(), HalError> {
        Ok(())
    }

    #[test]
    fn full_cycle() {
        let mut sm = StateMachine::new("dev");
        sm.init(ok).unwrap();
        sm.suspend(ok).unwrap();
        assert!(sm.is_initialized());
        sm.resume(ok).unwrap();
        sm.suspend(ok).unwrap();
        sm.deinit(ok).unwrap();
        assert_eq!(sm.state(), DeviceState::Uninitialized);
    }

    #[test]
    fn illegal_transitions_report_specific_codes() {
        let mut sm = StateMachine::new("dev");
        assert_eq!(sm.deinit(ok), Err(HalError::NotInitialized));
        assert_eq!(sm.suspend(ok), Err(HalError::NotInitialized));
        assert_eq!(sm.resume(ok), Err(HalError::NotInitialized));

        sm.init(ok).unwrap();
        assert_eq!(sm.init(ok), Err(HalError::AlreadyInitialized));
        assert_eq!(sm.resume(ok), Err(HalError::InvalidState));

        sm.suspend(ok).unwrap();
        assert_eq!(sm.suspend(ok), Err(HalError::InvalidState));
        assert_eq!(sm.init(ok), Err(HalError::AlreadyInitialized));
    }

    #[test]
    fn failed_hook_keeps_state() {
        let mut sm = StateMachine::new("dev");
        assert_eq!(sm.init(|| Err(HalError::NoSpace)), Err(HalError::NoSpace));
        assert_eq!(sm.state(), DeviceState::Uninitialized);
    }

    #[test]
    fn error_is_left_by_deinit_or_reinit() {
        let mut sm = StateMachine::new("dev");
        sm.init(ok).unwrap();
        sm.fault();
        assert_eq!(sm.require_running(), Err(HalError::InvalidState));
        assert_eq!(sm.suspend(ok), Err(HalError::InvalidState));
        assert_eq!(sm.resume(ok), Err(HalError::InvalidState));

        sm.init(ok).unwrap();
        assert_eq!(sm.state(), DeviceState::Running);

        sm.fault();
        sm.deinit(ok).unwrap();
        assert_eq!(sm.state(), DeviceState::Uninitialized);
    }
}
