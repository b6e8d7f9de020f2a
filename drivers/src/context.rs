//! The HAL context.
//!
//! All process-wide state (registry, the memory manager devices are built
//! in, the layer's own initialized flag) lives in one explicitly constructed
//! [`Hal`] value
//! instead of hidden singletons, so tests can run several independent
//! instances side by side. Firmware typically places one in a `static`.

use hal_common::HalError;
use hal_common::mm::{MemoryManager, MemoryMode};
use hal_common::sync::{AtomicCell, AtomicWord, IrqSpinLockGuard};
use log::debug;

use crate::device::DeviceKind;
use crate::registry::{DeviceHandle, DeviceRegistration, Registry};

/// Layer-wide configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HalConfig {
    pub memory_mode: MemoryMode,
}

impl Default for HalConfig {
    /// Heap-backed general allocation.
    fn default() -> Self {
        Self {
            memory_mode: MemoryMode::Dynamic,
        }
    }
}

pub struct Hal {
    registry: Registry,
    initialized: AtomicCell,
}

impl Hal {
    /// Build a context over a static registration table.
    pub fn new(
        config: HalConfig,
        registrations: &'static [DeviceRegistration],
    ) -> Result<Self, HalError> {
        let memory = MemoryManager::new(config.memory_mode);
        Ok(Self::from_registry(Registry::with_memory(
            registrations,
            memory,
        )?))
    }

    /// Build a context around an existing registry, e.g. one whose memory
    /// manager uses custom allocation or pre-registered pools.
    pub fn from_registry(registry: Registry) -> Self {
        Self {
            registry,
            initialized: AtomicCell::new(0),
        }
    }

    /// Bring the layer up. Calling it again is a no-op.
    pub fn init(&self) -> Result<(), HalError> {
        let mut expected = 0;
        if self.initialized.compare_exchange(&mut expected, 1) {
            debug!("hal: initialized, {} devices registered", self.registry.len());
        }
        Ok(())
    }

    /// Take the layer down: every constructed device is de-initialized and
    /// dropped, and outstanding handles go stale. A device locked at this
    /// moment is dropped when its guard is released. Calling it again is a
    /// no-op.
    pub fn deinit(&self) -> Result<(), HalError> {
        let mut expected = 1;
        if self.initialized.compare_exchange(&mut expected, 0) {
            self.registry.reset_all();
            debug!("hal: deinitialized");
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load() != 0
    }

    /// Look up a device by name.
    ///
    /// # Errors
    ///
    /// `NotInitialized` before [`init`](Hal::init), otherwise as
    /// [`Registry::lookup`].
    pub fn lookup(&self, name: &str) -> Result<DeviceHandle<'_>, HalError> {
        self.require_initialized()?;
        self.registry.lookup(name)
    }

    /// Look up a device by kind and instance index.
    pub fn lookup_index(&self, kind: DeviceKind, index: u8) -> Result<DeviceHandle<'_>, HalError> {
        self.require_initialized()?;
        self.registry.lookup_index(kind, index)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Lock the memory manager.
    pub fn memory(&self) -> IrqSpinLockGuard<'_, MemoryManager> {
        self.registry.memory()
    }

    fn require_initialized(&self) -> Result<(), HalError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(HalError::NotInitialized)
        }
    }
}
