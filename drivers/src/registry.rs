//! Device registry and factory.
//!
//! Bridges compile-time configuration to runtime object identity. A board
//! declares one [`DeviceRegistration`] per enabled instance in a static
//! table; the [`Registry`] built from that table constructs each instance
//! lazily, at most once, on its first successful lookup and hands out
//! reference-counted [`DeviceHandle`]s to it.
//!
//! Instances are placed in memory from the registry's [`MemoryManager`], so
//! a `Static` manager keeps construction inside its pools and a lookup
//! never reaches the global heap.
//!
//! Construction failures are remembered and not retried: the caller must
//! [`reset`](Registry::reset) the entry before asking again.
//!
//! The device lock does not mask interrupts. Interrupt paths reach a driver
//! through its own shared state (e.g. a serial line), never through the
//! registry.

use alloc::vec::Vec;
use core::alloc::Layout;
use core::any::Any;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

use hal_common::HalError;
use hal_common::mm::{MemoryManager, MemoryMode};
use hal_common::sync::{AtomicCell, AtomicWord, IrqSpinLock, IrqSpinLockGuard};
use log::{debug, warn};

use crate::device::{Device, DeviceKind};
use crate::hal::lifecycle::{DeviceState, Lifecycle};

/// Builds the implementation object for a registration.
///
/// The function constructs its driver value and hands it to
/// [`Placement::place`].
pub type InitFn = fn(&DeviceRegistration, Placement<'_>) -> Result<Placed, HalError>;

/// Opaque per-instance configuration; its shape belongs to the driver.
pub type DeviceConfig = dyn Any + Send + Sync;

/// Static description of one enabled peripheral instance.
pub struct DeviceRegistration {
    pub kind: DeviceKind,
    pub index: u8,
    pub name: &'static str,
    pub config: &'static DeviceConfig,
    pub init: InitFn,
}

impl DeviceRegistration {
    pub const fn new(
        kind: DeviceKind,
        index: u8,
        name: &'static str,
        config: &'static DeviceConfig,
        init: InitFn,
    ) -> Self {
        Self {
            kind,
            index,
            name,
            config,
            init,
        }
    }

    /// The configuration blob as the driver's own type.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if the blob is of a different type.
    pub fn config<T: Any>(&self) -> Result<&'static T, HalError> {
        let config: &'static DeviceConfig = self.config;
        config.downcast_ref::<T>().ok_or(HalError::InvalidParameter)
    }
}

/// Memory a device is about to be constructed into.
pub struct Placement<'a> {
    memory: &'a mut MemoryManager,
    generation: u32,
}

impl Placement<'_> {
    /// Move `device` into storage from the memory manager.
    ///
    /// # Errors
    ///
    /// As [`MemoryManager::alloc_layout`]: `NoSpace` when a `Static`
    /// manager has no free pool block that fits.
    pub fn place<T: Device + 'static>(self, device: T) -> Result<Placed, HalError> {
        let raw = self.memory.alloc_layout(Layout::new::<T>())?;
        let ptr = raw.cast::<T>();
        // SAFETY: fresh storage sized and aligned for `T`.
        unsafe { ptr.as_ptr().write(device) };
        Ok(Placed {
            device: ptr,
            generation: self.generation,
        })
    }
}

/// A device living in memory-manager storage.
pub struct Placed {
    device: NonNull<dyn Device>,
    /// Slot generation the instance belongs to
    generation: u32,
}

// SAFETY: `Placed` uniquely owns its device, and `Device: Send`.
unsafe impl Send for Placed {}

impl core::fmt::Debug for Placed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Placed")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Drop a placed device and return its storage.
fn destroy(name: &str, placed: Placed, memory: &IrqSpinLock<MemoryManager>) {
    let ptr = placed.device;
    // SAFETY: `placed` was the only owner; nothing else refers to it.
    unsafe {
        let device = &mut *ptr.as_ptr();
        if device.state() != DeviceState::Uninitialized {
            if let Err(err) = device.deinit() {
                warn!("registry: {} deinit during teardown failed: {}", name, err);
            }
        }
        core::ptr::drop_in_place(ptr.as_ptr());
    }
    // SAFETY: the storage came from `alloc_layout` on this manager.
    if unsafe { memory.lock().free(ptr.cast()) }.is_ok() {
        debug!("registry: {} released", name);
    }
}

/// Construction phase of a slot.
enum Phase {
    /// Not constructed yet.
    Vacant,
    /// Constructed and shared.
    Ready,
    /// Construction failed; kept until an explicit reset.
    Failed(HalError),
}

/// Runtime record paired with each registration.
struct Slot {
    registration: &'static DeviceRegistration,
    phase: IrqSpinLock<Phase>,
    /// The instance itself; locking it does not mask interrupts
    device: spin::Mutex<Option<Placed>>,
    /// Live handles
    users: AtomicCell,
    /// Bumped whenever the instance is torn down; stale handles compare it
    generation: AtomicCell,
}

/// Snapshot of one registry entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: &'static str,
    pub kind: DeviceKind,
    pub index: u8,
    pub constructed: bool,
    pub users: usize,
}

impl Slot {
    /// Destroy the instance in `cell` if the slot has moved past it.
    fn sweep(&self, cell: &mut Option<Placed>, memory: &IrqSpinLock<MemoryManager>) {
        let generation = self.generation.load();
        if cell.as_ref().is_some_and(|p| p.generation != generation) {
            if let Some(placed) = cell.take() {
                destroy(self.registration.name, placed, memory);
            }
        }
    }
}

/// Name/index lookup over a static registration table.
pub struct Registry {
    slots: Vec<Slot>,
    memory: IrqSpinLock<MemoryManager>,
}

impl Registry {
    /// Build the registry for `registrations`, constructing devices on the
    /// global heap.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if two registrations share a name.
    pub fn new(registrations: &'static [DeviceRegistration]) -> Result<Self, HalError> {
        Self::with_memory(registrations, MemoryManager::new(MemoryMode::Dynamic))
    }

    /// Build the registry for `registrations`, constructing devices in
    /// memory from `memory`.
    pub fn with_memory(
        registrations: &'static [DeviceRegistration],
        memory: MemoryManager,
    ) -> Result<Self, HalError> {
        for (i, reg) in registrations.iter().enumerate() {
            if registrations[..i].iter().any(|r| r.name == reg.name) {
                warn!("registry: duplicate device name {}", reg.name);
                return Err(HalError::InvalidParameter);
            }
        }

        let slots = registrations
            .iter()
            .map(|registration| Slot {
                registration,
                phase: IrqSpinLock::new(Phase::Vacant),
                device: spin::Mutex::new(None),
                users: AtomicCell::new(0),
                generation: AtomicCell::new(0),
            })
            .collect();

        Ok(Self {
            slots,
            memory: IrqSpinLock::new(memory),
        })
    }

    /// Look up a device by name, constructing it on first use.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unregistered name; the stored construction error
    /// if the instance failed to build; `Busy` while a guard taken before a
    /// teardown still holds the previous instance.
    pub fn lookup(&self, name: &str) -> Result<DeviceHandle<'_>, HalError> {
        let slot = self
            .slots
            .iter()
            .find(|s| s.registration.name == name)
            .ok_or(HalError::NotFound)?;
        self.acquire(slot)
    }

    /// Look up a device by kind and instance index.
    pub fn lookup_index(&self, kind: DeviceKind, index: u8) -> Result<DeviceHandle<'_>, HalError> {
        let slot = self
            .slots
            .iter()
            .find(|s| s.registration.kind == kind && s.registration.index == index)
            .ok_or(HalError::NotFound)?;
        self.acquire(slot)
    }

    /// Registered names, in table order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.iter().map(|s| s.registration.name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn info(&self, name: &str) -> Option<DeviceInfo> {
        let slot = self.slots.iter().find(|s| s.registration.name == name)?;
        let constructed = matches!(*slot.phase.lock(), Phase::Ready);
        Some(DeviceInfo {
            name: slot.registration.name,
            kind: slot.registration.kind,
            index: slot.registration.index,
            constructed,
            users: slot.users.load() as usize,
        })
    }

    pub fn is_constructed(&self, name: &str) -> bool {
        self.info(name).is_some_and(|info| info.constructed)
    }

    /// Lock the memory manager devices are constructed from.
    pub fn memory(&self) -> IrqSpinLockGuard<'_, MemoryManager> {
        self.memory.lock()
    }

    /// Drop a constructed or failed instance so the next lookup builds it
    /// again.
    ///
    /// A running device is de-initialized first.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown name, `Busy` while handles are live.
    pub fn reset(&self, name: &str) -> Result<(), HalError> {
        let slot = self
            .slots
            .iter()
            .find(|s| s.registration.name == name)
            .ok_or(HalError::NotFound)?;

        let mut phase = slot.phase.lock();
        let users = slot.users.load();
        if users > 0 {
            return Err(HalError::Busy);
        }
        self.teardown(slot, &mut phase);
        Ok(())
    }

    /// Tear down every instance regardless of live handles.
    ///
    /// Outstanding handles become stale and report `NullReference`. An
    /// instance locked at this moment is left to its guard, which destroys
    /// it on release.
    pub(crate) fn reset_all(&self) {
        for slot in &self.slots {
            let mut phase = slot.phase.lock();
            self.teardown(slot, &mut phase);
            slot.users.store(0);
        }
    }

    fn teardown(&self, slot: &Slot, phase: &mut Phase) {
        if matches!(phase, Phase::Vacant) {
            return;
        }
        slot.generation.fetch_add(1);
        *phase = Phase::Vacant;

        match slot.device.try_lock() {
            Some(mut cell) => slot.sweep(&mut cell, &self.memory),
            None => warn!(
                "registry: {} is locked, teardown deferred to its guard",
                slot.registration.name
            ),
        }
    }

    fn acquire<'r>(&'r self, slot: &'r Slot) -> Result<DeviceHandle<'r>, HalError> {
        let mut phase = slot.phase.lock();

        match *phase {
            Phase::Ready => {}
            Phase::Failed(err) => return Err(err),
            Phase::Vacant => {
                // A stale guard may still hold the previous instance.
                let mut cell = slot.device.try_lock().ok_or(HalError::Busy)?;
                slot.sweep(&mut cell, &self.memory);

                let registration = slot.registration;
                let mut memory = self.memory.lock();
                let placement = Placement {
                    memory: &mut memory,
                    generation: slot.generation.load(),
                };
                match (registration.init)(registration, placement) {
                    Ok(placed) => {
                        debug!("registry: {} constructed", registration.name);
                        *cell = Some(placed);
                        *phase = Phase::Ready;
                    }
                    Err(err) => {
                        warn!("registry: {} construction failed: {}", registration.name, err);
                        *phase = Phase::Failed(err);
                        return Err(err);
                    }
                }
            }
        }

        slot.users.fetch_add(1);
        Ok(DeviceHandle {
            registry: self,
            slot,
            generation: slot.generation.load(),
        })
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        for slot in &mut self.slots {
            if let Some(placed) = slot.device.get_mut().take() {
                destroy(slot.registration.name, placed, &self.memory);
            }
        }
    }
}

/// Counted reference to a constructed device.
///
/// Dropping (or [`release`](DeviceHandle::release)-ing) the handle only
/// decrements the user count; the instance stays alive in the registry.
pub struct DeviceHandle<'r> {
    registry: &'r Registry,
    slot: &'r Slot,
    generation: u32,
}

impl DeviceHandle<'_> {
    /// Lock the device for dispatch, waiting for other holders.
    ///
    /// # Errors
    ///
    /// `NullReference` if the instance was torn down after this handle was
    /// obtained.
    pub fn lock(&self) -> Result<DeviceGuard<'_>, HalError> {
        if !self.is_valid() {
            return Err(HalError::NullReference);
        }

        let mut cell = self.slot.device.lock();
        if !self.is_valid() {
            self.slot.sweep(&mut cell, &self.registry.memory);
            return Err(HalError::NullReference);
        }
        let device = cell.as_ref().ok_or(HalError::NullReference)?.device;
        Ok(DeviceGuard {
            cell,
            device,
            slot: self.slot,
            memory: &self.registry.memory,
        })
    }

    /// Whether the instance behind this handle is still the live one.
    pub fn is_valid(&self) -> bool {
        self.slot.generation.load() == self.generation
    }

    pub fn name(&self) -> &'static str {
        self.slot.registration.name
    }

    pub fn kind(&self) -> DeviceKind {
        self.slot.registration.kind
    }

    pub fn index(&self) -> u8 {
        self.slot.registration.index
    }

    /// Live handles on this instance, this one included.
    pub fn user_count(&self) -> usize {
        self.slot.users.load() as usize
    }

    /// Whether both handles refer to the same instance.
    pub fn same_device(&self, other: &DeviceHandle<'_>) -> bool {
        core::ptr::eq(self.slot, other.slot) && self.generation == other.generation
    }

    /// Give the handle back.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for DeviceHandle<'_> {
    fn drop(&mut self) {
        // Teardown zeroes the count under the same lock.
        let _phase = self.slot.phase.lock();
        if self.is_valid() {
            self.slot.users.fetch_sub(1);
        }
    }
}

impl core::fmt::Debug for DeviceHandle<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("name", &self.name())
            .field("generation", &self.generation)
            .finish()
    }
}

/// Exclusive access to a device while the guard lives.
///
/// A guard that outlives a teardown of its instance destroys the instance
/// when released.
pub struct DeviceGuard<'a> {
    cell: spin::MutexGuard<'a, Option<Placed>>,
    device: NonNull<dyn Device>,
    slot: &'a Slot,
    memory: &'a IrqSpinLock<MemoryManager>,
}

impl Deref for DeviceGuard<'_> {
    type Target = dyn Device;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the slot lock is held, so the instance stays in place.
        unsafe { self.device.as_ref() }
    }
}

impl DerefMut for DeviceGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: as in `deref`, and the lock makes the access exclusive.
        unsafe { self.device.as_mut() }
    }
}

impl Drop for DeviceGuard<'_> {
    fn drop(&mut self) {
        self.slot.sweep(&mut self.cell, self.memory);
    }
}
