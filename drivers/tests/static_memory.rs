use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

use hal_common::HalError;
use hal_common::mm::MemoryMode;
use hal_drivers::peripheral::SimCrc;
use hal_drivers::{
    DeviceKind, DeviceRegistration, DeviceState, Hal, HalConfig, Lifecycle, Placed, Placement,
};

/// Counts heap allocations made by the current thread.
struct Counting;

thread_local! {
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let _ = ALLOCATIONS.try_with(|n| n.set(n.get() + 1));
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static GLOBAL: Counting = Counting;

fn allocations() -> usize {
    ALLOCATIONS.with(Cell::get)
}

static NO_CONFIG: () = ();

fn crc(registration: &DeviceRegistration, place: Placement<'_>) -> Result<Placed, HalError> {
    place.place(SimCrc::new(registration.name))
}

static DEVICES: &[DeviceRegistration] = &[DeviceRegistration::new(
    DeviceKind::Crc,
    0,
    "crc0",
    &NO_CONFIG,
    crc,
)];

fn static_hal() -> Hal {
    let hal = Hal::new(
        HalConfig {
            memory_mode: MemoryMode::Static,
        },
        DEVICES,
    )
    .unwrap();
    hal.init().unwrap();
    hal
}

#[test]
fn static_lookup_builds_in_a_pool_block() {
    let hal = static_hal();
    let region = Box::leak(vec![0u8; 2 * 2048].into_boxed_slice());
    let pool = hal.memory().add_pool(region, 2048).unwrap();

    let before = allocations();
    let handle = hal.lookup("crc0").unwrap();
    {
        let mut dev = handle.lock().unwrap();
        dev.init().unwrap();
        assert_eq!(dev.state(), DeviceState::Running);
    }
    let again = hal.lookup("crc0").unwrap();
    assert!(again.same_device(&handle));
    assert_eq!(allocations(), before);

    assert_eq!(hal.memory().pool_stats(pool).unwrap().allocated, 1);
    drop((handle, again));
    hal.registry().reset("crc0").unwrap();
    assert_eq!(hal.memory().pool_stats(pool).unwrap().allocated, 0);
}

#[test]
fn static_lookup_without_a_pool_fails() {
    let hal = static_hal();

    let before = allocations();
    assert_eq!(hal.lookup("crc0").err(), Some(HalError::NoSpace));
    assert_eq!(allocations(), before);
    assert_eq!(hal.memory().stats().failures, 1);
}
