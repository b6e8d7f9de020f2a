use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use hal_common::HalError;
use hal_common::mm::MemoryMode;
use hal_common::time::{StdClock, Timeout};
use hal_drivers::hal::serial::SerialConfig;
use hal_drivers::hal::transfer::TransferError;
use hal_drivers::peripheral::{SimBus, SimCrc};
use hal_drivers::platform::sim::{EEPROM_ADDRESS, SimUart};
use hal_drivers::platform::bring_up;
use hal_drivers::{
    Capabilities, DeviceKind, DeviceRegistration, DeviceState, Hal, HalConfig, Lifecycle, Placed,
    Placement,
};

#[test]
fn uart_async_send_then_short_receive() {
    let hal = bring_up(HalConfig::default()).unwrap();
    let uart = hal.lookup("uart0").unwrap();
    let mut dev = uart.lock().unwrap();
    dev.init().unwrap();

    let tx = dev.tx_async().unwrap();
    assert_eq!(tx.send_async(&[0xA5; 10]), Ok(10));
    assert!(tx.is_busy());
    assert_eq!(tx.free_space(), 64 - 10);

    let sim = dev.as_any_mut().downcast_mut::<SimUart>().unwrap();
    sim.on_rx(b"abc");

    let mut buf = [0u8; 8];
    let rx = dev.rx_sync().unwrap();
    let err = rx.receive(&mut buf, Timeout::Millis(5)).unwrap_err();
    assert_eq!(err, TransferError::new(HalError::Timeout, 3));
    assert_eq!(&buf[..3], b"abc");

    dev.deinit().unwrap();
    assert_eq!(dev.state(), DeviceState::Uninitialized);

    let err = dev.tx_sync().unwrap().send(b"x", Timeout::Forever).unwrap_err();
    assert_eq!(err.error, HalError::NotInitialized);
    let err = dev.rx_sync().unwrap().receive(&mut buf, Timeout::Forever).unwrap_err();
    assert_eq!(err.error, HalError::NotInitialized);
    assert_eq!(
        dev.tx_async().unwrap().send_async(b"x"),
        Err(HalError::NotInitialized)
    );
    assert_eq!(
        dev.rx_async().unwrap().read(&mut buf),
        Err(HalError::NotInitialized)
    );
}

#[test]
fn uart_receive_gets_bytes_fed_while_it_waits() {
    let hal = bring_up(HalConfig::default()).unwrap();
    let uart = hal.lookup("uart0").unwrap();
    let mut dev = uart.lock().unwrap();
    dev.init().unwrap();
    let line = dev.as_any_mut().downcast_mut::<SimUart>().unwrap().line();

    let feeder = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        line.on_rx(b"data")
    });

    let mut buf = [0u8; 4];
    assert_eq!(dev.rx_sync().unwrap().receive(&mut buf, Timeout::Forever), Ok(4));
    assert_eq!(&buf, b"data");
    assert_eq!(feeder.join().unwrap(), 4);
}

static WALL_CLOCK: LazyLock<StdClock> = LazyLock::new(StdClock::new);
static WALL_UART_CONFIG: SerialConfig = SerialConfig::new_8n1(115_200);

fn wall_uart(registration: &DeviceRegistration, place: Placement<'_>) -> Result<Placed, HalError> {
    let config = registration.config::<SerialConfig>()?;
    place.place(SimUart::new(registration.name, *config, &*WALL_CLOCK))
}

static WALL_DEVICES: &[DeviceRegistration] = &[DeviceRegistration::new(
    DeviceKind::Uart,
    0,
    "uart0",
    &WALL_UART_CONFIG,
    wall_uart,
)];

#[test]
fn uart_receive_deadline_falls_between_two_arrivals() {
    let hal = Hal::new(HalConfig::default(), WALL_DEVICES).unwrap();
    hal.init().unwrap();
    let uart = hal.lookup("uart0").unwrap();
    let mut dev = uart.lock().unwrap();
    dev.init().unwrap();
    let line = dev.as_any_mut().downcast_mut::<SimUart>().unwrap().line();

    let feeder = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        line.on_rx(b"ab");
        thread::sleep(Duration::from_millis(300));
        line.on_rx(b"cd");
    });

    let mut buf = [0u8; 4];
    let err = dev
        .rx_sync()
        .unwrap()
        .receive(&mut buf, Timeout::Millis(100))
        .unwrap_err();
    assert_eq!(err, TransferError::new(HalError::Timeout, 2));
    assert_eq!(&buf[..2], b"ab");

    feeder.join().unwrap();
    let mut rest = [0u8; 2];
    assert_eq!(dev.rx_sync().unwrap().receive(&mut rest, Timeout::Immediate), Ok(2));
    assert_eq!(&rest, b"cd");
    assert_eq!(dev.diagnostic().unwrap().statistics().timeouts, 1);
}

#[test]
fn loopback_uart_echoes_sync_transfers() {
    let hal = bring_up(HalConfig::default()).unwrap();
    let uart = hal.lookup("uart1").unwrap();
    let mut dev = uart.lock().unwrap();
    dev.init().unwrap();

    let sent = dev.tx_sync().unwrap().send(b"hello", Timeout::Millis(10));
    assert_eq!(sent, Ok(5));

    let mut echo = [0u8; 5];
    let got = dev.rx_sync().unwrap().receive(&mut echo, Timeout::Millis(10));
    assert_eq!(got, Ok(5));
    assert_eq!(&echo, b"hello");

    let stats = dev.diagnostic().unwrap().statistics();
    assert_eq!(stats.bytes_sent, 5);
    assert_eq!(stats.bytes_received, 5);
}

#[test]
fn bus_transfers_wait_for_a_target() {
    let hal = bring_up(HalConfig::default()).unwrap();
    let i2c = hal.lookup("i2c0").unwrap();
    let mut dev = i2c.lock().unwrap();
    dev.init().unwrap();
    assert!(dev.capabilities().contains(Capabilities::ADDRESSABLE));
    assert!(dev.tx_async().is_none());

    let err = dev.tx_sync().unwrap().send(&[0x00, 0x10], Timeout::Immediate).unwrap_err();
    assert_eq!(err.error, HalError::InvalidState);

    dev.addressable().unwrap().set_target(EEPROM_ADDRESS).unwrap();
    assert_eq!(dev.tx_sync().unwrap().send(&[0x00, 0x10], Timeout::Immediate), Ok(2));

    let bus = dev.as_any_mut().downcast_mut::<SimBus>().unwrap();
    assert_eq!(bus.take_written(EEPROM_ADDRESS).unwrap(), [0x00, 0x10]);
    bus.queue_response(EEPROM_ADDRESS, &[0xDE, 0xAD]).unwrap();

    let mut word = [0u8; 2];
    assert_eq!(dev.rx_sync().unwrap().receive(&mut word, Timeout::Millis(1)), Ok(2));
    assert_eq!(word, [0xDE, 0xAD]);
}

#[test]
fn crc_engine_has_no_transfer_capabilities() {
    let hal = bring_up(HalConfig::default()).unwrap();
    let crc = hal.lookup("crc0").unwrap();
    let mut dev = crc.lock().unwrap();

    assert!(dev.tx_sync().is_none());
    assert!(dev.rx_sync().is_none());
    assert!(dev.tx_async().is_none());
    assert!(dev.rx_async().is_none());
    assert!(dev.addressable().is_none());

    dev.init().unwrap();
    let engine = dev.as_any_mut().downcast_mut::<SimCrc>().unwrap();
    assert_eq!(engine.compute(b"123456789"), Ok(0xCBF4_3926));
    assert_eq!(dev.diagnostic().unwrap().self_test(), Ok(()));
}

#[test]
fn static_memory_through_the_context() {
    let hal = bring_up(HalConfig {
        memory_mode: MemoryMode::Static,
    })
    .unwrap();

    let region = Box::leak(vec![0u8; 4 * 64].into_boxed_slice());
    let mut memory = hal.memory();
    let pool = memory.add_pool(region, 64).unwrap();

    assert_eq!(memory.alloc(16).err(), Some(HalError::PermissionDenied));
    let block = memory.alloc_from_pool(pool).unwrap();
    memory.free_to_pool(pool, block).unwrap();

    let stats = memory.stats();
    assert_eq!(stats.alloc_count, 1);
    assert_eq!(stats.free_count, 1);
    assert_eq!(stats.failures, 1);
}
