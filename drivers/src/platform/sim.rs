//! Host simulation board.
//!
//! | name    | kind  | config                          |
//! |---------|-------|---------------------------------|
//! | `uart0` | UART  | 115200 8N1                      |
//! | `uart1` | UART  | 9600 8N1, loopback              |
//! | `i2c0`  | I2C   | 100 kHz, EEPROM at `0x50`       |
//! | `crc0`  | CRC   | none                            |
//!
//! Each row is compiled in only with its feature enabled.

use hal_common::HalError;
use hal_common::time::{Clock, SimClock};

use super::Platform;
use crate::device::DeviceKind;
use crate::hal::serial::SerialConfig;
use crate::peripheral::{BusConfig, SimBus, SimCrc, SimSerial};
use crate::registry::{DeviceRegistration, Placed, Placement};

/// UART as instantiated on this board.
pub type SimUart = SimSerial<64, 64>;

/// Address of the EEPROM attached to `i2c0`.
pub const EEPROM_ADDRESS: u16 = 0x50;

/// Board time base. Every read advances it by one millisecond.
pub static SIM_CLOCK: SimClock = SimClock::new(1);

static UART0_CONFIG: SerialConfig = SerialConfig::new_8n1(115_200);
static UART1_CONFIG: SerialConfig = SerialConfig::new_8n1(9_600).with_loopback();
static I2C0_CONFIG: BusConfig = BusConfig::standard();
static NO_CONFIG: () = ();

pub static DEVICES: &[DeviceRegistration] = &[
    #[cfg(feature = "uart0")]
    DeviceRegistration::new(DeviceKind::Uart, 0, "uart0", &UART0_CONFIG, uart_init),
    #[cfg(feature = "uart1")]
    DeviceRegistration::new(DeviceKind::Uart, 1, "uart1", &UART1_CONFIG, uart_init),
    #[cfg(feature = "i2c0")]
    DeviceRegistration::new(DeviceKind::I2c, 0, "i2c0", &I2C0_CONFIG, i2c_init),
    #[cfg(feature = "crc0")]
    DeviceRegistration::new(DeviceKind::Crc, 0, "crc0", &NO_CONFIG, crc_init),
];

pub struct SimPlatform;

impl Platform for SimPlatform {
    fn name() -> &'static str {
        "host simulation"
    }

    fn devices() -> &'static [DeviceRegistration] {
        DEVICES
    }

    fn clock() -> &'static (dyn Clock + Sync) {
        &SIM_CLOCK
    }
}

fn uart_init(registration: &DeviceRegistration, place: Placement<'_>) -> Result<Placed, HalError> {
    let config = registration.config::<SerialConfig>()?;
    config.validate()?;
    place.place(SimUart::new(registration.name, *config, &SIM_CLOCK))
}

fn i2c_init(registration: &DeviceRegistration, place: Placement<'_>) -> Result<Placed, HalError> {
    let config = registration.config::<BusConfig>()?;
    config.validate()?;
    let bus = SimBus::new(registration.name, registration.kind, *config, &SIM_CLOCK);
    bus.attach(EEPROM_ADDRESS);
    place.place(bus)
}

fn crc_init(registration: &DeviceRegistration, place: Placement<'_>) -> Result<Placed, HalError> {
    place.place(SimCrc::new(registration.name))
}
