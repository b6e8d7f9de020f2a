use hal_common::HalError;
use hal_common::time::Timeout;
use hal_drivers::hal::power::PowerMode;
use hal_drivers::platform::sim::SimUart;
use hal_drivers::platform::bring_up;
use hal_drivers::{DeviceState, HalConfig, Lifecycle};

#[test]
fn every_device_walks_the_same_state_sequence() {
    let hal = bring_up(HalConfig::default()).unwrap();
    let names: Vec<_> = hal.registry().names().collect();

    for name in names {
        let handle = hal.lookup(name).unwrap();
        let mut dev = handle.lock().unwrap();

        assert_eq!(dev.state(), DeviceState::Uninitialized, "{name}");
        assert_eq!(dev.deinit(), Err(HalError::NotInitialized), "{name}");
        assert_eq!(dev.suspend(), Err(HalError::NotInitialized), "{name}");
        assert_eq!(dev.resume(), Err(HalError::NotInitialized), "{name}");

        dev.init().unwrap();
        assert_eq!(dev.init(), Err(HalError::AlreadyInitialized), "{name}");
        assert_eq!(dev.resume(), Err(HalError::InvalidState), "{name}");

        for _ in 0..3 {
            dev.suspend().unwrap();
            assert_eq!(dev.state(), DeviceState::Suspended, "{name}");
            assert_eq!(dev.suspend(), Err(HalError::InvalidState), "{name}");
            dev.resume().unwrap();
            assert_eq!(dev.state(), DeviceState::Running, "{name}");
        }

        dev.deinit().unwrap();
        assert_eq!(dev.state(), DeviceState::Uninitialized, "{name}");
    }
}

#[test]
fn suspended_uart_keeps_data_and_refuses_transfers() {
    let hal = bring_up(HalConfig::default()).unwrap();
    let handle = hal.lookup("uart0").unwrap();
    let mut dev = handle.lock().unwrap();
    dev.init().unwrap();

    dev.as_any_mut()
        .downcast_mut::<SimUart>()
        .unwrap()
        .on_rx(b"held");
    dev.suspend().unwrap();

    let mut buf = [0u8; 4];
    let err = dev.rx_sync().unwrap().receive(&mut buf, Timeout::Immediate).unwrap_err();
    assert_eq!(err.error, HalError::InvalidState);
    assert_eq!(dev.rx_async().unwrap().available(), 4);

    dev.power().unwrap().set_power(PowerMode::Sleep).unwrap();
    dev.resume().unwrap();
    assert_eq!(dev.rx_sync().unwrap().receive(&mut buf, Timeout::Immediate), Ok(4));
    assert_eq!(&buf, b"held");
}

#[test]
fn reinit_after_fault_clears_statistics() {
    let hal = bring_up(HalConfig::default()).unwrap();
    let handle = hal.lookup("uart1").unwrap();
    let mut dev = handle.lock().unwrap();
    dev.init().unwrap();

    dev.tx_async().unwrap().send_async(b"abc").unwrap();
    assert_eq!(dev.diagnostic().unwrap().statistics().bytes_sent, 3);

    let uart = dev.as_any_mut().downcast_mut::<SimUart>().unwrap();
    uart.fault();
    assert_eq!(dev.state(), DeviceState::Error);
    assert_eq!(dev.suspend(), Err(HalError::InvalidState));

    dev.init().unwrap();
    assert_eq!(dev.state(), DeviceState::Running);
    assert_eq!(dev.diagnostic().unwrap().statistics().bytes_sent, 0);
    assert!(!dev.tx_async().unwrap().is_busy());
}
