//! Platform Abstraction Layer
//!
//! A platform is a board: the static table of enabled peripheral instances
//! and the time source their blocking operations wait against. Exactly one
//! platform is compiled in, chosen by Cargo feature.
//!
//! # Usage
//!
//! ```rust
//! use hal_drivers::HalConfig;
//! use hal_drivers::platform::{CurrentPlatform, Platform, bring_up};
//!
//! let hal = bring_up(HalConfig::default()).unwrap();
//! assert_eq!(hal.registry().len(), CurrentPlatform::devices().len());
//! ```

use hal_common::HalError;
use hal_common::time::Clock;
use log::debug;

use crate::context::{Hal, HalConfig};
use crate::registry::DeviceRegistration;

/// Platform trait - implemented by each supported board
pub trait Platform {
    /// Platform name for debugging
    fn name() -> &'static str;

    /// One registration per enabled peripheral instance
    fn devices() -> &'static [DeviceRegistration];

    /// Time source for blocking operations
    fn clock() -> &'static (dyn Clock + Sync);
}

/// Build and initialize a [`Hal`] over the current platform's devices.
pub fn bring_up(config: HalConfig) -> Result<Hal, HalError> {
    debug!("platform: {}", CurrentPlatform::name());
    let hal = Hal::new(config, CurrentPlatform::devices())?;
    hal.init()?;
    Ok(hal)
}

// Platform selection based on Cargo features
cfg_if::cfg_if! {
    if #[cfg(feature = "sim")] {
        pub mod sim;
        pub use sim::SimPlatform as CurrentPlatform;
    } else {
        compile_error!(
            "No platform selected!\n\
            Use: cargo build --features sim"
        );
    }
}
