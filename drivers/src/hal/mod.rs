//! Capability Interfaces - Platform-Independent Traits
//!
//! Each capability is a small trait. A peripheral implements the subset it
//! supports and exposes them side by side through
//! [`Device`](crate::device::Device); callers never see the concrete type.
//!
//! # Available Interfaces
//!
//! - [`lifecycle`]: init/deinit/suspend/resume state machine (mandatory)
//! - [`power`]: power modes
//! - [`diagnostic`]: statistics and self-test
//! - [`transfer`]: sync/async transmit and receive, bus targets
//! - [`serial`]: line configuration for UART instances

pub mod diagnostic;
pub mod lifecycle;
pub mod power;
pub mod serial;
pub mod transfer;
