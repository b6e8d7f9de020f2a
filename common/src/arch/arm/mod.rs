//! ARM core support.

pub mod irq;

pub use irq::ArmIrq;
