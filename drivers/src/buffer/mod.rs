//! Buffers shared by streaming peripheral drivers.
//!
//! - [`ring`]: fixed-capacity circular byte buffer

pub mod ring;

pub use ring::RingBuffer;
