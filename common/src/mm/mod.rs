//! Memory manager.
//!
//! - [`pool`]: bitmap-tracked fixed-size block pools over static regions
//! - [`manager`]: mode selection (static / dynamic / custom) and the
//!   process-wide counters

pub mod manager;
pub mod pool;

pub use manager::{
    CustomAllocator, MAX_POOLS, MemoryManager, MemoryMode, MemoryStats, PoolId, PoolStats,
};
pub use pool::{MAX_POOL_BLOCKS, MemoryPool};
