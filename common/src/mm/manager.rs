use core::alloc::Layout;
use core::ptr::NonNull;

use log::{debug, warn};

use super::pool::MemoryPool;
use crate::error::HalError;

/// Maximum number of pools a manager can hold.
pub const MAX_POOLS: usize = 8;

/// Bytes reserved in front of every general allocation for its size.
const HEADER_SIZE: usize = 16;

/// Where general (non-pool) allocations come from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemoryMode {
    /// Pools only; `alloc` is refused.
    Static,
    /// The global heap.
    Dynamic,
    /// A caller-supplied [`CustomAllocator`].
    Custom,
}

/// Caller-supplied allocate/free pair.
///
/// The implementor carries whatever context it needs.
pub trait CustomAllocator: Send {
    /// Allocate `size` bytes aligned to at least 16 bytes.
    fn allocate(&mut self, size: usize) -> Option<NonNull<u8>>;

    /// Release memory previously returned by `allocate`.
    fn free(&mut self, ptr: NonNull<u8>, size: usize);
}

/// Identifies a pool registered with [`MemoryManager::add_pool`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PoolId(usize);

impl PoolId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Process-wide allocation counters.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MemoryStats {
    /// Bytes currently handed out
    pub allocated: usize,
    /// Highest value `allocated` has reached since the last reset
    pub peak: usize,
    /// Successful allocations
    pub alloc_count: usize,
    /// Successful frees
    pub free_count: usize,
    /// Failed allocations and rejected frees
    pub failures: usize,
}

/// Per-pool view of the counters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub block_size: usize,
    pub block_count: usize,
    pub allocated: usize,
    pub peak: usize,
}

/// Static-pool, heap or custom allocation with deterministic bookkeeping.
///
/// Every failure path bumps [`MemoryStats::failures`] and returns an error;
/// nothing here panics or aborts. The manager is plain data: wrap it in an
/// `IrqSpinLock` when interrupt handlers allocate.
pub struct MemoryManager {
    mode: MemoryMode,
    pools: [Option<MemoryPool>; MAX_POOLS],
    custom: Option<&'static mut dyn CustomAllocator>,
    stats: MemoryStats,
}

impl MemoryManager {
    pub const fn new(mode: MemoryMode) -> Self {
        Self {
            mode,
            pools: [const { None }; MAX_POOLS],
            custom: None,
            stats: MemoryStats {
                allocated: 0,
                peak: 0,
                alloc_count: 0,
                free_count: 0,
                failures: 0,
            },
        }
    }

    /// Manager in `Custom` mode forwarding to `allocator`.
    pub fn with_custom(allocator: &'static mut dyn CustomAllocator) -> Self {
        let mut manager = Self::new(MemoryMode::Custom);
        manager.custom = Some(allocator);
        manager
    }

    pub fn mode(&self) -> MemoryMode {
        self.mode
    }

    /// Register a static region as a block pool.
    pub fn add_pool(
        &mut self,
        region: &'static mut [u8],
        block_size: usize,
    ) -> Result<PoolId, HalError> {
        let Some(slot) = self.pools.iter().position(Option::is_none) else {
            self.stats.failures += 1;
            return Err(HalError::NoSpace);
        };

        let pool = MemoryPool::new(region, block_size).inspect_err(|_| {
            self.stats.failures += 1;
        })?;
        debug!(
            "mm: pool {} registered, {} x {} bytes",
            slot,
            pool.block_count(),
            block_size
        );
        self.pools[slot] = Some(pool);
        Ok(PoolId(slot))
    }

    /// General allocation of `size` bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter`: `size` is zero
    /// - `PermissionDenied`: the manager is in `Static` mode
    /// - `NullReference`: `Custom` mode without an allocator
    /// - `NoSpace`: the backing allocator is exhausted
    pub fn alloc(&mut self, size: usize) -> Result<NonNull<u8>, HalError> {
        let result = self.alloc_general(size);
        match result {
            Ok(_) => self.record_alloc(size),
            Err(err) => self.record_failure("alloc", err),
        }
        result
    }

    /// Storage for one value of `layout`.
    ///
    /// `Static` mode hands out the first free pool block that is large and
    /// aligned enough. The other modes use general allocation, which is
    /// aligned to 16 bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter`: zero size, or alignment above 16 outside
    ///   `Static` mode
    /// - `NoSpace`: no pool block fits (`Static`), or as [`alloc`]
    ///
    /// [`alloc`]: MemoryManager::alloc
    pub fn alloc_layout(&mut self, layout: Layout) -> Result<NonNull<u8>, HalError> {
        if self.mode != MemoryMode::Static {
            if layout.align() > HEADER_SIZE {
                self.record_failure("alloc_layout", HalError::InvalidParameter);
                return Err(HalError::InvalidParameter);
            }
            return self.alloc(layout.size());
        }

        let result = if layout.size() == 0 {
            Err(HalError::InvalidParameter)
        } else {
            self.pools
                .iter_mut()
                .flatten()
                .find(|p| p.available() > 0 && p.fits(layout.size(), layout.align()))
                .ok_or(HalError::NoSpace)
                .and_then(|p| p.alloc().map(|ptr| (ptr, p.block_size())))
        };

        match result {
            Ok((ptr, block_size)) => {
                self.record_alloc(block_size);
                Ok(ptr)
            }
            Err(err) => {
                self.record_failure("alloc_layout", err);
                Err(err)
            }
        }
    }

    /// Take one block from `pool`.
    pub fn alloc_from_pool(&mut self, pool: PoolId) -> Result<NonNull<u8>, HalError> {
        let result = match self.pools.get_mut(pool.0).and_then(Option::as_mut) {
            Some(p) => p.alloc().map(|ptr| (ptr, p.block_size())),
            None => Err(HalError::NotFound),
        };

        match result {
            Ok((ptr, block_size)) => {
                self.record_alloc(block_size);
                Ok(ptr)
            }
            Err(err) => {
                self.record_failure("alloc_from_pool", err);
                Err(err)
            }
        }
    }

    /// Return a block to `pool`, validating the pointer first.
    pub fn free_to_pool(&mut self, pool: PoolId, ptr: NonNull<u8>) -> Result<(), HalError> {
        let result = match self.pools.get_mut(pool.0).and_then(Option::as_mut) {
            Some(p) => p.free(ptr).map(|()| p.block_size()),
            None => Err(HalError::NotFound),
        };

        match result {
            Ok(block_size) => {
                self.record_free(block_size);
                Ok(())
            }
            Err(err) => {
                self.record_failure("free_to_pool", err);
                Err(err)
            }
        }
    }

    /// Free memory from either a pool or the general allocator.
    ///
    /// Pool blocks are recognised by address and validated.
    ///
    /// # Safety
    ///
    /// A pointer outside every pool must have been returned by [`alloc`]
    /// (or [`alloc_layout`]) on this manager and not freed since.
    ///
    /// [`alloc_layout`]: MemoryManager::alloc_layout
    ///
    /// [`alloc`]: MemoryManager::alloc
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) -> Result<(), HalError> {
        if let Some(id) = self.pool_of(ptr) {
            return self.free_to_pool(id, ptr);
        }

        let result = match self.mode {
            MemoryMode::Static => Err(HalError::InvalidParameter),
            // SAFETY: forwarded from the caller's contract.
            _ => unsafe { self.free_general(ptr) },
        };

        match result {
            Ok(size) => {
                self.record_free(size);
                Ok(())
            }
            Err(err) => {
                self.record_failure("free", err);
                Err(err)
            }
        }
    }

    /// Pool whose region contains `ptr`.
    pub fn pool_of(&self, ptr: NonNull<u8>) -> Option<PoolId> {
        self.pools
            .iter()
            .position(|p| p.as_ref().is_some_and(|p| p.contains(ptr)))
            .map(PoolId)
    }

    pub fn stats(&self) -> MemoryStats {
        self.stats
    }

    pub fn pool_stats(&self, pool: PoolId) -> Option<PoolStats> {
        self.pools.get(pool.0)?.as_ref().map(|p| PoolStats {
            block_size: p.block_size(),
            block_count: p.block_count(),
            allocated: p.allocated(),
            peak: p.peak(),
        })
    }

    /// Start a new measurement session: peak drops to the current level.
    pub fn reset_peak(&mut self) {
        self.stats.peak = self.stats.allocated;
    }

    fn alloc_general(&mut self, size: usize) -> Result<NonNull<u8>, HalError> {
        if size == 0 {
            return Err(HalError::InvalidParameter);
        }
        let total = size
            .checked_add(HEADER_SIZE)
            .ok_or(HalError::InvalidParameter)?;

        let raw = match self.mode {
            MemoryMode::Static => return Err(HalError::PermissionDenied),
            MemoryMode::Dynamic => {
                let layout = Self::layout(total)?;
                // SAFETY: layout has a non-zero size.
                NonNull::new(unsafe { alloc::alloc::alloc(layout) }).ok_or(HalError::NoSpace)?
            }
            MemoryMode::Custom => {
                let custom = self.custom.as_mut().ok_or(HalError::NullReference)?;
                custom.allocate(total).ok_or(HalError::NoSpace)?
            }
        };

        // SAFETY: `raw` points at `total` bytes, the header fits in front.
        unsafe {
            raw.as_ptr().cast::<usize>().write_unaligned(size);
            Ok(NonNull::new_unchecked(raw.as_ptr().add(HEADER_SIZE)))
        }
    }

    /// # Safety
    ///
    /// `ptr` must come from `alloc_general` on this manager.
    unsafe fn free_general(&mut self, ptr: NonNull<u8>) -> Result<usize, HalError> {
        // SAFETY: the header sits right before the user pointer.
        let (raw, size) = unsafe {
            let raw = NonNull::new_unchecked(ptr.as_ptr().sub(HEADER_SIZE));
            (raw, raw.as_ptr().cast::<usize>().read_unaligned())
        };
        let total = size + HEADER_SIZE;

        match self.mode {
            MemoryMode::Static => return Err(HalError::InvalidParameter),
            MemoryMode::Dynamic => {
                let layout = Self::layout(total)?;
                // SAFETY: same layout as the allocation.
                unsafe { alloc::alloc::dealloc(raw.as_ptr(), layout) };
            }
            MemoryMode::Custom => {
                let custom = self.custom.as_mut().ok_or(HalError::NullReference)?;
                custom.free(raw, total);
            }
        }
        Ok(size)
    }

    fn layout(total: usize) -> Result<Layout, HalError> {
        Layout::from_size_align(total, HEADER_SIZE).map_err(|_| HalError::InvalidParameter)
    }

    fn record_alloc(&mut self, bytes: usize) {
        self.stats.alloc_count += 1;
        self.stats.allocated += bytes;
        self.stats.peak = self.stats.peak.max(self.stats.allocated);
    }

    fn record_free(&mut self, bytes: usize) {
        self.stats.free_count += 1;
        self.stats.allocated = self.stats.allocated.saturating_sub(bytes);
    }

    fn record_failure(&mut self, op: &str, err: HalError) {
        self.stats.failures += 1;
        warn!("mm: {} failed: {}", op, err);
    }
}
