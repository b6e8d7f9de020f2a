use core::ptr::NonNull;

use crate::error::HalError;

/// Largest number of blocks a single pool can track.
pub const MAX_POOL_BLOCKS: usize = 256;

const BITMAP_WORDS: usize = MAX_POOL_BLOCKS / 32;

/// Fixed-size block pool over a static memory region.
///
/// The region is split into `block_count` blocks of `block_size` bytes,
/// tracked by an occupancy bitmap. Allocation takes the first free block,
/// so a freed block is the next one handed out if it is the lowest free one.
///
/// The pool never touches the contents of its blocks; all bookkeeping lives
/// in the bitmap and counters.
pub struct MemoryPool {
    /// Start of the managed region
    base: NonNull<u8>,

    block_size: usize,

    block_count: usize,

    /// Bit `i` set means block `i` is in use
    bitmap: [u32; BITMAP_WORDS],

    allocated: usize,

    /// High-water mark of `allocated`
    peak: usize,
}

// SAFETY: the pool exclusively owns its `'static` region; moving it to
// another context moves that ownership.
unsafe impl Send for MemoryPool {}

impl MemoryPool {
    /// Partition `region` into blocks of `block_size` bytes.
    ///
    /// Trailing bytes that do not fill a whole block are left unused.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if `block_size` is zero, the region holds no whole
    /// block, or it would hold more than [`MAX_POOL_BLOCKS`] blocks.
    pub fn new(region: &'static mut [u8], block_size: usize) -> Result<Self, HalError> {
        if block_size == 0 {
            return Err(HalError::InvalidParameter);
        }

        let block_count = region.len() / block_size;
        if block_count == 0 || block_count > MAX_POOL_BLOCKS {
            return Err(HalError::InvalidParameter);
        }

        let base = NonNull::new(region.as_mut_ptr()).ok_or(HalError::NullReference)?;

        Ok(Self {
            base,
            block_size,
            block_count,
            bitmap: [0; BITMAP_WORDS],
            allocated: 0,
            peak: 0,
        })
    }

    /// Take the first free block.
    ///
    /// # Errors
    ///
    /// `NoSpace` when every block is in use.
    pub fn alloc(&mut self) -> Result<NonNull<u8>, HalError> {
        let index = self.first_free().ok_or(HalError::NoSpace)?;

        self.bitmap[index / 32] |= 1 << (index % 32);
        self.allocated += 1;
        self.peak = self.peak.max(self.allocated);

        // SAFETY: index < block_count, so the offset stays inside the region.
        let ptr = unsafe { self.base.as_ptr().add(index * self.block_size) };
        NonNull::new(ptr).ok_or(HalError::NullReference)
    }

    /// Return a block to the pool.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if `ptr` is outside the pool, not on a block
    /// boundary, or names a block that is not allocated. The bitmap is left
    /// untouched in every error case.
    pub fn free(&mut self, ptr: NonNull<u8>) -> Result<(), HalError> {
        let index = self.block_index(ptr).ok_or(HalError::InvalidParameter)?;

        let mask = 1 << (index % 32);
        if self.bitmap[index / 32] & mask == 0 {
            return Err(HalError::InvalidParameter);
        }

        self.bitmap[index / 32] &= !mask;
        self.allocated -= 1;
        Ok(())
    }

    /// Whether `ptr` falls anywhere inside the pool's region.
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        let start = self.base.as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;
        addr >= start && addr < start + self.block_count * self.block_size
    }

    /// Block number of `ptr` if it is a block start inside the pool.
    pub fn block_index(&self, ptr: NonNull<u8>) -> Option<usize> {
        if !self.contains(ptr) {
            return None;
        }

        let offset = ptr.as_ptr() as usize - self.base.as_ptr() as usize;
        if offset % self.block_size != 0 {
            return None;
        }
        Some(offset / self.block_size)
    }

    pub fn is_allocated(&self, index: usize) -> bool {
        index < self.block_count && self.bitmap[index / 32] & (1 << (index % 32)) != 0
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn available(&self) -> usize {
        self.block_count - self.allocated
    }

    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Whether every block starts on an `align`-byte boundary.
    pub fn fits(&self, size: usize, align: usize) -> bool {
        self.block_size >= size
            && self.block_size % align == 0
            && self.base.as_ptr() as usize % align == 0
    }

    fn first_free(&self) -> Option<usize> {
        for (word_index, word) in self.bitmap.iter().enumerate() {
            if *word == u32::MAX {
                continue;
            }
            let index = word_index * 32 + word.trailing_ones() as usize;
            return (index < self.block_count).then_some(index);
        }
        None
    }
}

impl core::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("base", &self.base)
            .field("block_size", &self.block_size)
            .field("block_count", &self.block_count)
            .field("allocated", &self.allocated)
            .field("peak", &self.peak)
            .finish()
    }
}
