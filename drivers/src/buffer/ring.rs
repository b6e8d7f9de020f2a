//! Fixed-capacity circular byte buffer.
//!
//! Writes and reads never block and never overrun: they move as many bytes
//! as fit (or as are available) and report the count. A copy that straddles
//! the end of the backing array is split into two contiguous copies.

/// Byte ring of capacity `N`.
///
/// Invariants: `count <= N`, and `head`/`tail` are always `< N` (both are
/// zero when `N` is zero).
pub struct RingBuffer<const N: usize> {
    data: [u8; N],
    /// Next slot to write
    head: usize,
    /// Next slot to read
    tail: usize,
    count: usize,
}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        Self {
            data: [0; N],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Bytes waiting to be read.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Room left for writing.
    pub fn free(&self) -> usize {
        N - self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// Copy as much of `bytes` as fits; returns the number copied.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.free());
        if n == 0 {
            return 0;
        }

        let first = n.min(N - self.head);
        self.data[self.head..self.head + first].copy_from_slice(&bytes[..first]);
        self.data[..n - first].copy_from_slice(&bytes[first..n]);

        self.head = Self::advance(self.head, n);
        self.count += n;
        n
    }

    /// Move up to `out.len()` bytes into `out`; returns the number moved.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let n = self.peek(out);
        self.tail = Self::advance(self.tail, n);
        self.count -= n;
        n
    }

    /// Like [`read`](Self::read) but leaves the bytes in the buffer.
    pub fn peek(&self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.count);
        if n == 0 {
            return 0;
        }

        let first = n.min(N - self.tail);
        out[..first].copy_from_slice(&self.data[self.tail..self.tail + first]);
        out[first..n].copy_from_slice(&self.data[..n - first]);
        n
    }

    /// Discard up to `n` buffered bytes; returns the number discarded.
    pub fn skip(&mut self, n: usize) -> usize {
        let n = n.min(self.count);
        self.tail = Self::advance(self.tail, n);
        self.count -= n;
        n
    }

    pub fn push(&mut self, byte: u8) -> bool {
        self.write(&[byte]) == 1
    }

    pub fn pop(&mut self) -> Option<u8> {
        let mut byte = [0u8];
        (self.read(&mut byte) == 1).then_some(byte[0])
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    #[inline]
    fn advance(index: usize, by: usize) -> usize {
        let next = index + by;
        if next >= N { next - N } else { next }
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::fmt::Debug for RingBuffer<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &N)
            .field("count", &self.count)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::VecDeque;
    use alloc::vec;

    #[test]
    fn write_stops_at_capacity() {
        let mut ring = RingBuffer::<4>::new();
        assert_eq!(ring.write(b"abcdef"), 4);
        assert!(ring.is_full());
        assert_eq!(ring.write(b"g"), 0);
    }

    #[test]
    fn straddling_copies_keep_order() {
        let mut ring = RingBuffer::<5>::new();
        let mut out = [0u8; 5];

        ring.write(b"123");
        assert_eq!(ring.read(&mut out[..2]), 2);
        assert_eq!(ring.write(b"4567"), 4);

        assert_eq!(ring.read(&mut out), 5);
        assert_eq!(&out, b"34567");
        assert!(ring.is_empty());
    }

    #[test]
    fn read_returns_only_what_was_written() {
        let mut ring = RingBuffer::<8>::new();
        let mut out = [0u8; 8];
        ring.write(b"xy");
        assert_eq!(ring.read(&mut out), 2);
        assert_eq!(ring.read(&mut out), 0);
    }

    #[test]
    fn peek_and_skip_do_not_disturb_order() {
        let mut ring = RingBuffer::<4>::new();
        ring.write(b"wxyz");
        let mut out = [0u8; 2];
        assert_eq!(ring.peek(&mut out), 2);
        assert_eq!(&out, b"wx");
        assert_eq!(ring.skip(1), 1);
        assert_eq!(ring.pop(), Some(b'x'));
        assert_eq!(ring.count(), 2);
    }

    #[test]
    fn clear_empties_and_rewinds() {
        let mut ring = RingBuffer::<3>::new();
        ring.write(b"ab");
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.free(), 3);
        assert!(ring.push(1));
        assert_eq!(ring.pop(), Some(1));
    }

    #[test]
    fn zero_capacity_moves_nothing() {
        let mut ring = RingBuffer::<0>::new();
        assert_eq!(ring.write(b"a"), 0);
        assert_eq!(ring.read(&mut [0u8; 1]), 0);
        assert!(ring.is_full() && ring.is_empty());
    }

    #[test]
    fn matches_a_reference_queue() {
        let mut ring = RingBuffer::<7>::new();
        let mut model = VecDeque::new();
        let mut seed = 0xC0FFEEu32;

        for step in 0..2000u32 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let len = (seed >> 24) as usize % 10;

            if seed & 1 == 0 {
                let chunk: alloc::vec::Vec<u8> =
                    (0..len).map(|i| (step as usize + i) as u8).collect();
                let n = ring.write(&chunk);
                assert_eq!(n, len.min(7 - model.len()));
                model.extend(&chunk[..n]);
            } else {
                let mut out = vec![0u8; len];
                let n = ring.read(&mut out);
                assert_eq!(n, len.min(model.len()));
                for byte in &out[..n] {
                    assert_eq!(Some(*byte), model.pop_front());
                }
            }

            assert!(ring.count() <= ring.capacity());
            assert_eq!(ring.count(), model.len());
        }
    }
}
