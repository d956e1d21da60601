use alloc::{vec, vec::Vec};

use crate::constant::BlockAddr;

const WORD_BITS: u32 = u64::BITS;

fn decompose(addr: BlockAddr) -> (usize, u32) {
    ((addr / WORD_BITS) as usize, addr % WORD_BITS)
}

/// In-memory block occupancy, one bit per block. Never persisted: it is
/// rebuilt from the inode table on every mount.
#[derive(Debug, Clone)]
pub struct Bitmap {
    words: Vec<u64>,
    len: u32,
}

impl Bitmap {
    /// Every block starts free. Bits past `len` in the last word are set so
    /// the allocator never hands them out.
    pub fn new(len: u32) -> Self {
        let mut words = vec![0u64; len.div_ceil(WORD_BITS) as usize];
        let tail = len % WORD_BITS;
        if tail != 0 {
            if let Some(last) = words.last_mut() {
                *last = !0u64 << tail;
            }
        }
        Self { words, len }
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_used(&self, addr: BlockAddr) -> bool {
        let (word, bit) = decompose(addr);
        addr < self.len && self.words[word] >> bit & 1 == 1
    }

    /// Marks `addr` used. Setting an already-set bit is harmless.
    pub fn mark_used(&mut self, addr: BlockAddr) {
        debug_assert!(addr < self.len, "block {addr} outside the bitmap");
        let (word, bit) = decompose(addr);
        self.words[word] |= 1u64 << bit;
    }

    pub fn release(&mut self, addr: BlockAddr) {
        debug_assert!(addr < self.len, "block {addr} outside the bitmap");
        let (word, bit) = decompose(addr);
        self.words[word] &= !(1u64 << bit);
    }

    /// Claims the lowest-numbered free block.
    pub fn alloc(&mut self) -> Option<BlockAddr> {
        let (idx, word) = self
            .words
            .iter_mut()
            .enumerate()
            .find(|(_, word)| **word != u64::MAX)?;
        let bit = word.trailing_ones();
        *word |= 1u64 << bit;
        Some(idx as u32 * WORD_BITS + bit)
    }

    pub fn free_count(&self) -> u32 {
        self.words.iter().map(|word| word.count_zeros()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_returns_lowest_free_block() {
        let mut bitmap = Bitmap::new(200);
        (0..70).for_each(|addr| bitmap.mark_used(addr));
        bitmap.release(5);

        assert_eq!(bitmap.alloc(), Some(5));
        assert_eq!(bitmap.alloc(), Some(70));
        assert!(bitmap.is_used(70));
        assert!(!bitmap.is_used(71));
    }

    #[test]
    fn tail_bits_are_never_handed_out() {
        let mut bitmap = Bitmap::new(3);
        assert_eq!(bitmap.free_count(), 3);
        assert_eq!(bitmap.alloc(), Some(0));
        assert_eq!(bitmap.alloc(), Some(1));
        assert_eq!(bitmap.alloc(), Some(2));
        assert_eq!(bitmap.alloc(), None);
        assert_eq!(bitmap.free_count(), 0);
        assert!(!bitmap.is_used(3));
    }

    #[test]
    fn marking_twice_counts_once() {
        let mut bitmap = Bitmap::new(128);
        bitmap.mark_used(64);
        bitmap.mark_used(64);
        assert_eq!(bitmap.free_count(), 127);
        bitmap.release(64);
        assert_eq!(bitmap.free_count(), 128);
    }

    #[test]
    fn word_aligned_length_has_no_tail() {
        let bitmap = Bitmap::new(128);
        assert_eq!(bitmap.len(), 128);
        assert_eq!(bitmap.free_count(), 128);
        assert!(Bitmap::new(0).is_empty());
    }
}
