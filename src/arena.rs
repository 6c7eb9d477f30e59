//! Block arena backing the tape.
//!
//! Items are bump-allocated into a list of blocks whose capacities double as
//! the arena grows, so an item never moves once written and its `u32` index
//! stays valid until the arena is rolled back past it. Nothing is freed
//! individually: [`Arena::truncate`] and [`Arena::reset`] rewind the cursor
//! and keep every block for reuse, while [`Arena::release`] hands all but the
//! first block back to the allocator.

/// Capacity of the first block when none is requested explicitly.
pub const DEFAULT_FIRST_BLOCK: usize = 1 << 12;

/// Typed bump arena addressed by `u32` indices.
///
/// Block `k` holds `first_block << k` items and starts at global index
/// `first_block * (2^k - 1)`, so locating an index is a shift and a
/// leading-zero count rather than a search.
#[derive(Clone, Debug)]
pub struct Arena<T: Copy> {
    blocks: Vec<Vec<T>>,
    first_block: usize,
    len: usize,
}

impl<T: Copy> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> Arena<T> {
    /// Create an empty arena. No memory is reserved until the first push.
    pub fn new() -> Self {
        Self::with_first_block(DEFAULT_FIRST_BLOCK)
    }

    /// Create an empty arena whose first block holds `capacity` items.
    ///
    /// A zero capacity is bumped to one.
    pub fn with_first_block(capacity: usize) -> Self {
        Arena {
            blocks: Vec::new(),
            first_block: capacity.max(1),
            len: 0,
        }
    }

    /// Number of live items.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of blocks currently held, including empty ones kept for reuse.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Total number of items the held blocks can store without allocating.
    pub fn capacity(&self) -> usize {
        self.blocks.iter().map(Vec::capacity).sum()
    }

    /// Bytes reserved by the held blocks.
    pub fn bytes(&self) -> usize {
        self.capacity() * std::mem::size_of::<T>()
    }

    #[inline]
    fn block_capacity(&self, block: usize) -> usize {
        self.first_block << block
    }

    /// Map a global index to `(block, offset)`.
    #[inline]
    fn locate(&self, index: usize) -> (usize, usize) {
        let scaled = index / self.first_block + 1;
        let block = (usize::BITS - 1 - scaled.leading_zeros()) as usize;
        let start = self.first_block * ((1usize << block) - 1);
        (block, index - start)
    }

    /// Append `value` and return its index.
    ///
    /// # Panics
    ///
    /// Panics if the arena would exceed `u32::MAX - 1` items; `u32::MAX` is
    /// reserved by the tape as the constant sentinel.
    #[inline]
    pub fn push(&mut self, value: T) -> u32 {
        let index = self.len;
        assert!(
            index < u32::MAX as usize,
            "arena exhausted: more than {} items recorded",
            u32::MAX - 1
        );
        let (block, _) = self.locate(index);
        if block == self.blocks.len() {
            let capacity = self.block_capacity(block);
            log::trace!("arena grew to {} blocks ({capacity} new slots)", block + 1);
            self.blocks.push(Vec::with_capacity(capacity));
        }
        self.blocks[block].push(value);
        self.len += 1;
        index as u32
    }

    /// Item at `index`, or `None` past the end.
    #[inline]
    pub fn get(&self, index: u32) -> Option<&T> {
        let index = index as usize;
        if index >= self.len {
            return None;
        }
        let (block, offset) = self.locate(index);
        self.blocks[block].get(offset)
    }

    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        let index = index as usize;
        if index >= self.len {
            return None;
        }
        let (block, offset) = self.locate(index);
        self.blocks[block].get_mut(offset)
    }

    /// Roll back to `len` items. Indices at or past `len` become invalid;
    /// blocks are kept for reuse. A `len` past the end is a no-op.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let (block, offset) = self.locate(len);
        self.blocks[block].truncate(offset);
        for later in &mut self.blocks[block + 1..] {
            later.clear();
        }
        self.len = len;
    }

    /// Drop every item but keep all blocks.
    pub fn reset(&mut self) {
        self.truncate(0);
    }

    /// Drop every item and return all blocks after the first to the allocator.
    pub fn release(&mut self) {
        self.reset();
        self.blocks.truncate(1);
        self.blocks.shrink_to_fit();
    }

    /// Iterate over live items in index order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.blocks.iter().flat_map(|b| b.iter())
    }
}

impl<T: Copy> std::ops::Index<u32> for Arena<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: u32) -> &T {
        match self.get(index) {
            Some(item) => item,
            None => panic!("arena index {index} out of bounds (len {})", self.len),
        }
    }
}

impl<T: Copy> std::ops::IndexMut<u32> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, index: u32) -> &mut T {
        let len = self.len;
        match self.get_mut(index) {
            Some(item) => item,
            None => panic!("arena index {index} out of bounds (len {len})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_survive_block_growth() {
        let mut arena = Arena::with_first_block(4);
        for i in 0..100u32 {
            assert_eq!(arena.push(i * 3), i);
        }
        assert_eq!(arena.len(), 100);
        // 4 + 8 + 16 + 32 + 64 >= 100
        assert_eq!(arena.num_blocks(), 5);
        for i in 0..100u32 {
            assert_eq!(arena[i], i * 3);
        }
        assert!(arena.get(100).is_none());
    }

    #[test]
    fn truncate_keeps_blocks_and_reuses_slots() {
        let mut arena = Arena::with_first_block(2);
        for i in 0..20 {
            arena.push(i);
        }
        let blocks = arena.num_blocks();
        let capacity = arena.capacity();

        arena.truncate(5);
        assert_eq!(arena.len(), 5);
        assert_eq!(arena.num_blocks(), blocks);
        assert_eq!(arena.capacity(), capacity);
        assert_eq!(arena.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);

        assert_eq!(arena.push(99), 5);
        assert_eq!(arena[5], 99);
        assert_eq!(arena.capacity(), capacity);
    }

    #[test]
    fn truncate_at_block_boundary() {
        let mut arena = Arena::with_first_block(2);
        for i in 0..6 {
            arena.push(i);
        }
        // blocks hold [0,1], [2,3,4,5]
        arena.truncate(2);
        assert_eq!(arena.push(7), 2);
        assert_eq!(arena[2], 7);
        assert_eq!(arena[1], 1);
    }

    #[test]
    fn reset_and_release() {
        let mut arena = Arena::with_first_block(2);
        for i in 0..50 {
            arena.push(i);
        }
        arena.reset();
        assert!(arena.is_empty());
        assert!(arena.num_blocks() > 1);

        arena.release();
        assert!(arena.is_empty());
        assert_eq!(arena.num_blocks(), 1);
        assert_eq!(arena.push(3), 0);
    }

    #[test]
    fn index_mut_writes_in_place() {
        let mut arena = Arena::new();
        let a = arena.push(1.0_f64);
        let b = arena.push(2.0);
        arena[a] += 10.0;
        assert_eq!(arena[a], 11.0);
        assert_eq!(arena[b], 2.0);
    }
}
