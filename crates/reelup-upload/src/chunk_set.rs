/// Set of confirmed chunk indices, stored as a compact bitfield.
///
/// Sized once for the session's `total_chunks`; indices outside
/// `[0, total)` are rejected, so the set can never claim a chunk the file
/// does not have. Confirmation order is irrelevant: any subset is valid.

const WORD_BITS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSet {
    bits: Vec<u64>,
    total: u32,
    confirmed: u32,
}

impl ChunkSet {
    /// Empty set for a session with `total` chunks.
    pub fn new(total: u32) -> Self {
        Self {
            bits: vec![0u64; (total as usize).div_ceil(WORD_BITS)],
            total,
            confirmed: 0,
        }
    }

    /// Mark a chunk as confirmed. Returns true if it was newly confirmed
    /// (false for duplicates and out-of-range indices).
    #[inline]
    pub fn insert(&mut self, index: u32) -> bool {
        if index >= self.total {
            return false;
        }
        let (word, mask) = Self::locate(index);
        if self.bits[word] & mask != 0 {
            return false; // already set
        }
        self.bits[word] |= mask;
        self.confirmed += 1;
        true
    }

    #[inline]
    pub fn contains(&self, index: u32) -> bool {
        if index >= self.total {
            return false;
        }
        let (word, mask) = Self::locate(index);
        self.bits[word] & mask != 0
    }

    /// Number of confirmed chunks.
    #[inline]
    pub fn len(&self) -> u32 {
        self.confirmed
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.confirmed == 0
    }

    /// Total chunk count the set was sized for.
    #[inline]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// True once every chunk is confirmed.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.confirmed >= self.total
    }

    /// Indices still awaiting confirmation, ascending.
    pub fn missing(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.total).filter(|&i| !self.contains(i))
    }

    /// Confirmed indices, ascending.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.total).filter(|&i| self.contains(i))
    }

    #[inline]
    fn locate(index: u32) -> (usize, u64) {
        let idx = index as usize;
        (idx / WORD_BITS, 1u64 << (idx % WORD_BITS))
    }
}
