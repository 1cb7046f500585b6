use crate::error::FsError;

/// OFS reserves 24 header bytes per data block; FFS uses the whole block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsVariant {
    Ofs,
    Ffs,
}

const OFS_DATA_BLOCK_HEADER_BYTES: u32 = 24;
/// References held directly in a file header or file-list block:
/// `bsize/4 - 56` longwords, per the Amiga hash-table size convention.
const RESERVED_HEADER_LONGS: u32 = 56;

/// Bitmap-backed free-block allocator for an OFS/FFS volume.
///
/// Blocks 0 and 1 (boot block) are never tracked in the bitmap, matching
/// the reference allocator's `blocks - 2` convention.
pub struct Allocator {
    bsize: u32,
    variant: FsVariant,
    total_blocks: u32,
    allocated: Vec<bool>,
    ap: u32,
}

impl Allocator {
    #[must_use]
    pub fn new(total_blocks: u32, bsize: u32, variant: FsVariant) -> Self {
        Self {
            bsize,
            variant,
            total_blocks,
            allocated: vec![false; total_blocks.saturating_sub(2) as usize],
            ap: 2,
        }
    }

    fn capacity_per_data_block(&self) -> u32 {
        match self.variant {
            FsVariant::Ffs => self.bsize,
            FsVariant::Ofs => self.bsize - OFS_DATA_BLOCK_HEADER_BYTES,
        }
    }

    fn refs_per_block(&self) -> u32 {
        self.bsize / 4 - RESERVED_HEADER_LONGS
    }

    #[must_use]
    pub fn required_data_blocks(&self, bytes: u32) -> u32 {
        if bytes == 0 {
            return 0;
        }
        bytes.div_ceil(self.capacity_per_data_block())
    }

    #[must_use]
    pub fn required_file_list_blocks(&self, data_blocks: u32) -> u32 {
        let refs_in_header = self.refs_per_block();
        if data_blocks <= refs_in_header {
            return 0;
        }
        (data_blocks - refs_in_header).div_ceil(self.refs_per_block())
    }

    #[must_use]
    pub fn required_blocks(&self, bytes: u32) -> u32 {
        let data = self.required_data_blocks(bytes);
        1 + data + self.required_file_list_blocks(data)
    }

    fn bit_index(&self, nr: u32) -> usize {
        (nr - 2) as usize
    }

    #[must_use]
    pub fn is_unallocated(&self, nr: u32) -> bool {
        self.allocated.get(self.bit_index(nr)).is_some_and(|b| !*b)
    }

    /// Returns the first free block at or after the allocation pointer,
    /// wrapping once around the bitmap.
    pub fn allocate(&mut self) -> Result<u32, FsError> {
        let span = self.allocated.len() as u32;
        if span == 0 {
            return Err(FsError::OutOfSpace);
        }
        for step in 0..span {
            let idx = (self.ap - 2 + step) % span;
            if !self.allocated[idx as usize] {
                self.allocated[idx as usize] = true;
                let nr = idx + 2;
                self.ap = nr + 1;
                return Ok(nr);
            }
        }
        Err(FsError::OutOfSpace)
    }

    pub fn deallocate_block(&mut self, nr: u32) {
        if let Some(bit) = self.allocated.get_mut(self.bit_index(nr)) {
            *bit = false;
        }
    }

    /// Drains `prealloc` first, then calls [`Allocator::allocate`] for the
    /// remainder; any leftover pre-allocated blocks beyond `n` are freed.
    pub fn allocate_n(&mut self, n: u32, prealloc: &mut Vec<u32>) -> Result<Vec<u32>, FsError> {
        let mut out = Vec::with_capacity(n as usize);
        while (out.len() as u32) < n {
            if let Some(nr) = prealloc.pop() {
                out.push(nr);
            } else {
                out.push(self.allocate()?);
            }
        }
        for surplus in prealloc.drain(..) {
            self.deallocate_block(surplus);
        }
        Ok(out)
    }

    /// Grows or shrinks `list_blocks`/`data_blocks` to the counts required
    /// to hold `bytes`, freeing surplus blocks beyond the new target.
    pub fn allocate_file_blocks(
        &mut self,
        bytes: u32,
        list_blocks: &mut Vec<u32>,
        data_blocks: &mut Vec<u32>,
    ) -> Result<(), FsError> {
        let target_data = self.required_data_blocks(bytes);
        let target_list = self.required_file_list_blocks(target_data);

        self.resize_block_set(data_blocks, target_data)?;
        self.resize_block_set(list_blocks, target_list)?;
        Ok(())
    }

    fn resize_block_set(&mut self, blocks: &mut Vec<u32>, target: u32) -> Result<(), FsError> {
        while (blocks.len() as u32) < target {
            blocks.push(self.allocate()?);
        }
        while (blocks.len() as u32) > target {
            if let Some(nr) = blocks.pop() {
                self.deallocate_block(nr);
            }
        }
        Ok(())
    }

    /// Flattens the bitmap into `ceil((blocks-2)/32)` words, zeroing any
    /// bits beyond the last tracked block.
    #[must_use]
    pub fn serialize_bitmap(&self) -> Vec<u32> {
        let words = (self.allocated.len() as u32).div_ceil(32) as usize;
        let mut out = vec![0u32; words];
        for (i, &bit) in self.allocated.iter().enumerate() {
            if !bit {
                out[i / 32] |= 1 << (i % 32);
            }
        }
        out
    }

    #[must_use]
    pub fn num_allocated(&self) -> u32 {
        self.allocated.iter().filter(|b| **b).count() as u32
    }

    #[must_use]
    pub fn num_unallocated(&self) -> u32 {
        self.total_blocks.saturating_sub(2) - self.num_allocated()
    }
}
