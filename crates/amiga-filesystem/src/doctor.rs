use std::collections::HashSet;

use emu_core::{Observable, Value};

use crate::allocator::Allocator;
use crate::block::{FSBlock, FSBlockType};
use crate::error::FSBlockError;

/// A correction the doctor would write back via [`Doctor::rectify`].
#[derive(Debug, Clone, Copy)]
pub struct Correction {
    pub block_nr: u32,
    pub offset: u32,
    pub expected: u32,
    pub error: FSBlockError,
}

/// Result of [`Doctor::xray_bitmap`]: blocks reachable from the root but
/// not marked allocated, and blocks marked allocated but unreachable.
#[derive(Debug, Default, Clone)]
pub struct BitmapXray {
    pub used_but_unallocated: Vec<u32>,
    pub unused_but_allocated: Vec<u32>,
}

/// Consistency checker over a set of filesystem blocks and the volume's
/// allocator, following the reference doctor's per-field expectation
/// checks and bitmap cross-check.
pub struct Doctor<'a> {
    allocator: &'a Allocator,
}

impl<'a> Doctor<'a> {
    #[must_use]
    pub fn new(allocator: &'a Allocator) -> Self {
        Self { allocator }
    }

    /// Checks that `value` at `offset` equals `expected` exactly.
    #[must_use]
    pub fn expect_value(&self, offset: u32, value: u32, expected: u32) -> FSBlockError {
        if value == expected {
            FSBlockError::Ok
        } else {
            FSBlockError::ExpectedValue { offset, expected, actual: value }
        }
    }

    #[must_use]
    pub fn expect_less_or_equal(&self, offset: u32, value: u32, bound: u32) -> FSBlockError {
        if value <= bound {
            FSBlockError::Ok
        } else {
            FSBlockError::ExpectedSmallerValue { offset, bound, actual: value }
        }
    }

    /// Checks that `reference` points at an allocated block.
    #[must_use]
    pub fn expect_ref(&self, offset: u32, reference: u32) -> FSBlockError {
        if reference != 0 && !self.allocator.is_unallocated(reference) {
            FSBlockError::Ok
        } else {
            FSBlockError::ExpectedRef { offset }
        }
    }

    #[must_use]
    pub fn expect_self_ref(&self, offset: u32, reference: u32, own_nr: u32) -> FSBlockError {
        if reference == own_nr {
            FSBlockError::Ok
        } else {
            FSBlockError::ExpectedSelfRef { offset }
        }
    }

    #[must_use]
    pub fn expect_block_type(
        &self,
        lookup: Option<FSBlockType>,
        allowed: &[FSBlockType],
        on_mismatch: FSBlockError,
    ) -> FSBlockError {
        match lookup {
            Some(t) if allowed.contains(&t) => FSBlockError::Ok,
            _ => on_mismatch,
        }
    }

    #[must_use]
    pub fn expect_file_header_ref(&self, offset: u32, referenced: Option<FSBlockType>) -> FSBlockError {
        self.expect_block_type(
            referenced,
            &[FSBlockType::FileHeader],
            FSBlockError::ExpectedFileHeaderBlock { offset },
        )
    }

    #[must_use]
    pub fn expect_hash_ref(&self, offset: u32, referenced: Option<FSBlockType>) -> FSBlockError {
        self.expect_block_type(
            referenced,
            &[FSBlockType::FileHeader, FSBlockType::UserDir],
            FSBlockError::ExpectedHashableBlock { offset },
        )
    }

    #[must_use]
    pub fn expect_parent_dir_ref(&self, offset: u32, referenced: Option<FSBlockType>) -> FSBlockError {
        self.expect_block_type(
            referenced,
            &[FSBlockType::UserDir, FSBlockType::Root],
            FSBlockError::ExpectedUserdirOrRoot { offset },
        )
    }

    #[must_use]
    pub fn expect_file_list_ref(&self, offset: u32, referenced: Option<FSBlockType>) -> FSBlockError {
        self.expect_block_type(
            referenced,
            &[FSBlockType::FileList],
            FSBlockError::ExpectedFileListBlock { offset },
        )
    }

    #[must_use]
    pub fn expect_bitmap_ref(&self, offset: u32, referenced: Option<FSBlockType>) -> FSBlockError {
        self.expect_block_type(
            referenced,
            &[FSBlockType::Bitmap],
            FSBlockError::ExpectedBitmapBlock { offset },
        )
    }

    #[must_use]
    pub fn expect_bitmap_ext_ref(&self, offset: u32, referenced: Option<FSBlockType>) -> FSBlockError {
        self.expect_block_type(
            referenced,
            &[FSBlockType::BitmapExt],
            FSBlockError::ExpectedBitmapExtBlock { offset },
        )
    }

    #[must_use]
    pub fn expect_data_block_ref(&self, offset: u32, referenced: Option<FSBlockType>) -> FSBlockError {
        self.expect_block_type(
            referenced,
            &[FSBlockType::Data],
            FSBlockError::ExpectedDataBlock { offset },
        )
    }

    #[must_use]
    pub fn expect_data_block_number(&self, offset: u32, nr: u32) -> FSBlockError {
        if nr != 0 {
            FSBlockError::Ok
        } else {
            FSBlockError::ExpectedDatablockNr { offset }
        }
    }

    #[must_use]
    pub fn expect_hash_table_size(&self, offset: u32, len: u32, bsize: u32) -> FSBlockError {
        let expected = bsize / 4 - 56;
        if len == expected {
            FSBlockError::Ok
        } else {
            FSBlockError::InvalidHashtableSize { expected, actual: len }
        }
    }

    /// Cross-checks the allocator's bitmap against the blocks reachable
    /// from the root (the traversal layer supplies `reachable`).
    #[must_use]
    pub fn xray_bitmap(&self, reachable: &HashSet<u32>, total_blocks: u32) -> BitmapXray {
        let mut xray = BitmapXray::default();
        for nr in 2..total_blocks {
            let is_reachable = reachable.contains(&nr);
            let is_allocated = !self.allocator.is_unallocated(nr);
            if is_reachable && !is_allocated {
                xray.used_but_unallocated.push(nr);
            } else if !is_reachable && is_allocated {
                xray.unused_but_allocated.push(nr);
            }
        }
        xray
    }

    /// Writes each correction's expected value back into its block.
    pub fn rectify(&self, corrections: &[Correction], blocks: &mut [FSBlock]) {
        for correction in corrections {
            if let Some(block) = blocks.iter_mut().find(|b| b.nr == correction.block_nr) {
                block.write_u32(correction.offset as usize, correction.expected);
            }
        }
    }
}

impl Observable for Doctor<'_> {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "allocated" => Some(Value::U32(self.allocator.num_allocated())),
            "unallocated" => Some(Value::U32(self.allocator.num_unallocated())),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["allocated", "unallocated"]
    }
}
