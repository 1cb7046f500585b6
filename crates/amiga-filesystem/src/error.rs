use std::fmt;

/// Domain errors raised by the block cache, allocator, and traversal layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    OutOfSpace,
    NotFound,
    InvalidPath,
    HasCycles,
    WrongBlockType,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfSpace => write!(f, "no free blocks remain on this volume"),
            Self::NotFound => write!(f, "path does not resolve to any block"),
            Self::InvalidPath => write!(f, "path is malformed"),
            Self::HasCycles => write!(f, "hash-table chain revisits an already-seen block"),
            Self::WrongBlockType => write!(f, "block is not of the expected type"),
        }
    }
}

impl std::error::Error for FsError {}

/// Per-field expectation-check outcome raised by the filesystem doctor.
///
/// Each variant names the field's offset within its containing block so a
/// correction can be written back at `rectify` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FSBlockError {
    Ok,
    ExpectedValue { offset: u32, expected: u32, actual: u32 },
    ExpectedSmallerValue { offset: u32, bound: u32, actual: u32 },
    ExpectedRef { offset: u32 },
    ExpectedSelfRef { offset: u32 },
    ExpectedFileHeaderBlock { offset: u32 },
    ExpectedHashableBlock { offset: u32 },
    ExpectedUserdirOrRoot { offset: u32 },
    ExpectedFileListBlock { offset: u32 },
    ExpectedBitmapBlock { offset: u32 },
    ExpectedBitmapExtBlock { offset: u32 },
    ExpectedDataBlock { offset: u32 },
    ExpectedDatablockNr { offset: u32 },
    InvalidHashtableSize { expected: u32, actual: u32 },
}

impl FSBlockError {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for FSBlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::ExpectedValue { offset, expected, actual } => {
                write!(f, "offset {offset}: expected {expected:#010X}, found {actual:#010X}")
            }
            Self::ExpectedSmallerValue { offset, bound, actual } => {
                write!(f, "offset {offset}: expected at most {bound}, found {actual}")
            }
            Self::ExpectedRef { offset } => write!(f, "offset {offset}: reference must point at an allocated block"),
            Self::ExpectedSelfRef { offset } => write!(f, "offset {offset}: reference must equal this block's own number"),
            Self::ExpectedFileHeaderBlock { offset } => write!(f, "offset {offset}: reference must point at a file header block"),
            Self::ExpectedHashableBlock { offset } => write!(f, "offset {offset}: reference must point at a hashable block"),
            Self::ExpectedUserdirOrRoot { offset } => write!(f, "offset {offset}: reference must point at a user directory or the root"),
            Self::ExpectedFileListBlock { offset } => write!(f, "offset {offset}: reference must point at a file list block"),
            Self::ExpectedBitmapBlock { offset } => write!(f, "offset {offset}: reference must point at a bitmap block"),
            Self::ExpectedBitmapExtBlock { offset } => write!(f, "offset {offset}: reference must point at a bitmap extension block"),
            Self::ExpectedDataBlock { offset } => write!(f, "offset {offset}: reference must point at a data block"),
            Self::ExpectedDatablockNr { offset } => write!(f, "offset {offset}: data-block sequence number must be nonzero"),
            Self::InvalidHashtableSize { expected, actual } => {
                write!(f, "hash table has {actual} entries, expected {expected}")
            }
        }
    }
}
