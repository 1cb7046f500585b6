//! Block cache, free-block allocator, and OFS/FFS traversal/doctor for
//! Amiga disk and hard-drive images.
//!
//! Layered on top of `amiga-media`'s [`amiga_media::BlockDevice`]: the
//! cache turns block-addressed reads/writes into a write-back layer, the
//! allocator tracks free space with the reference allocator's bitmap
//! contract, traversal walks the resulting directory hash tables, and the
//! doctor cross-checks both against each other.

mod allocator;
mod block;
mod doctor;
mod error;
mod traversal;

pub use allocator::{Allocator, FsVariant};
pub use block::{BlockCache, FSBlock, FSBlockType};
pub use doctor::{BitmapXray, Correction, Doctor};
pub use error::{FSBlockError, FsError};
pub use traversal::{build, glob_match, is_hashable, seek, split_path, BuildOptions, PathComponent, TraversalOrder, TreeNode};
