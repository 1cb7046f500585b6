use std::collections::HashMap;

use amiga_media::BlockDevice;
use emu_core::{Observable, Value};

/// The role a block plays within an OFS/FFS volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FSBlockType {
    Empty,
    Bitmap,
    BitmapExt,
    Boot,
    Root,
    UserDir,
    FileHeader,
    FileList,
    Data,
}

/// A lazily-loaded filesystem block: a type tag plus its raw `bsize`-byte
/// payload, referenced through the [`BlockCache`] rather than owned
/// directly by directory entries.
#[derive(Debug, Clone)]
pub struct FSBlock {
    pub nr: u32,
    pub block_type: FSBlockType,
    pub data: Vec<u8>,
}

impl FSBlock {
    #[must_use]
    pub fn new(nr: u32, block_type: FSBlockType, bsize: u32) -> Self {
        Self {
            nr,
            block_type,
            data: vec![0; bsize as usize],
        }
    }

    /// Reads a big-endian u32 field at `offset`.
    #[must_use]
    pub fn read_u32(&self, offset: usize) -> u32 {
        u32::from_be_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }
}

struct CacheEntry {
    block: FSBlock,
    dirty: bool,
}

/// Write-back cache over a [`BlockDevice`]: reads pull through on miss,
/// writes mark the entry dirty, and nothing reaches the backing device
/// until [`BlockCache::flush`] writes dirty entries back in block-number
/// order.
pub struct BlockCache<D: BlockDevice> {
    device: D,
    bsize: u32,
    entries: HashMap<u32, CacheEntry>,
}

impl<D: BlockDevice> BlockCache<D> {
    pub fn new(device: D) -> Self {
        let bsize = device.bsize();
        Self {
            device,
            bsize,
            entries: HashMap::new(),
        }
    }

    #[must_use]
    pub fn blocks(&self) -> u32 {
        self.device.blocks()
    }

    pub fn get(&mut self, nr: u32, block_type: FSBlockType) -> &FSBlock {
        self.entries.entry(nr).or_insert_with(|| {
            let mut data = vec![0u8; self.bsize as usize];
            self.device.read_block(&mut data, nr);
            CacheEntry {
                block: FSBlock { nr, block_type, data },
                dirty: false,
            }
        });
        &self.entries[&nr].block
    }

    pub fn get_mut(&mut self, nr: u32, block_type: FSBlockType) -> &mut FSBlock {
        self.entries.entry(nr).or_insert_with(|| {
            let mut data = vec![0u8; self.bsize as usize];
            self.device.read_block(&mut data, nr);
            CacheEntry {
                block: FSBlock { nr, block_type, data },
                dirty: false,
            }
        });
        let entry = self.entries.get_mut(&nr).expect("just inserted");
        entry.dirty = true;
        &mut entry.block
    }

    #[must_use]
    pub fn is_dirty(&self, nr: u32) -> bool {
        self.entries.get(&nr).is_some_and(|e| e.dirty)
    }

    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.entries.values().filter(|e| e.dirty).count()
    }

    /// Writes every dirty block back to the device in block-number order
    /// and clears the dirty flags. Clean entries remain cached untouched.
    pub fn flush(&mut self) {
        let mut dirty_nrs: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, e)| e.dirty)
            .map(|(nr, _)| *nr)
            .collect();
        dirty_nrs.sort_unstable();

        for nr in dirty_nrs {
            let entry = self.entries.get_mut(&nr).expect("listed as dirty");
            self.device.write_block(&entry.block.data, nr);
            entry.dirty = false;
        }
    }
}

impl<D: BlockDevice> Observable for BlockCache<D> {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "bsize" => Some(Value::U32(self.bsize)),
            "blocks" => Some(Value::U32(self.device.blocks())),
            "cached_blocks" => Some(Value::U32(self.entries.len() as u32)),
            "dirty_blocks" => Some(Value::U32(self.dirty_count() as u32)),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["bsize", "blocks", "cached_blocks", "dirty_blocks"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeDevice {
        data: Vec<u8>,
    }

    impl BlockDevice for FakeDevice {
        fn blocks(&self) -> u32 {
            (self.data.len() / 512) as u32
        }

        fn bsize(&self) -> u32 {
            512
        }

        fn read_block(&self, dst: &mut [u8], nr: u32) {
            let start = nr as usize * 512;
            dst.copy_from_slice(&self.data[start..start + 512]);
        }

        fn write_block(&mut self, src: &[u8], nr: u32) {
            let start = nr as usize * 512;
            self.data[start..start + 512].copy_from_slice(src);
        }
    }

    fn fake_cache(blocks: u32) -> BlockCache<FakeDevice> {
        BlockCache::new(FakeDevice {
            data: vec![0u8; blocks as usize * 512],
        })
    }

    #[test]
    fn reads_pull_through_on_miss() {
        let mut cache = fake_cache(4);
        let block = cache.get(2, FSBlockType::Data);
        assert_eq!(block.nr, 2);
        assert!(!cache.is_dirty(2));
    }

    #[test]
    fn writes_mark_dirty_until_flush() {
        let mut cache = fake_cache(4);
        cache.get_mut(1, FSBlockType::Data).write_u32(0, 0xDEAD_BEEF);
        assert!(cache.is_dirty(1));
        cache.flush();
        assert!(!cache.is_dirty(1));
        assert_eq!(cache.dirty_count(), 0);
    }

    #[test]
    fn flush_writes_back_to_device_in_order() {
        let mut cache = fake_cache(4);
        cache.get_mut(3, FSBlockType::Data).write_u32(0, 7);
        cache.get_mut(0, FSBlockType::Data).write_u32(0, 9);
        cache.flush();

        let mut fresh = fake_cache(4);
        fresh.device.data = cache.device.data.clone();
        assert_eq!(fresh.get(0, FSBlockType::Data).read_u32(0), 9);
        assert_eq!(fresh.get(3, FSBlockType::Data).read_u32(0), 7);
    }
}
