//! Raw Amiga hard-disk image (HDF) parser and cylinder/head/sector geometry.
//!
//! An HDF is a flat sector dump with no self-describing header: geometry is
//! either supplied by the caller or inferred from file size, and a rigid
//! disk partition table (RDB) may occupy the first few cylinders. This crate
//! models the bare geometry and a default single-partition layout; RDB
//! parsing is left to `amiga-media`, which owns partition discovery.

use std::fmt;

pub const SECTOR_SIZE: u32 = 512;
const MAX_HDF_BYTES: u64 = 504 * 1024 * 1024;

#[derive(Debug)]
pub enum HdfError {
    /// `cylinders * heads * sectors * bsize` exceeds 504 MiB.
    HdrTooLarge,
    /// `bsize != 512`.
    HdrInvalidBsize,
    /// `cylinders`, `heads`, or `sectors` fall outside their legal ranges.
    HdrInvalidGeometry,
}

impl fmt::Display for HdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HdrTooLarge => write!(f, "geometry implies an image larger than 504 MiB"),
            Self::HdrInvalidBsize => write!(f, "block size must be 512 bytes"),
            Self::HdrInvalidGeometry => write!(f, "cylinders/heads/sectors outside legal range"),
        }
    }
}

impl std::error::Error for HdfError {}

/// Cylinder/head/sector/block-size geometry of a hard-disk image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub cylinders: u32,
    pub heads: u32,
    pub sectors: u32,
    pub bsize: u32,
}

impl Geometry {
    pub fn new(cylinders: u32, heads: u32, sectors: u32, bsize: u32) -> Result<Self, HdfError> {
        let geometry = Self {
            cylinders,
            heads,
            sectors,
            bsize,
        };
        geometry.check_compatibility()?;
        Ok(geometry)
    }

    fn check_compatibility(&self) -> Result<(), HdfError> {
        if u64::from(self.bytes()) > MAX_HDF_BYTES {
            return Err(HdfError::HdrTooLarge);
        }
        if self.bsize != SECTOR_SIZE {
            return Err(HdfError::HdrInvalidBsize);
        }
        if !(16..=1024).contains(&self.cylinders)
            || (self.cylinders < 16 && self.heads > 1)
            || !(1..=16).contains(&self.heads)
            || !(16..=63).contains(&self.sectors)
        {
            return Err(HdfError::HdrInvalidGeometry);
        }
        Ok(())
    }

    #[must_use]
    pub fn num_bytes(&self) -> u64 {
        u64::from(self.bytes())
    }

    fn bytes(&self) -> u32 {
        self.cylinders
            .saturating_mul(self.heads)
            .saturating_mul(self.sectors)
            .saturating_mul(self.bsize)
    }

    /// Infers a plausible geometry from an image's byte length, assuming the
    /// common 16-heads/63-sectors RDB convention and solving for cylinders.
    pub fn infer_from_size(size: u64) -> Result<Self, HdfError> {
        let heads = 16;
        let sectors = 63;
        let track_bytes = u64::from(heads) * u64::from(sectors) * u64::from(SECTOR_SIZE);
        if track_bytes == 0 || size % track_bytes != 0 {
            return Err(HdfError::HdrInvalidGeometry);
        }
        let cylinders = (size / track_bytes) as u32;
        Self::new(cylinders, heads, sectors, SECTOR_SIZE)
    }
}

/// A single partition entry: a cylinder subrange of the drive's geometry.
#[derive(Debug, Clone)]
pub struct PartitionDescriptor {
    pub nr: u32,
    pub name: String,
    pub lower_cyl: u32,
    pub upper_cyl: u32,
}

impl PartitionDescriptor {
    /// A single partition spanning the whole drive, used when no RDB
    /// partition table is present.
    #[must_use]
    pub fn whole_disk(geometry: &Geometry) -> Self {
        Self {
            nr: 0,
            name: "DH0".to_string(),
            lower_cyl: 0,
            upper_cyl: geometry.cylinders - 1,
        }
    }
}

pub struct HdfFile {
    geometry: Geometry,
    partitions: Vec<PartitionDescriptor>,
    data: Vec<u8>,
}

impl HdfFile {
    /// Parses a raw HDF image, inferring geometry from its size and falling
    /// back to a single whole-disk partition.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, HdfError> {
        let geometry = Geometry::infer_from_size(data.len() as u64)?;
        let partitions = vec![PartitionDescriptor::whole_disk(&geometry)];
        Ok(Self {
            geometry,
            partitions,
            data,
        })
    }

    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[must_use]
    pub fn partitions(&self) -> &[PartitionDescriptor] {
        &self.partitions
    }

    #[must_use]
    pub fn blocks(&self) -> u32 {
        (self.data.len() / self.geometry.bsize as usize) as u32
    }

    #[must_use]
    pub fn bsize(&self) -> u32 {
        self.geometry.bsize
    }

    pub fn read_block(&self, dst: &mut [u8], nr: u32) {
        let start = nr as usize * self.geometry.bsize as usize;
        dst.copy_from_slice(&self.data[start..start + self.geometry.bsize as usize]);
    }

    pub fn write_block(&mut self, src: &[u8], nr: u32) {
        let start = nr as usize * self.geometry.bsize as usize;
        self.data[start..start + self.geometry.bsize as usize].copy_from_slice(src);
    }
}
