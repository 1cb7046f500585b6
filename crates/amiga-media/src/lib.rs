//! Unified Amiga disk/hard-drive media adapter.
//!
//! Rather than a virtual `AmigaFile` class hierarchy, every recognised image
//! format collapses to one of two in-memory representations — a floppy
//! [`format_adf::Adf`] or a hard-drive [`format_hdf::HdfFile`] — wrapped by
//! the [`AnyImage`] sum type so callers can match on provenance (`Adf` vs
//! `Eadf` vs gzip-wrapped `Adz`/`Hdz`) while still getting one [`BlockDevice`]
//! surface to read and write through.

use std::fmt;
use std::io::Read;

use flate2::read::GzDecoder;
use format_adf::Adf;
use format_hdf::HdfFile;

pub use format_hdf::{Geometry, PartitionDescriptor};

#[derive(Debug)]
pub enum MediaError {
    HdrTooLarge,
    HdrInvalidBsize,
    HdrInvalidGeometry,
    DiskInvalidLayout,
    ZlibError,
    ExtFactor5,
    ExtCorrupted,
    ExtIncompatible,
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HdrTooLarge => write!(f, "geometry implies an image larger than 504 MiB"),
            Self::HdrInvalidBsize => write!(f, "block size must be 512 bytes"),
            Self::HdrInvalidGeometry => write!(f, "geometry outside legal range"),
            Self::DiskInvalidLayout => write!(f, "file size matches no known Amiga disk geometry"),
            Self::ZlibError => write!(f, "gzip decompression failed"),
            Self::ExtFactor5 => write!(f, "not a UAE-1ADF extended ADF file"),
            Self::ExtCorrupted => write!(f, "extended ADF header or track table is corrupted"),
            Self::ExtIncompatible => write!(f, "extended ADF contains non-standard tracks"),
        }
    }
}

impl std::error::Error for MediaError {}

impl From<format_hdf::HdfError> for MediaError {
    fn from(e: format_hdf::HdfError) -> Self {
        match e {
            format_hdf::HdfError::HdrTooLarge => Self::HdrTooLarge,
            format_hdf::HdfError::HdrInvalidBsize => Self::HdrInvalidBsize,
            format_hdf::HdfError::HdrInvalidGeometry => Self::HdrInvalidGeometry,
        }
    }
}

impl From<format_eadf::EadfError> for MediaError {
    fn from(e: format_eadf::EadfError) -> Self {
        match e {
            format_eadf::EadfError::BadMagic => Self::ExtFactor5,
            format_eadf::EadfError::InvalidTrackCount(_) | format_eadf::EadfError::Truncated => {
                Self::ExtCorrupted
            }
            format_eadf::EadfError::UnsupportedTrackFormat(_) => Self::ExtIncompatible,
        }
    }
}

/// Block-addressed read/write surface consumed by the filesystem layer.
pub trait BlockDevice {
    fn blocks(&self) -> u32;
    fn bsize(&self) -> u32;
    fn read_block(&self, dst: &mut [u8], nr: u32);
    fn write_block(&mut self, src: &[u8], nr: u32);
}

impl BlockDevice for Adf {
    fn blocks(&self) -> u32 {
        (self.data().len() / format_adf::SECTOR_SIZE as usize) as u32
    }

    fn bsize(&self) -> u32 {
        format_adf::SECTOR_SIZE
    }

    fn read_block(&self, dst: &mut [u8], nr: u32) {
        let (cyl, head, sector) = adf_chs(self, nr);
        dst.copy_from_slice(self.read_sector(cyl, head, sector));
    }

    fn write_block(&mut self, src: &[u8], nr: u32) {
        let (cyl, head, sector) = adf_chs(self, nr);
        self.write_sector(cyl, head, sector, src);
    }
}

fn adf_chs(adf: &Adf, nr: u32) -> (u32, u32, u32) {
    let spt = adf.sectors_per_track();
    let track = nr / spt;
    let sector = nr % spt;
    (track / format_adf::HEADS, track % format_adf::HEADS, sector)
}

impl BlockDevice for HdfFile {
    fn blocks(&self) -> u32 {
        HdfFile::blocks(self)
    }

    fn bsize(&self) -> u32 {
        HdfFile::bsize(self)
    }

    fn read_block(&self, dst: &mut [u8], nr: u32) {
        HdfFile::read_block(self, dst, nr);
    }

    fn write_block(&mut self, src: &[u8], nr: u32) {
        HdfFile::write_block(self, src, nr);
    }
}

/// A recognised Amiga disk or hard-drive image, regardless of its on-disk
/// wire format. `Eadf`/`Adz`/`Hdz` are distinguished only for provenance —
/// all five variants read and write through the same [`BlockDevice`] calls.
pub enum AnyImage {
    Adf(Adf),
    Eadf(Adf),
    Adz(Adf),
    Hdf(HdfFile),
    Hdz(HdfFile),
}

enum Plain {
    Adf(Adf),
    Eadf(Adf),
    Hdf(HdfFile),
}

impl AnyImage {
    /// Recognises an image from its raw bytes: gzip magic selects `Adz`/`Hdz`,
    /// the `UAE-1ADF` magic selects `Eadf`, otherwise file size is matched
    /// against a legal ADF or HDF geometry.
    pub fn detect(data: Vec<u8>) -> Result<Self, MediaError> {
        if data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b {
            let mut decoder = GzDecoder::new(&data[..]);
            let mut inflated = Vec::new();
            decoder
                .read_to_end(&mut inflated)
                .map_err(|_| MediaError::ZlibError)?;
            return Ok(match parse_plain(inflated)? {
                Plain::Adf(adf) | Plain::Eadf(adf) => Self::Adz(adf),
                Plain::Hdf(hdf) => Self::Hdz(hdf),
            });
        }

        Ok(match parse_plain(data)? {
            Plain::Adf(adf) => Self::Adf(adf),
            Plain::Eadf(adf) => Self::Eadf(adf),
            Plain::Hdf(hdf) => Self::Hdf(hdf),
        })
    }

    #[must_use]
    pub fn as_block_device(&self) -> &dyn BlockDevice {
        match self {
            Self::Adf(a) | Self::Eadf(a) | Self::Adz(a) => a,
            Self::Hdf(h) | Self::Hdz(h) => h,
        }
    }

    pub fn as_block_device_mut(&mut self) -> &mut dyn BlockDevice {
        match self {
            Self::Adf(a) | Self::Eadf(a) | Self::Adz(a) => a,
            Self::Hdf(h) | Self::Hdz(h) => h,
        }
    }
}

fn parse_plain(data: Vec<u8>) -> Result<Plain, MediaError> {
    if data.len() >= 8 && &data[0..8] == b"UAE-1ADF" {
        let eadf = format_eadf::EadfFile::from_bytes(&data)?;
        let adf = eadf.decode_to_adf().ok_or(MediaError::ExtIncompatible)?;
        return Ok(Plain::Eadf(adf));
    }

    if matches!(data.len(), format_adf::ADF_SIZE_DD | format_adf::ADF_SIZE_HD) {
        let adf = Adf::from_bytes(data).map_err(|_| MediaError::DiskInvalidLayout)?;
        return Ok(Plain::Adf(adf));
    }

    match HdfFile::from_bytes(data) {
        Ok(hdf) => Ok(Plain::Hdf(hdf)),
        Err(_) => Err(MediaError::DiskInvalidLayout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_plain_adf_by_size() {
        let data = vec![0u8; format_adf::ADF_SIZE_DD];
        let image = AnyImage::detect(data).expect("recognised");
        assert!(matches!(image, AnyImage::Adf(_)));
        assert_eq!(image.as_block_device().bsize(), 512);
    }

    #[test]
    fn detects_hdf_by_geometry() {
        let geometry = Geometry::new(100, 16, 63, 512).expect("legal");
        let data = vec![0u8; geometry.num_bytes() as usize];
        let image = AnyImage::detect(data).expect("recognised");
        assert!(matches!(image, AnyImage::Hdf(_)));
    }

    #[test]
    fn rejects_unrecognisable_size() {
        let data = vec![0u8; 12345];
        assert!(matches!(
            AnyImage::detect(data),
            Err(MediaError::DiskInvalidLayout)
        ));
    }

    #[test]
    fn block_device_round_trips_through_adf() {
        let data = vec![0u8; format_adf::ADF_SIZE_DD];
        let mut image = AnyImage::detect(data).expect("recognised");
        let payload: Vec<u8> = (0..512).map(|i| (i & 0xFF) as u8).collect();
        image.as_block_device_mut().write_block(&payload, 3);
        let mut out = vec![0u8; 512];
        image.as_block_device().read_block(&mut out, 3);
        assert_eq!(out, payload);
    }

    #[test]
    fn gzip_wrapped_adf_is_recognised_as_adz() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let raw = vec![0u8; format_adf::ADF_SIZE_DD];
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).expect("compress");
        let compressed = encoder.finish().expect("finish");

        let image = AnyImage::detect(compressed).expect("recognised");
        assert!(matches!(image, AnyImage::Adz(_)));
    }
}
