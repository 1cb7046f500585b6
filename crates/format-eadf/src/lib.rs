//! Extended Amiga Disk File (EADF / "UAE-1ADF") image parser.
//!
//! Unlike a plain ADF, an EADF stores each track as a raw MFM bit image plus
//! a per-track descriptor (type, available bytes, used bits), which lets it
//! capture non-standard or copy-protected tracks a sector-level ADF cannot
//! represent. This parser validates the header and, where every track is a
//! standard MFM-encoded 11-sector track, can decode the whole image down to
//! a plain [`format_adf::Adf`].

use std::fmt;

use drive_amiga_floppy::mfm::decode_sector;
use format_adf::Adf;

const MAGIC: &[u8; 8] = b"UAE-1ADF";
const HEADER_SIZE: usize = 8;
const TRACK_DESCRIPTOR_SIZE: usize = 12;
const STANDARD_TRACK_TYPE: u16 = 0;
const STANDARD_TRACK_USED_BITS: u32 = 11 * 512 * 8;
const SECTORS_PER_TRACK: u32 = 11;
const SYNC_PATTERN: [u8; 4] = [0x44, 0x89, 0x44, 0x89];

#[derive(Debug)]
pub enum EadfError {
    /// The file doesn't start with the `UAE-1ADF` magic.
    BadMagic,
    /// `storedTracks()` is outside the supported `[160, 168]` range.
    InvalidTrackCount(u16),
    /// The file is shorter than its own header/track-table claims.
    Truncated,
    /// A track descriptor names an unsupported MFM encoding.
    UnsupportedTrackFormat(u16),
}

impl fmt::Display for EadfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "not a UAE-1ADF extended ADF file"),
            Self::InvalidTrackCount(n) => write!(f, "invalid track count: {n} (expected 160..=168)"),
            Self::Truncated => write!(f, "file is smaller than its header declares"),
            Self::UnsupportedTrackFormat(t) => write!(f, "unsupported track format: {t}"),
        }
    }
}

impl std::error::Error for EadfError {}

struct TrackDescriptor {
    track_type: u16,
    available_bytes: u32,
    used_bits: u32,
}

pub struct EadfFile {
    stored_tracks: u16,
    descriptors: Vec<TrackDescriptor>,
    /// Track data, one entry per track, each exactly `available_bytes` long.
    track_data: Vec<Vec<u8>>,
}

impl EadfFile {
    pub fn from_bytes(data: &[u8]) -> Result<Self, EadfError> {
        if data.len() < HEADER_SIZE + 4 || &data[0..8] != MAGIC {
            return Err(EadfError::BadMagic);
        }

        let stored_tracks = u16::from_be_bytes([data[10], data[11]]);
        if !(160..=168).contains(&stored_tracks) {
            return Err(EadfError::InvalidTrackCount(stored_tracks));
        }

        let header_size = HEADER_SIZE + 4 + TRACK_DESCRIPTOR_SIZE * stored_tracks as usize;
        if data.len() < header_size {
            return Err(EadfError::Truncated);
        }

        let mut descriptors = Vec::with_capacity(stored_tracks as usize);
        for i in 0..stored_tracks as usize {
            let base = HEADER_SIZE + 4 + TRACK_DESCRIPTOR_SIZE * i;
            let track_type = u16::from_be_bytes([data[base + 2], data[base + 3]]);
            let available_bytes = u32::from_be_bytes([
                data[base + 4],
                data[base + 5],
                data[base + 6],
                data[base + 7],
            ]);
            let used_bits = u32::from_be_bytes([
                data[base + 8],
                data[base + 9],
                data[base + 10],
                data[base + 11],
            ]);

            if track_type != 0 && track_type != 1 {
                return Err(EadfError::UnsupportedTrackFormat(track_type));
            }
            if track_type == STANDARD_TRACK_TYPE && used_bits != STANDARD_TRACK_USED_BITS {
                return Err(EadfError::Truncated);
            }

            descriptors.push(TrackDescriptor {
                track_type,
                available_bytes,
                used_bits,
            });
        }

        let mut track_data = Vec::with_capacity(stored_tracks as usize);
        let mut offset = header_size;
        for d in &descriptors {
            let end = offset + d.available_bytes as usize;
            if data.len() < end {
                return Err(EadfError::Truncated);
            }
            track_data.push(data[offset..end].to_vec());
            offset = end;
        }

        Ok(Self {
            stored_tracks,
            descriptors,
            track_data,
        })
    }

    #[must_use]
    pub fn num_cyls(&self) -> u16 {
        (self.stored_tracks + 1) / 2
    }

    #[must_use]
    pub fn num_heads(&self) -> u16 {
        2
    }

    #[must_use]
    pub fn stored_tracks(&self) -> u16 {
        self.stored_tracks
    }

    #[must_use]
    pub fn track_data(&self, track: usize) -> &[u8] {
        &self.track_data[track]
    }

    fn is_standard_track(&self, track: usize) -> bool {
        self.descriptors[track].track_type == STANDARD_TRACK_TYPE
    }

    /// Decodes every track to its 11 sectors and assembles a plain ADF.
    ///
    /// Returns `None` if any track is non-standard (copy-protected or
    /// otherwise not a plain MFM-encoded 11-sector track) or fails to
    /// decode — mirroring the original's best-effort conversion, which
    /// silently keeps the image as an extended ADF on failure.
    #[must_use]
    pub fn decode_to_adf(&self) -> Option<Adf> {
        let mut adf = Adf::from_bytes(vec![0; format_adf::ADF_SIZE_DD]).ok()?;

        for track in 0..self.stored_tracks as usize {
            if !self.is_standard_track(track) {
                return None;
            }
            let cyl = (track / 2) as u32;
            let head = (track % 2) as u32;
            let data = self.track_data(track);

            let mut sync_positions: Vec<usize> = data
                .windows(4)
                .enumerate()
                .filter(|(_, w)| *w == SYNC_PATTERN)
                .map(|(i, _)| i)
                .collect();
            sync_positions.dedup_by(|a, b| *a - *b < 4);
            if sync_positions.len() < SECTORS_PER_TRACK as usize {
                return None;
            }

            for (sector, &sync_at) in sync_positions.iter().take(SECTORS_PER_TRACK as usize).enumerate() {
                let header_start = sync_at + 4;
                let sector_data = decode_sector(data, header_start)?;
                adf.write_sector(cyl, head, sector as u32, &sector_data);
            }
        }

        Some(adf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drive_amiga_floppy::mfm::encode_mfm_track;

    fn track_descriptor_bytes(track_type: u16, available_bytes: u32, used_bits: u32) -> [u8; 12] {
        let mut buf = [0u8; 12];
        buf[2..4].copy_from_slice(&track_type.to_be_bytes());
        buf[4..8].copy_from_slice(&available_bytes.to_be_bytes());
        buf[8..12].copy_from_slice(&used_bits.to_be_bytes());
        buf
    }

    fn build_eadf(num_tracks: u16, track_bytes: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(MAGIC);
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&num_tracks.to_be_bytes());
        for _ in 0..num_tracks {
            data.extend_from_slice(&track_descriptor_bytes(
                STANDARD_TRACK_TYPE,
                track_bytes.len() as u32,
                STANDARD_TRACK_USED_BITS,
            ));
        }
        for _ in 0..num_tracks {
            data.extend_from_slice(track_bytes);
        }
        data
    }

    #[test]
    fn rejects_bad_magic() {
        let data = vec![0u8; 32];
        assert!(matches!(EadfFile::from_bytes(&data), Err(EadfError::BadMagic)));
    }

    #[test]
    fn rejects_out_of_range_track_count() {
        let track_bytes = vec![0u8; 100];
        let data = build_eadf(4, &track_bytes);
        assert!(matches!(
            EadfFile::from_bytes(&data),
            Err(EadfError::InvalidTrackCount(4))
        ));
    }

    #[test]
    fn parses_header_and_geometry() {
        let track_bytes = vec![0u8; 100];
        let data = build_eadf(160, &track_bytes);
        let eadf = EadfFile::from_bytes(&data).expect("valid header");
        assert_eq!(eadf.stored_tracks(), 160);
        assert_eq!(eadf.num_cyls(), 80);
        assert_eq!(eadf.num_heads(), 2);
        assert_eq!(eadf.track_data(0).len(), 100);
    }

    #[test]
    fn decodes_standard_tracks_to_adf() {
        let mut sectors = vec![0u8; 11 * 512];
        for (i, byte) in sectors.iter_mut().enumerate() {
            *byte = (i % 256) as u8;
        }
        let track0 = encode_mfm_track(&sectors, 0, 11);

        let mut data = Vec::new();
        data.extend_from_slice(MAGIC);
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&160u16.to_be_bytes());
        for t in 0..160u16 {
            data.extend_from_slice(&track_descriptor_bytes(
                STANDARD_TRACK_TYPE,
                track0.len() as u32,
                STANDARD_TRACK_USED_BITS,
            ));
            let _ = t;
        }
        for _ in 0..160 {
            data.extend_from_slice(&track0);
        }

        let eadf = EadfFile::from_bytes(&data).expect("valid");
        let adf = eadf.decode_to_adf().expect("decodes");
        assert_eq!(adf.read_sector(0, 0, 0), &sectors[0..512]);
    }

    #[test]
    fn non_standard_track_format_is_rejected_at_parse() {
        let track_bytes = vec![0u8; 100];
        let mut data = Vec::new();
        data.extend_from_slice(MAGIC);
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&160u16.to_be_bytes());
        for _ in 0..160u16 {
            data.extend_from_slice(&track_descriptor_bytes(2, track_bytes.len() as u32, 1234));
        }
        for _ in 0..160 {
            data.extend_from_slice(&track_bytes);
        }
        assert!(matches!(
            EadfFile::from_bytes(&data),
            Err(EadfError::UnsupportedTrackFormat(2))
        ));
    }
}
