//! Fixed-size pack header.
//!
//! ## Layout
//!
//! The header is 32 bytes of little-endian fields:
//!
//! | Offset | Field |
//! |---|---|
//! | 0 | magic tag (`PFH3`..`PFH6`) |
//! | 4 | type-and-flags bitmask |
//! | 8 | secondary index entry count |
//! | 12 | secondary index byte size |
//! | 16 | member count |
//! | 20 | member index byte size |
//! | 24 | creation timestamp (seconds) |
//! | 28 | signature position |
//!
//! When the extended-header flag is set, 20 opaque bytes follow.

use crate::error::{Error, Result};
use bytes::Buf;
use std::fmt;
use std::ops::Range;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 32;

/// Size of the optional extended header block that follows the fixed header
pub const EXTENDED_HEADER_SIZE: usize = 20;

const FLAG_EXTENDED_HEADER: u32 = 0x0010_0000;
const FLAG_INDEX_ENCRYPTED: u32 = 0x0000_8000;
const FLAG_INDEX_HAS_TIMESTAMPS: u32 = 0x0000_0400;
const FLAG_DATA_PADDED: u32 = 0x0000_0010;
const KIND_MASK: u32 = 0x0F;

/// Recognized pack format versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackVersion {
    /// `PFH3`
    Pfh3,
    /// `PFH4`
    Pfh4,
    /// `PFH5`
    Pfh5,
    /// `PFH6`
    Pfh6,
}

impl PackVersion {
    /// The 4-byte tag stored at the start of the file
    pub fn magic(self) -> [u8; 4] {
        match self {
            PackVersion::Pfh3 => *b"PFH3",
            PackVersion::Pfh4 => *b"PFH4",
            PackVersion::Pfh5 => *b"PFH5",
            PackVersion::Pfh6 => *b"PFH6",
        }
    }

    /// The tag as text
    pub fn as_str(self) -> &'static str {
        match self {
            PackVersion::Pfh3 => "PFH3",
            PackVersion::Pfh4 => "PFH4",
            PackVersion::Pfh5 => "PFH5",
            PackVersion::Pfh6 => "PFH6",
        }
    }
}

impl TryFrom<[u8; 4]> for PackVersion {
    type Error = Error;

    fn try_from(magic: [u8; 4]) -> Result<Self> {
        match &magic {
            b"PFH3" => Ok(PackVersion::Pfh3),
            b"PFH4" => Ok(PackVersion::Pfh4),
            b"PFH5" => Ok(PackVersion::Pfh5),
            b"PFH6" => Ok(PackVersion::Pfh6),
            _ => Err(Error::UnknownMagic { magic }),
        }
    }
}

impl fmt::Display for PackVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Archive kind, stored in the low nibble of the type bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    /// Boot archive (0)
    Boot,
    /// Release archive (1)
    Release,
    /// Patch archive (2)
    Patch,
    /// Mod archive (3)
    Mod,
    /// Movie archive (4)
    Movie,
    /// Any other nibble value
    Other(u8),
}

impl From<u8> for ArchiveKind {
    fn from(value: u8) -> Self {
        match value {
            0 => ArchiveKind::Boot,
            1 => ArchiveKind::Release,
            2 => ArchiveKind::Patch,
            3 => ArchiveKind::Mod,
            4 => ArchiveKind::Movie,
            n => ArchiveKind::Other(n),
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveKind::Boot => f.write_str("boot"),
            ArchiveKind::Release => f.write_str("release"),
            ArchiveKind::Patch => f.write_str("patch"),
            ArchiveKind::Mod => f.write_str("mod"),
            ArchiveKind::Movie => f.write_str("movie"),
            ArchiveKind::Other(n) => write!(f, "unknown ({})", n),
        }
    }
}

/// Flags decoded from the type bitmask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HeaderFlags {
    /// 20 extra header bytes follow the fixed header
    pub extended_header: bool,
    /// The member index is encrypted
    pub index_encrypted: bool,
    /// Each index record carries a timestamp
    pub index_has_timestamps: bool,
    /// Member data is aligned to 8 bytes
    pub data_padded: bool,
}

impl HeaderFlags {
    /// Decodes the flag bits of a type bitmask
    pub fn from_bits(bits: u32) -> Self {
        Self {
            extended_header: bits & FLAG_EXTENDED_HEADER != 0,
            index_encrypted: bits & FLAG_INDEX_ENCRYPTED != 0,
            index_has_timestamps: bits & FLAG_INDEX_HAS_TIMESTAMPS != 0,
            data_padded: bits & FLAG_DATA_PADDED != 0,
        }
    }

    /// Encodes the flags back into their bit positions
    pub fn bits(&self) -> u32 {
        let mut bits = 0;
        if self.extended_header {
            bits |= FLAG_EXTENDED_HEADER;
        }
        if self.index_encrypted {
            bits |= FLAG_INDEX_ENCRYPTED;
        }
        if self.index_has_timestamps {
            bits |= FLAG_INDEX_HAS_TIMESTAMPS;
        }
        if self.data_padded {
            bits |= FLAG_DATA_PADDED;
        }
        bits
    }
}

/// Decoded pack header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackHeader {
    /// Format version from the magic tag
    pub version: PackVersion,
    /// Raw type-and-flags bitmask
    pub type_bitmask: u32,
    /// Archive kind (low nibble of the bitmask)
    pub kind: ArchiveKind,
    /// Named flag bits
    pub flags: HeaderFlags,
    /// Entry count of the secondary index (not interpreted)
    pub secondary_index_count: u32,
    /// Byte size of the secondary index
    pub secondary_index_size: u32,
    /// Number of members in the member index
    pub member_count: u32,
    /// Byte size of the member index
    pub member_index_size: u32,
    /// Archive creation time in seconds
    pub creation_timestamp: u32,
    /// Position of the archive signature
    pub signature_position: u32,
}

impl PackHeader {
    /// Decodes the header from the first 32 bytes of `data`.
    ///
    /// Bytes past the fixed header are ignored, including the extended header
    /// block when present.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::HeaderTooShort { len: data.len() });
        }

        let mut buf = &data[..HEADER_SIZE];
        let mut magic = [0u8; 4];
        buf.copy_to_slice(&mut magic);
        let version = PackVersion::try_from(magic)?;

        let type_bitmask = buf.get_u32_le();

        Ok(Self {
            version,
            type_bitmask,
            kind: ArchiveKind::from((type_bitmask & KIND_MASK) as u8),
            flags: HeaderFlags::from_bits(type_bitmask),
            secondary_index_count: buf.get_u32_le(),
            secondary_index_size: buf.get_u32_le(),
            member_count: buf.get_u32_le(),
            member_index_size: buf.get_u32_le(),
            creation_timestamp: buf.get_u32_le(),
            signature_position: buf.get_u32_le(),
        })
    }

    /// Encodes the fixed 32-byte header
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let fields = [
            self.type_bitmask,
            self.secondary_index_count,
            self.secondary_index_size,
            self.member_count,
            self.member_index_size,
            self.creation_timestamp,
            self.signature_position,
        ];

        let mut out = [0u8; HEADER_SIZE];
        out[..4].copy_from_slice(&self.version.magic());
        for (i, field) in fields.iter().enumerate() {
            let start = 4 + i * 4;
            out[start..start + 4].copy_from_slice(&field.to_le_bytes());
        }
        out
    }

    /// Number of bytes occupied by the header, including the extended block
    pub fn header_size(&self) -> u64 {
        if self.flags.extended_header {
            (HEADER_SIZE + EXTENDED_HEADER_SIZE) as u64
        } else {
            HEADER_SIZE as u64
        }
    }

    /// Absolute byte range of the member index within the archive
    pub fn index_range(&self) -> Range<u64> {
        let start = self.header_size() + u64::from(self.secondary_index_size);
        start..start + u64::from(self.member_index_size)
    }

    /// Absolute offset where member data begins
    pub fn data_region_start(&self) -> u64 {
        self.index_range().end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_header(magic: &[u8; 4], fields: [u32; 7]) -> Vec<u8> {
        let mut out = magic.to_vec();
        for field in fields {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_decode_fields() {
        let data = raw_header(b"PFH5", [0x0010_0413, 7, 64, 2, 18, 1_700_000_000, 99]);
        let header = PackHeader::decode(&data).unwrap();

        assert_eq!(header.version, PackVersion::Pfh5);
        assert_eq!(header.kind, ArchiveKind::Mod);
        assert!(header.flags.extended_header);
        assert!(header.flags.index_has_timestamps);
        assert!(header.flags.data_padded);
        assert!(!header.flags.index_encrypted);
        assert_eq!(header.secondary_index_count, 7);
        assert_eq!(header.secondary_index_size, 64);
        assert_eq!(header.member_count, 2);
        assert_eq!(header.member_index_size, 18);
        assert_eq!(header.creation_timestamp, 1_700_000_000);
        assert_eq!(header.signature_position, 99);
    }

    #[test]
    fn test_header_size_and_offsets() {
        let plain = PackHeader::decode(&raw_header(b"PFH4", [1, 0, 10, 1, 20, 0, 0])).unwrap();
        assert_eq!(plain.header_size(), 32);
        assert_eq!(plain.index_range(), 42..62);
        assert_eq!(plain.data_region_start(), 62);

        let extended =
            PackHeader::decode(&raw_header(b"PFH4", [0x0010_0001, 0, 10, 1, 20, 0, 0])).unwrap();
        assert_eq!(extended.header_size(), 52);
        assert_eq!(extended.data_region_start(), 82);
    }

    #[test]
    fn test_too_short() {
        let data = raw_header(b"PFH5", [0; 7]);
        let err = PackHeader::decode(&data[..31]).unwrap_err();
        assert!(matches!(err, Error::HeaderTooShort { len: 31 }));
    }

    #[test]
    fn test_unknown_magic() {
        let data = raw_header(b"PK\x03\x04", [0; 7]);
        let err = PackHeader::decode(&data).unwrap_err();
        assert!(matches!(err, Error::UnknownMagic { magic } if &magic == b"PK\x03\x04"));
    }

    #[test]
    fn test_all_versions_recognized() {
        for tag in [b"PFH3", b"PFH4", b"PFH5", b"PFH6"] {
            let version = PackVersion::try_from(*tag).unwrap();
            assert_eq!(&version.magic(), tag);
        }
    }

    #[test]
    fn test_unknown_kind_is_kept() {
        let raw = raw_header(b"PFH6", [0x0000_0009, 0, 0, 0, 0, 0, 0]);
        let header = PackHeader::decode(&raw).unwrap();
        assert_eq!(header.kind, ArchiveKind::Other(9));
        assert_eq!(header.kind.to_string(), "unknown (9)");
    }

    #[test]
    fn test_encode_matches_decode() {
        let data = raw_header(b"PFH5", [0x8402, 1, 2, 3, 4, 5, 6]);
        let header = PackHeader::decode(&data).unwrap();
        assert_eq!(header.encode().as_slice(), data.as_slice());
        assert_eq!(header.flags.bits() | 0x2, header.type_bitmask);
    }
}
