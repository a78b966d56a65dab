//! Member index decoding.
//!
//! The member index is a back-to-back sequence of `member_count` records:
//!
//! ```text
//! path bytes ... 0x00 | size: u32 LE | [timestamp: u32 LE]
//! ```
//!
//! The timestamp is only present when the header carries the timestamp flag.
//! Record offsets are not stored; each member's data offset is the running sum
//! of the sizes before it, rounded to 8 bytes per member when the data is
//! padded.

use super::header::PackHeader;
use crate::error::{Error, Result};
use bytes::Buf;
use std::fmt;
use tracing::{debug, trace, warn};

/// Alignment applied to member data when the padding flag is set
pub const DATA_ALIGNMENT: u64 = 8;

/// Smallest possible record: empty path terminator plus the size field
const MIN_RECORD_SIZE: usize = 5;

/// One member of a pack archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry {
    /// Slash-separated virtual path
    pub path: String,
    /// Uncompressed length in bytes
    pub size: u32,
    /// Offset relative to the start of the data region
    pub data_offset: u64,
    /// Per-member timestamp, when the index carries them
    pub timestamp: Option<u32>,
}

impl PackEntry {
    /// Offset just past this member's data, before padding
    pub fn data_end(&self) -> u64 {
        self.data_offset + u64::from(self.size)
    }
}

impl fmt::Display for PackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes @ {})", self.path, self.size, self.data_offset)
    }
}

/// How index decoding ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// Every declared byte of the index was consumed
    Complete,
    /// All records were decoded but bytes remained in the index block
    TrailingBytes(usize),
    /// The index was not decoded because it uses an unsupported feature
    Unsupported(&'static str),
}

impl IndexStatus {
    /// Returns true if the entry list is missing because of an unsupported feature
    pub fn is_degraded(&self) -> bool {
        matches!(self, IndexStatus::Unsupported(_))
    }
}

/// Options that tighten index and data validation
#[derive(Debug, Clone, Default)]
pub struct DecoderConfig {
    /// Reject indexes with unread bytes after the last record
    pub strict_index_length: bool,
    /// Reject archives whose data region extends past the end of the file
    pub check_data_bounds: bool,
}

impl DecoderConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether trailing index bytes are an error
    pub fn strict_index_length(mut self, strict: bool) -> Self {
        self.strict_index_length = strict;
        self
    }

    /// Sets whether the data region is checked against the archive length
    pub fn check_data_bounds(mut self, check: bool) -> Self {
        self.check_data_bounds = check;
        self
    }
}

/// Output of [`decode_index`]
#[derive(Debug, Clone)]
pub struct DecodedIndex {
    /// Entries in archive-index order
    pub entries: Vec<PackEntry>,
    /// Number of index bytes consumed by the records
    pub consumed: usize,
    /// How decoding ended
    pub status: IndexStatus,
}

/// Rounds `size` up to the next multiple of [`DATA_ALIGNMENT`]
pub fn padded_size(size: u64) -> u64 {
    size.div_ceil(DATA_ALIGNMENT) * DATA_ALIGNMENT
}

/// Decodes the member index described by `header`.
///
/// `index` must hold the member index bytes only, with the header, extended
/// header and secondary index already skipped. Encrypted indexes are refused
/// with [`Error::UnsupportedFeature`].
pub fn decode_index(header: &PackHeader, index: &[u8]) -> Result<DecodedIndex> {
    decode_index_with_config(header, index, &DecoderConfig::default())
}

/// Decodes the member index with explicit validation options
pub fn decode_index_with_config(
    header: &PackHeader,
    index: &[u8],
    config: &DecoderConfig,
) -> Result<DecodedIndex> {
    if header.flags.index_encrypted {
        return Err(Error::unsupported("encrypted index"));
    }

    let member_count = header.member_count as usize;
    let with_timestamps = header.flags.index_has_timestamps;
    let padded = header.flags.data_padded;

    debug!(
        "Decoding {} members from {} index bytes (timestamps: {}, padded: {})",
        member_count,
        index.len(),
        with_timestamps,
        padded
    );

    let mut entries = Vec::with_capacity(member_count.min(index.len() / MIN_RECORD_SIZE));
    let mut buf = index;
    let mut running_offset: u64 = 0;

    for member in 0..member_count {
        let offset = index.len() - buf.remaining();

        let Some(terminator) = buf.iter().position(|&b| b == 0) else {
            return Err(Error::truncated(offset, member, "path"));
        };
        let path = String::from_utf8_lossy(&buf[..terminator]).into_owned();
        buf.advance(terminator + 1);

        let size = read_u32(&mut buf, index.len(), member, "size")?;
        let timestamp = if with_timestamps {
            Some(read_u32(&mut buf, index.len(), member, "timestamp")?)
        } else {
            None
        };

        trace!(
            "Member #{} at index offset {}: {} ({} bytes @ {})",
            member,
            offset,
            path,
            size,
            running_offset
        );

        entries.push(PackEntry {
            path,
            size,
            data_offset: running_offset,
            timestamp,
        });

        running_offset += if padded {
            padded_size(u64::from(size))
        } else {
            u64::from(size)
        };
    }

    let consumed = index.len() - buf.remaining();
    let status = match buf.remaining() {
        0 => IndexStatus::Complete,
        remaining if config.strict_index_length => {
            return Err(Error::TrailingIndexBytes { remaining });
        }
        remaining => {
            warn!("Member index has {} unread trailing bytes", remaining);
            IndexStatus::TrailingBytes(remaining)
        }
    };

    debug!("Decoded {} members ({} index bytes)", entries.len(), consumed);

    Ok(DecodedIndex {
        entries,
        consumed,
        status,
    })
}

fn read_u32(buf: &mut &[u8], total: usize, member: usize, field: &'static str) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(Error::truncated(total - buf.remaining(), member, field));
    }
    Ok(buf.get_u32_le())
}

/// Offset just past the last member's data, including its padding
pub fn data_region_len(header: &PackHeader, entries: &[PackEntry]) -> u64 {
    entries.last().map_or(0, |last| {
        if header.flags.data_padded {
            last.data_offset + padded_size(u64::from(last.size))
        } else {
            last.data_end()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::header::{ArchiveKind, HeaderFlags, PackVersion};
    use pretty_assertions::assert_eq;

    fn header(member_count: u32, index_size: usize, flags: HeaderFlags) -> PackHeader {
        PackHeader {
            version: PackVersion::Pfh5,
            type_bitmask: flags.bits() | 3,
            kind: ArchiveKind::Mod,
            flags,
            secondary_index_count: 0,
            secondary_index_size: 0,
            member_count,
            member_index_size: index_size as u32,
            creation_timestamp: 0,
            signature_position: 0,
        }
    }

    fn record(path: &str, size: u32, timestamp: Option<u32>) -> Vec<u8> {
        let mut out = path.as_bytes().to_vec();
        out.push(0);
        out.extend_from_slice(&size.to_le_bytes());
        if let Some(ts) = timestamp {
            out.extend_from_slice(&ts.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_two_plain_members() {
        let mut index = record("a.txt", 3, None);
        index.extend(record("b.txt", 2, None));
        let header = header(2, index.len(), HeaderFlags::default());

        let decoded = decode_index(&header, &index).unwrap();
        assert_eq!(
            decoded.entries,
            vec![
                PackEntry {
                    path: "a.txt".into(),
                    size: 3,
                    data_offset: 0,
                    timestamp: None
                },
                PackEntry {
                    path: "b.txt".into(),
                    size: 2,
                    data_offset: 3,
                    timestamp: None
                },
            ]
        );
        assert_eq!(decoded.consumed, index.len());
        assert_eq!(decoded.status, IndexStatus::Complete);
    }

    #[test]
    fn test_timestamps() {
        let mut index = record("db/units.tsv", 10, Some(111));
        index.extend(record("text/en.loc", 4, Some(222)));
        let flags = HeaderFlags {
            index_has_timestamps: true,
            ..Default::default()
        };

        let decoded = decode_index(&header(2, index.len(), flags), &index).unwrap();
        assert_eq!(decoded.entries[0].timestamp, Some(111));
        assert_eq!(decoded.entries[1].timestamp, Some(222));
        assert_eq!(decoded.entries[1].data_offset, 10);
    }

    #[test]
    fn test_padding_law() {
        let mut index = record("a", 5, None);
        index.extend(record("b", 16, None));
        index.extend(record("c", 1, None));
        let flags = HeaderFlags {
            data_padded: true,
            ..Default::default()
        };
        let header = header(3, index.len(), flags);

        let decoded = decode_index(&header, &index).unwrap();
        let offsets: Vec<u64> = decoded.entries.iter().map(|e| e.data_offset).collect();
        assert_eq!(offsets, vec![0, 8, 24]);
        assert_eq!(data_region_len(&header, &decoded.entries), 32);
    }

    #[test]
    fn test_unpadded_offsets_are_exact() {
        let mut index = record("a", 5, None);
        index.extend(record("b", 16, None));
        index.extend(record("c", 1, None));
        let header = header(3, index.len(), HeaderFlags::default());

        let decoded = decode_index(&header, &index).unwrap();
        let offsets: Vec<u64> = decoded.entries.iter().map(|e| e.data_offset).collect();
        assert_eq!(offsets, vec![0, 5, 21]);
        assert_eq!(data_region_len(&header, &decoded.entries), 22);
    }

    #[test]
    fn test_missing_size_is_truncation() {
        let mut index = record("a.txt", 3, None);
        index.extend(b"b.txt\0\x02\x00");
        let header = header(2, index.len(), HeaderFlags::default());

        let err = decode_index(&header, &index).unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                offset: 16,
                member: 1,
                field: "size"
            }
        ));
    }

    #[test]
    fn test_missing_terminator_is_truncation() {
        let index = b"no-terminator".to_vec();
        let header = header(1, index.len(), HeaderFlags::default());
        let err = decode_index(&header, &index).unwrap_err();
        assert!(matches!(err, Error::Truncated { member: 0, field: "path", .. }));
    }

    #[test]
    fn test_missing_timestamp_is_truncation() {
        let index = record("a", 3, None);
        let flags = HeaderFlags {
            index_has_timestamps: true,
            ..Default::default()
        };
        let err = decode_index(&header(1, index.len(), flags), &index).unwrap_err();
        assert!(matches!(err, Error::Truncated { field: "timestamp", .. }));
    }

    #[test]
    fn test_too_many_declared_members() {
        let index = record("only", 1, None);
        let err = decode_index(&header(1_000_000, index.len(), HeaderFlags::default()), &index)
            .unwrap_err();
        assert!(matches!(err, Error::Truncated { member: 1, field: "path", .. }));
    }

    #[test]
    fn test_trailing_bytes_reported() {
        let mut index = record("a", 1, None);
        index.extend([0u8; 3]);
        let header = header(1, index.len(), HeaderFlags::default());

        let decoded = decode_index(&header, &index).unwrap();
        assert_eq!(decoded.status, IndexStatus::TrailingBytes(3));
        assert_eq!(decoded.consumed, index.len() - 3);

        let strict = DecoderConfig::new().strict_index_length(true);
        let err = decode_index_with_config(&header, &index, &strict).unwrap_err();
        assert!(matches!(err, Error::TrailingIndexBytes { remaining: 3 }));
    }

    #[test]
    fn test_encrypted_index_refused() {
        let index = record("secret", 1, None);
        let flags = HeaderFlags {
            index_encrypted: true,
            ..Default::default()
        };
        let err = decode_index(&header(1, index.len(), flags), &index).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeature { feature: "encrypted index" }));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut index = vec![b'a', 0xFF, b'b', 0];
        index.extend_from_slice(&7u32.to_le_bytes());
        let header = header(1, index.len(), HeaderFlags::default());
        let decoded = decode_index(&header, &index).unwrap();
        assert_eq!(decoded.entries[0].path, "a\u{FFFD}b");
        assert_eq!(decoded.entries[0].size, 7);
    }

    #[test]
    fn test_empty_index() {
        let decoded = decode_index(&header(0, 0, HeaderFlags::default()), &[]).unwrap();
        assert!(decoded.entries.is_empty());
        assert_eq!(decoded.status, IndexStatus::Complete);
    }

    #[test]
    fn test_padded_size() {
        assert_eq!(padded_size(0), 0);
        assert_eq!(padded_size(1), 8);
        assert_eq!(padded_size(8), 8);
        assert_eq!(padded_size(9), 16);
    }
}
