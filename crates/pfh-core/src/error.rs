//! Error types for the pfh-core library.
//!
//! Every failure while opening, decoding or extracting from a pack file is
//! reported through [`Error`]. Decode failures are never turned into empty or
//! default values; the only degraded path is [`Error::UnsupportedFeature`],
//! which [`PackArchive`](crate::PackArchive) converts into an archive with no
//! entries.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pfh operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all pfh operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The archive path does not resolve to a readable file
    #[error("cannot open archive '{path}': {source}")]
    NotFound {
        /// Path that was requested
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Fewer than 32 header bytes were available
    #[error("pack header too short: need 32 bytes, have {len}")]
    HeaderTooShort {
        /// Number of bytes actually available
        len: usize,
    },

    /// The 4-byte tag is not one of the recognized pack versions
    #[error("unrecognized pack magic {magic:02x?}")]
    UnknownMagic {
        /// The tag found at offset 0
        magic: [u8; 4],
    },

    /// The archive uses a feature this reader does not decode
    #[error("unsupported pack feature: {feature}")]
    UnsupportedFeature {
        /// Short name of the feature
        feature: &'static str,
    },

    /// The member index ended before a record was complete
    #[error("member index truncated at offset {offset} while reading {field} of member #{member}")]
    Truncated {
        /// Byte offset within the index block
        offset: usize,
        /// Ordinal of the member being decoded
        member: usize,
        /// Which record field was cut short
        field: &'static str,
    },

    /// Strict decoding found unread bytes after the last record
    #[error("member index has {remaining} unread trailing bytes")]
    TrailingIndexBytes {
        /// Number of bytes left over
        remaining: usize,
    },

    /// A region declared by the header or index extends past the end of the archive
    #[error("{region} ends at byte {end} but the archive is only {len} bytes long")]
    OutOfBounds {
        /// Which region overflowed
        region: &'static str,
        /// Absolute end of the region
        end: u64,
        /// Physical archive length
        len: u64,
    },

    /// A single member could not be read in full
    #[error("member '{path}' truncated: expected {expected} bytes, read {actual}")]
    TruncatedMember {
        /// Virtual path of the member
        path: String,
        /// Size declared by the index
        expected: u64,
        /// Bytes actually available
        actual: u64,
    },

    /// Underlying stream failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write an extracted member
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Member path would escape the output directory
    #[error("path traversal detected: '{path}' would escape output directory")]
    PathTraversal {
        /// The suspicious member path
        path: String,
    },
}

impl Error {
    /// Creates a new not-found error
    pub fn not_found(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::NotFound {
            path: path.into(),
            source,
        }
    }

    /// Creates a new index truncation error
    pub fn truncated(offset: usize, member: usize, field: &'static str) -> Self {
        Self::Truncated {
            offset,
            member,
            field,
        }
    }

    /// Creates a new unsupported feature error
    pub fn unsupported(feature: &'static str) -> Self {
        Self::UnsupportedFeature { feature }
    }

    /// Creates a new out-of-bounds error
    pub fn out_of_bounds(region: &'static str, end: u64, len: u64) -> Self {
        Self::OutOfBounds { region, end, len }
    }

    /// Creates a new truncated member error
    pub fn truncated_member(path: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::TruncatedMember {
            path: path.into(),
            expected,
            actual,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new path traversal error
    pub fn path_traversal(path: impl Into<String>) -> Self {
        Self::PathTraversal { path: path.into() }
    }

    /// Returns true if the archive or other members remain usable after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TruncatedMember { .. }
                | Self::UnsupportedFeature { .. }
                | Self::PathTraversal { .. }
                | Self::FileWrite { .. }
                | Self::DirectoryCreate { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::path_traversal("../etc/passwd");
        assert!(err.to_string().contains("path traversal"));
        assert!(err.to_string().contains("../etc/passwd"));

        let err = Error::truncated(12, 3, "size");
        assert_eq!(
            err.to_string(),
            "member index truncated at offset 12 while reading size of member #3"
        );
    }

    #[test]
    fn test_unknown_magic_display() {
        let err = Error::UnknownMagic { magic: *b"ZIP!" };
        assert!(err.to_string().contains("5a, 49, 50, 21"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::truncated_member("a.txt", 4, 2).is_recoverable());
        assert!(Error::unsupported("encrypted index").is_recoverable());
        assert!(!Error::truncated(0, 0, "path").is_recoverable());
        assert!(!Error::HeaderTooShort { len: 3 }.is_recoverable());
        assert!(!Error::out_of_bounds("member index", 64, 32).is_recoverable());

        // Writing one member out fails without affecting the archive
        let denied = || std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(Error::path_traversal("../x").is_recoverable());
        assert!(Error::file_write("out/a.txt", denied()).is_recoverable());
        assert!(Error::directory_create("out", denied()).is_recoverable());
        assert!(!Error::Io(denied()).is_recoverable());
    }
}
