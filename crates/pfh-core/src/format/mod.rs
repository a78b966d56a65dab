//! PFH pack format decoding.
//!
//! ## File Layout
//!
//! A pack file is laid out as:
//! 1. A 32-byte header, optionally followed by 20 extended header bytes
//! 2. A secondary index whose size is declared by the header (not interpreted)
//! 3. The member index: one variable-length record per member
//! 4. The data region: member bytes back-to-back in index order
//!
//! - [`header`]: fixed header decoding
//! - [`index`]: member index decoding and offset reconstruction
//!
//! ## Limitations
//!
//! - No decryption of encrypted indexes
//! - No decompression of compressed members
//! - Read-only: archives are never written

pub mod header;
pub mod index;

pub use header::{
    ArchiveKind, HeaderFlags, PackHeader, PackVersion, EXTENDED_HEADER_SIZE, HEADER_SIZE,
};
pub use index::{
    data_region_len, decode_index, decode_index_with_config, padded_size, DecodedIndex,
    DecoderConfig, IndexStatus, PackEntry, DATA_ALIGNMENT,
};
