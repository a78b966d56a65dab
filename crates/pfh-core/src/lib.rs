//! # pfh-core
//!
//! A library for reading PFH pack archives: containers that bundle thousands
//! of named byte blobs into a single file behind a variable-length index.
//!
//! This crate provides the core functionality for:
//! - Decoding the fixed pack header and its flag bits
//! - Decoding the member index and reconstructing each member's data offset
//! - Random-access extraction of members without reading the whole archive
//! - Summarizing archive contents by file suffix
//!
//! ## Architecture
//!
//! - [`format`]: header and member index decoding (pure byte transforms)
//! - [`source`]: positioned-read sources ([`ReadAt`])
//! - [`store`]: member extraction
//! - [`inventory`]: per-suffix statistics
//! - [`archive`]: the [`PackArchive`] entry point tying them together
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use pfh_core::PackArchive;
//!
//! let archive = PackArchive::open("data/local_en.pack")?;
//! println!("{} members", archive.len());
//!
//! for entry in archive.filter(".loc") {
//!     let bytes = archive.extract(entry)?;
//!     println!("{}: {} bytes", entry.path, bytes.len());
//! }
//! # Ok::<(), pfh_core::Error>(())
//! ```
//!
//! ## Concurrency
//!
//! Extraction only performs positioned reads, so a `&PackArchive` can be
//! shared between threads. Enable the `parallel` feature to have
//! [`PackArchive::extract_all`] read members on the rayon thread pool.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod archive;
pub mod error;
pub mod format;
pub mod inventory;
pub mod source;
pub mod store;

// Re-export primary types for convenience
pub use archive::PackArchive;
pub use error::{Error, Result};
pub use format::{
    ArchiveKind, DecoderConfig, HeaderFlags, IndexStatus, PackEntry, PackHeader, PackVersion,
};
pub use inventory::{Inventory, SuffixStats};
pub use source::{FileSource, ReadAt};
pub use store::MemberStore;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
