//! Opened pack archives.
//!
//! [`PackArchive::open`] reads the header and the member index once, in that
//! order, and only returns when both are decoded. An archive value therefore
//! always has its entry list ready and is the only way to reach extraction.

use crate::error::{Error, Result};
use crate::format::{
    data_region_len, decode_index_with_config, DecoderConfig, IndexStatus, PackEntry, PackHeader,
    HEADER_SIZE,
};
use crate::inventory::Inventory;
use crate::source::{read_range, FileSource, ReadAt};
use crate::store::MemberStore;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// A pack archive with its header and member index decoded
pub struct PackArchive<S: ReadAt = FileSource> {
    source: S,
    header: PackHeader,
    entries: Vec<PackEntry>,
    status: IndexStatus,
}

impl PackArchive<FileSource> {
    /// Opens the archive at `path` with default decoding options
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, DecoderConfig::default())
    }

    /// Opens the archive at `path`.
    ///
    /// Fails with [`Error::NotFound`] if the path is not a readable file. The
    /// file stays open read-only until the archive is dropped.
    pub fn open_with_config(path: impl AsRef<Path>, config: DecoderConfig) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening archive {}", path.display());
        let source = FileSource::open(path)?;
        Self::from_source(source, config)
    }
}

impl<S: ReadAt> PackArchive<S> {
    /// Decodes an archive from any positioned-read source
    pub fn from_source(source: S, config: DecoderConfig) -> Result<Self> {
        let header_bytes = read_range(&source, 0, HEADER_SIZE)?;
        let header = PackHeader::decode(&header_bytes)?;
        trace!(
            "Header read: {} {} archive, {} members, flags {:?}",
            header.version,
            header.kind,
            header.member_count,
            header.flags
        );

        let index_range = header.index_range();
        let index = if header.flags.index_encrypted {
            Vec::new()
        } else {
            if index_range.end > source.size() {
                return Err(Error::out_of_bounds(
                    "member index",
                    index_range.end,
                    source.size(),
                ));
            }
            let len = index_range.end - index_range.start;
            let bytes = read_range(&source, index_range.start, len as usize)?;
            if (bytes.len() as u64) < len {
                return Err(Error::out_of_bounds(
                    "member index",
                    index_range.end,
                    source.size(),
                ));
            }
            bytes
        };

        let (entries, status) = match decode_index_with_config(&header, &index, &config) {
            Ok(decoded) => (decoded.entries, decoded.status),
            Err(Error::UnsupportedFeature { feature }) => {
                warn!("Archive index not decoded ({}); opening with no members", feature);
                (Vec::new(), IndexStatus::Unsupported(feature))
            }
            Err(e) => return Err(e),
        };
        trace!("Index read: {} entries, status {:?}", entries.len(), status);

        if config.check_data_bounds {
            let end = header.data_region_start() + data_region_len(&header, &entries);
            if end > source.size() {
                return Err(Error::out_of_bounds("data region", end, source.size()));
            }
        }

        debug!(
            "Archive ready: {} {} members, data region at {}",
            entries.len(),
            header.version,
            header.data_region_start()
        );

        Ok(Self {
            source,
            header,
            entries,
            status,
        })
    }

    /// The decoded header
    pub fn header(&self) -> &PackHeader {
        &self.header
    }

    /// Members in archive-index order
    pub fn entries(&self) -> &[PackEntry] {
        &self.entries
    }

    /// How index decoding ended
    pub fn index_status(&self) -> IndexStatus {
        self.status
    }

    /// Number of decoded members
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the archive has no decoded members
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The underlying byte source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// First member whose path equals `path`
    pub fn find(&self, path: &str) -> Option<&PackEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// First member whose path equals or ends with `pattern`
    pub fn find_matching(&self, pattern: &str) -> Option<&PackEntry> {
        self.find(pattern)
            .or_else(|| self.entries.iter().find(|e| e.path.ends_with(pattern)))
    }

    /// All members whose path contains `pattern`, ignoring case
    pub fn filter(&self, pattern: &str) -> Vec<&PackEntry> {
        let needle = pattern.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.path.to_lowercase().contains(&needle))
            .collect()
    }

    /// Extraction view over this archive's data region
    pub fn store(&self) -> MemberStore<'_, S> {
        MemberStore::new(&self.source, self.header.data_region_start(), &self.entries)
    }

    /// Reads the contents of one member
    pub fn extract(&self, entry: &PackEntry) -> Result<Vec<u8>> {
        self.store().extract(entry)
    }

    /// Reads every member accepted by `predicate`, in index order
    pub fn extract_all<P>(&self, predicate: P) -> Result<Vec<(&PackEntry, Vec<u8>)>>
    where
        P: Fn(&PackEntry) -> bool + Sync,
    {
        self.store().extract_all(predicate)
    }

    /// Reads the given members, keeping their order
    pub fn extract_entries<'e>(
        &self,
        entries: &[&'e PackEntry],
    ) -> Result<Vec<(&'e PackEntry, Vec<u8>)>> {
        self.store().extract_entries(entries)
    }

    /// Writes one member under `out_dir`, returning the written path
    pub fn extract_to(&self, entry: &PackEntry, out_dir: impl AsRef<Path>) -> Result<PathBuf> {
        self.store().extract_to(entry, out_dir)
    }

    /// Per-suffix statistics of the decoded members
    pub fn summarize(&self) -> Inventory {
        Inventory::summarize(&self.entries)
    }
}

impl<S: ReadAt> fmt::Debug for PackArchive<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackArchive")
            .field("header", &self.header)
            .field("entries", &self.entries.len())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
