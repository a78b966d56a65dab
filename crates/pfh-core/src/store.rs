//! Member extraction.
//!
//! A [`MemberStore`] borrows an opened archive's source and entry list and
//! turns entries into bytes. Each extraction is one positioned read, so
//! extractions are independent of each other and may run concurrently.

use crate::error::{Error, Result};
use crate::format::PackEntry;
use crate::source::{read_range, ReadAt};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

/// Random-access reader over the data region of an opened archive
pub struct MemberStore<'a, S: ReadAt + ?Sized> {
    source: &'a S,
    data_start: u64,
    entries: &'a [PackEntry],
}

impl<'a, S: ReadAt + ?Sized> fmt::Debug for MemberStore<'a, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberStore")
            .field("data_start", &self.data_start)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl<'a, S: ReadAt + ?Sized> Clone for MemberStore<'a, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, S: ReadAt + ?Sized> Copy for MemberStore<'a, S> {}

impl<'a, S: ReadAt + ?Sized> MemberStore<'a, S> {
    /// Creates a store over `source` whose data region starts at `data_start`
    pub fn new(source: &'a S, data_start: u64, entries: &'a [PackEntry]) -> Self {
        Self {
            source,
            data_start,
            entries,
        }
    }

    /// Entries this store can extract, in index order
    pub fn entries(&self) -> &'a [PackEntry] {
        self.entries
    }

    /// Reads the complete contents of `entry`.
    ///
    /// Fails with [`Error::TruncatedMember`] if the archive ends before the
    /// declared size is reached; the missing bytes are never zero-filled.
    pub fn extract(&self, entry: &PackEntry) -> Result<Vec<u8>> {
        let offset = self.data_start + entry.data_offset;
        trace!("Extracting {} from offset {}", entry.path, offset);

        let data = read_range(self.source, offset, entry.size as usize)?;
        if data.len() != entry.size as usize {
            return Err(Error::truncated_member(
                entry.path.clone(),
                u64::from(entry.size),
                data.len() as u64,
            ));
        }
        Ok(data)
    }

    /// Extracts every entry accepted by `predicate`, in index order.
    ///
    /// See [`MemberStore::extract_entries`] for the failure policy.
    pub fn extract_all<P>(&self, predicate: P) -> Result<Vec<(&'a PackEntry, Vec<u8>)>>
    where
        P: Fn(&PackEntry) -> bool + Sync,
    {
        let selected: Vec<&'a PackEntry> = self.entries.iter().filter(|e| predicate(e)).collect();
        debug!("Extracting {} of {} members", selected.len(), self.entries.len());
        self.extract_entries(&selected)
    }

    /// Extracts `entries`, keeping their order.
    ///
    /// With the `parallel` feature the reads run on the rayon thread pool.
    /// Every read completes before results are inspected, so the error
    /// returned is always the one of the earliest failing entry.
    pub fn extract_entries<'e>(
        &self,
        entries: &[&'e PackEntry],
    ) -> Result<Vec<(&'e PackEntry, Vec<u8>)>> {
        #[cfg(feature = "parallel")]
        let results: Vec<Result<Vec<u8>>> = {
            use rayon::prelude::*;
            entries.par_iter().map(|entry| self.extract(entry)).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let results: Vec<Result<Vec<u8>>> =
            entries.iter().map(|entry| self.extract(entry)).collect();

        entries
            .iter()
            .zip(results)
            .map(|(entry, data)| data.map(|data| (*entry, data)))
            .collect()
    }

    /// Extracts `entry` to its virtual path under `out_dir`.
    ///
    /// Returns the written path. Absolute member paths and `..` components are
    /// rejected with [`Error::PathTraversal`].
    pub fn extract_to(&self, entry: &PackEntry, out_dir: impl AsRef<Path>) -> Result<PathBuf> {
        // Reject the path before touching the archive
        sanitize_member_path(&entry.path)?;
        let data = self.extract(entry)?;
        write_member(entry, &data, out_dir)
    }
}

/// Writes already extracted `data` for `entry` to its virtual path under `out_dir`.
///
/// Missing parent directories are created. Returns the written path.
pub fn write_member(
    entry: &PackEntry,
    data: &[u8],
    out_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let output_path = out_dir.as_ref().join(sanitize_member_path(&entry.path)?);

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::directory_create(parent, e))?;
    }
    fs::write(&output_path, data).map_err(|e| Error::file_write(&output_path, e))?;

    debug!("Wrote {} ({} bytes)", output_path.display(), data.len());
    Ok(output_path)
}

/// Converts a virtual member path into a relative filesystem path.
///
/// Both `/` and `\` separate components. Empty and `.` components are dropped.
pub fn sanitize_member_path(path: &str) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for part in path.split(['/', '\\']) {
        if part.is_empty() || part == "." {
            continue;
        }
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => out.push(name),
            _ => return Err(Error::path_traversal(path)),
        }
    }

    if out.as_os_str().is_empty() || path.starts_with(['/', '\\']) {
        return Err(Error::path_traversal(path));
    }
    Ok(out)
}
