//! Archive statistics grouped by file suffix.

use crate::format::PackEntry;
use std::collections::BTreeMap;

/// Key used for members whose name has no suffix
pub const NO_SUFFIX: &str = ".no_extension";

/// Count and byte total for one suffix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuffixStats {
    /// Number of members
    pub count: usize,
    /// Sum of member sizes in bytes
    pub total_size: u64,
}

/// Summary of an archive's members
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    /// Number of members summarized
    pub file_count: usize,
    /// Sum of all member sizes in bytes
    pub total_size: u64,
    /// Per-suffix statistics keyed by lowercase suffix (dot included)
    pub suffixes: BTreeMap<String, SuffixStats>,
}

impl Inventory {
    /// Groups `entries` by the lowercase suffix of their file name
    pub fn summarize<'a>(entries: impl IntoIterator<Item = &'a PackEntry>) -> Self {
        let mut inventory = Self::default();
        for entry in entries {
            let key = member_suffix(&entry.path).unwrap_or_else(|| NO_SUFFIX.to_string());
            let stats = inventory.suffixes.entry(key).or_default();
            stats.count += 1;
            stats.total_size += u64::from(entry.size);

            inventory.file_count += 1;
            inventory.total_size += u64::from(entry.size);
        }
        inventory
    }

    /// Returns true if no members were summarized
    pub fn is_empty(&self) -> bool {
        self.file_count == 0
    }

    /// The `n` most common suffixes, most common first, ties broken by suffix
    pub fn top_by_count(&self, n: usize) -> Vec<(&str, SuffixStats)> {
        let mut ranked: Vec<(&str, SuffixStats)> = self
            .suffixes
            .iter()
            .map(|(suffix, stats)| (suffix.as_str(), *stats))
            .collect();
        ranked.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// Lowercase suffix of the last path component, including the dot.
///
/// Returns `None` for names without a dot, names whose only dot is the first
/// character, and names ending in a dot.
pub fn member_suffix(path: &str) -> Option<String> {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let dot = name.rfind('.')?;
    if dot == 0 || dot + 1 == name.len() {
        return None;
    }
    Some(name[dot..].to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(path: &str, size: u32) -> PackEntry {
        PackEntry {
            path: path.to_string(),
            size,
            data_offset: 0,
            timestamp: None,
        }
    }

    #[test]
    fn test_member_suffix() {
        assert_eq!(member_suffix("ui/skins/button.PNG").as_deref(), Some(".png"));
        assert_eq!(member_suffix("archive.tar.gz").as_deref(), Some(".gz"));
        assert_eq!(member_suffix("db/units_tables/data"), None);
        assert_eq!(member_suffix("config/.hidden"), None);
        assert_eq!(member_suffix("trailing."), None);
        assert_eq!(member_suffix("some.dir/file"), None);
    }

    #[test]
    fn test_summarize() {
        let entries = vec![
            entry("a.xml", 10),
            entry("b.XML", 5),
            entry("db/table", 7),
            entry("c.lua", 1),
        ];
        let inventory = Inventory::summarize(&entries);

        assert_eq!(inventory.file_count, 4);
        assert_eq!(inventory.total_size, 23);
        assert_eq!(
            inventory.suffixes[".xml"],
            SuffixStats {
                count: 2,
                total_size: 15
            }
        );
        assert_eq!(inventory.suffixes[NO_SUFFIX].count, 1);
        assert_eq!(inventory.suffixes[".lua"].total_size, 1);
    }

    #[test]
    fn test_order_independent() {
        let mut entries = vec![entry("a.xml", 1), entry("b.lua", 2), entry("c.xml", 3)];
        let forward = Inventory::summarize(&entries);
        entries.reverse();
        assert_eq!(forward, Inventory::summarize(&entries));
    }

    #[test]
    fn test_empty() {
        let inventory = Inventory::summarize(std::iter::empty());
        assert!(inventory.is_empty());
        assert!(inventory.suffixes.is_empty());
    }

    #[test]
    fn test_top_by_count() {
        let entries = vec![
            entry("a.lua", 1),
            entry("b.xml", 1),
            entry("c.xml", 1),
            entry("d.dds", 1),
            entry("e.dds", 1),
        ];
        let inventory = Inventory::summarize(&entries);
        let top: Vec<&str> = inventory.top_by_count(2).into_iter().map(|(s, _)| s).collect();
        assert_eq!(top, vec![".dds", ".xml"]);
    }
}
