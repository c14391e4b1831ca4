//! Per-server package index.
//!
//! An index is a table whose section names are `<packageName>.<revision>`.
//! Several revisions of one package may coexist; the revision is only a
//! tie-break, never a semantic version.

use crate::table::Table;
use crate::types::{PackageName, Version};
use crate::SchemaError;

/// File name of the index on a server, relative to its base URL.
pub const INDEX_FILE: &str = "packages.pkg";

const VERSION_KEY: &str = "Version";
const URL_KEY: &str = "URL";

/// One cataloged revision of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Full section name, e.g. `foo.3`.
    pub key: String,
    /// Package part of the key.
    pub name: PackageName,
    /// Revision part of the key; 0 when missing or non-numeric.
    pub revision: u64,
    /// Version offered by this revision.
    pub version: Version,
    /// Archive location, if the entry declares one.
    pub url: Option<String>,
    /// Remaining attributes in file order.
    pub attributes: Vec<(String, String)>,
}

/// A server's package catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageIndex {
    entries: Vec<IndexEntry>,
    rejected: Vec<String>,
}

impl PackageIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse index text.
    ///
    /// Entries without a `Version` and repeated keys are not fatal: they are
    /// left out and listed in [`rejected`](Self::rejected).
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Table`] if the text is not valid section text.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        Ok(Self::from_table(Table::parse(text)?))
    }

    /// Build an index from a parsed table.
    pub fn from_table(table: Table) -> Self {
        let mut index = PackageIndex::new();

        for section in table {
            let key = section.name().to_string();
            if index.entries.iter().any(|e| e.key == key) {
                index.rejected.push(key);
                continue;
            }
            let Some(version) = section.get_non_empty(VERSION_KEY) else {
                index.rejected.push(key);
                continue;
            };

            let (name, revision) = split_key(&key);
            let attributes = section
                .iter()
                .filter(|(k, _)| *k != VERSION_KEY && *k != URL_KEY)
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();

            index.entries.push(IndexEntry {
                name: PackageName::new(name),
                revision,
                version: Version::from(version),
                url: section.get_non_empty(URL_KEY).map(str::to_string),
                attributes,
                key,
            });
        }

        index
    }

    /// The newest cataloged revision of `name`.
    ///
    /// Picks the numerically greatest revision; on a tie the entry that
    /// appears first in the index wins.
    pub fn latest(&self, name: &str) -> Option<&IndexEntry> {
        self.entries
            .iter()
            .filter(|e| e.name == name)
            .fold(None, |best, entry| match best {
                Some(b) if b.revision >= entry.revision => Some(b),
                _ => Some(entry),
            })
    }

    /// All revisions of `name`, in index order.
    pub fn candidates<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a IndexEntry> {
        self.entries.iter().filter(move |e| e.name == name)
    }

    /// All entries in index order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Keys that were skipped while loading.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    /// Number of usable entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no usable entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split an index key at its last `.` into package name and revision.
///
/// ```
/// use ship_schema::index::split_key;
///
/// assert_eq!(split_key("foo.3"), ("foo", 3));
/// assert_eq!(split_key("foo.beta"), ("foo", 0));
/// assert_eq!(split_key("foo"), ("foo", 0));
/// ```
pub fn split_key(key: &str) -> (&str, u64) {
    match key.rsplit_once('.') {
        Some((name, rev)) if !name.is_empty() => (name, rev.parse().unwrap_or(0)),
        _ => (key, 0),
    }
}
