//! Shared data formats for ship.
//!
//! Everything here is pure: text in, typed records out. File IO, locking and
//! network access live in `ship-core`.

pub mod index;
pub mod manifest;
pub mod packageinfo;
pub mod table;
pub mod types;

// Re-exports
pub use index::{IndexEntry, PackageIndex};
pub use manifest::{Manifest, PackageEntry, ServerEntry};
pub use packageinfo::BuildMetadata;
pub use table::{Section, Table, TableError};
pub use types::{PackageName, Version};

use thiserror::Error;

/// Errors raised while validating parsed tables into typed records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The text itself could not be parsed.
    #[error(transparent)]
    Table(#[from] TableError),

    /// A required key is absent or empty.
    #[error("section [{section}] is missing required field '{field}'")]
    MissingField {
        /// Section that lacks the field.
        section: String,
        /// Name of the missing key.
        field: &'static str,
    },

    /// The same section header appears twice where names must be unique.
    #[error("duplicate section [{0}]")]
    DuplicateSection(String),

    /// A package name that cannot be used as a directory name.
    #[error("invalid package name '{0}'")]
    InvalidName(String),
}
