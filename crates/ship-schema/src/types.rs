//! Validated identifier types: package names and versions.

use std::borrow::Borrow;
use std::fmt;

use crate::SchemaError;

/// A package identifier as it appears in `Package.<name>` sections, index
/// keys and `packageinfo` dependency lists.
///
/// Names are case-sensitive and double as directory and launcher names, so
/// [`PackageName::parse`] rejects anything that could escape a directory.
///
/// # Example
///
/// ```
/// use ship_schema::PackageName;
///
/// let name = PackageName::parse("ripgrep").unwrap();
/// assert_eq!(name.as_str(), "ripgrep");
/// assert!(PackageName::parse("../etc").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName(String);

impl PackageName {
    /// Wrap a name without validation. Prefer [`PackageName::parse`] for
    /// anything read from disk or the command line.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Validate and wrap a name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidName`] for empty names, `.`/`..`, and
    /// names containing path separators, whitespace or control characters.
    pub fn parse(name: &str) -> Result<Self, SchemaError> {
        if !is_safe_file_name(name) {
            return Err(SchemaError::InvalidName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<std::path::Path> for PackageName {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Whether `name` can be used as a single path component.
pub(crate) fn is_safe_file_name(name: &str) -> bool {
    !(name.is_empty()
        || name == "."
        || name == ".."
        || name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control()))
}

/// An opaque version string. Versions are copied from indices into the
/// manifest and used in staging file names; they are never compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Version(String);

impl Version {
    /// Wrap a version string.
    pub fn new(v: impl Into<String>) -> Self {
        Self(v.into())
    }

    /// The version as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::ops::Deref for Version {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<&str> for Version {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_plain_names() {
        for name in ["foo", "libfoo-2", "foo_bar", "foo.bar", "Foo"] {
            assert_eq!(PackageName::parse(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_parse_rejects_path_like_names() {
        for name in ["", ".", "..", "a/b", "a\\b", "a b", "tab\there"] {
            assert!(PackageName::parse(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_names_are_case_sensitive() {
        assert_ne!(PackageName::new("JQ"), PackageName::new("jq"));
    }
}
