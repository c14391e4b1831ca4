//! Typed view of the desired-state manifest (`ship.pkg`) and of the
//! checkpoint, which shares its format.
//!
//! Loading validates every `Package.*` section up front so that the rest of
//! the pipeline never sees a package without a version or a server.

use std::fmt;

use crate::table::{Section, Table};
use crate::types::{PackageName, Version, is_safe_file_name};
use crate::SchemaError;

/// Section listing `name = base URL` pairs.
pub const SERVERS_SECTION: &str = "Servers";

/// Prefix of per-package sections.
pub const PACKAGE_PREFIX: &str = "Package.";

const VERSION_KEY: &str = "Version";
const SERVER_KEY: &str = "Server";

/// A configured package server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEntry {
    /// Name used by `Package.*` entries and index cache files.
    pub name: String,
    /// Base URL the index and probes are requested from.
    pub url: String,
}

/// A desired package, one per `Package.<name>` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    /// Package identifier, taken from the section name.
    pub name: PackageName,
    /// Version recorded when the package was added.
    pub version: Version,
    /// Server the package was resolved from.
    pub server: String,
    /// Any other keys in the section, written back untouched.
    pub extra: Vec<(String, String)>,
}

impl PackageEntry {
    /// Create an entry with no extra keys.
    pub fn new(name: PackageName, version: Version, server: impl Into<String>) -> Self {
        Self {
            name,
            version,
            server: server.into(),
            extra: Vec::new(),
        }
    }

    /// The `Package.<name>` header for this entry.
    pub fn section_name(&self) -> String {
        format!("{PACKAGE_PREFIX}{}", self.name)
    }

    fn from_section(name: &str, section: &Section) -> Result<Self, SchemaError> {
        let name = PackageName::parse(name)?;
        let missing = |field| SchemaError::MissingField {
            section: section.name().to_string(),
            field,
        };

        let version = section.get_non_empty(VERSION_KEY).ok_or_else(|| missing(VERSION_KEY))?;
        let server = section.get_non_empty(SERVER_KEY).ok_or_else(|| missing(SERVER_KEY))?;

        let extra = section
            .iter()
            .filter(|(k, _)| *k != VERSION_KEY && *k != SERVER_KEY)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Ok(Self {
            name,
            version: Version::from(version),
            server: server.to_string(),
            extra,
        })
    }

    fn to_section(&self) -> Section {
        let mut section = Section::new(self.section_name())
            .with(VERSION_KEY, self.version.as_str())
            .with(SERVER_KEY, self.server.as_str());
        for (k, v) in &self.extra {
            section.set(k.as_str(), v.as_str());
        }
        section
    }
}

/// The desired-state manifest.
///
/// `Package.*` sections become [`PackageEntry`] records; every other section
/// (including `Servers` and `Customize.*`) is preserved in its original order
/// and written back ahead of the packages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    servers: Vec<ServerEntry>,
    packages: Vec<PackageEntry>,
    other: Table,
}

impl Manifest {
    /// An empty manifest, also the checkpoint before the first sync.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate manifest text.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the text does not parse or any section
    /// fails validation (see [`Manifest::from_table`]).
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        Self::from_table(Table::parse(text)?)
    }

    /// Validate a parsed table.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::MissingField`] for a package without `Version` or
    ///   `Server`, or a server with an empty URL.
    /// - [`SchemaError::DuplicateSection`] for a repeated `Package.<name>` or
    ///   `Servers` header.
    /// - [`SchemaError::InvalidName`] for an unusable package or server name.
    pub fn from_table(table: Table) -> Result<Self, SchemaError> {
        let mut manifest = Manifest::new();

        for section in table {
            if let Some(name) = section.name().strip_prefix(PACKAGE_PREFIX) {
                let entry = PackageEntry::from_section(name, &section)?;
                if manifest.contains_package(&entry.name) {
                    return Err(SchemaError::DuplicateSection(section.name().to_string()));
                }
                manifest.packages.push(entry);
                continue;
            }

            if section.name() == SERVERS_SECTION {
                if manifest.other.section(SERVERS_SECTION).is_some() {
                    return Err(SchemaError::DuplicateSection(SERVERS_SECTION.to_string()));
                }
                for (name, url) in section.iter() {
                    if !is_safe_file_name(name) {
                        return Err(SchemaError::InvalidName(name.to_string()));
                    }
                    if url.is_empty() {
                        return Err(SchemaError::MissingField {
                            section: SERVERS_SECTION.to_string(),
                            field: "url",
                        });
                    }
                    manifest.servers.push(ServerEntry {
                        name: name.to_string(),
                        url: url.to_string(),
                    });
                }
            }

            manifest.other.push(section);
        }

        Ok(manifest)
    }

    /// Convert back to a table: non-package sections first, then packages.
    pub fn to_table(&self) -> Table {
        let mut table = self.other.clone();
        for entry in &self.packages {
            table.push(entry.to_section());
        }
        table
    }

    /// Configured servers in enumeration order.
    pub fn servers(&self) -> &[ServerEntry] {
        &self.servers
    }

    /// Look up a server by name.
    pub fn server(&self, name: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// Desired packages in manifest order.
    pub fn packages(&self) -> &[PackageEntry] {
        &self.packages
    }

    /// Look up a package entry by name.
    pub fn package(&self, name: &str) -> Option<&PackageEntry> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Whether a `Package.<name>` section exists.
    pub fn contains_package(&self, name: &str) -> bool {
        self.package(name).is_some()
    }

    /// Append a package entry.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateSection`] if the package is already
    /// present; the manifest is left unchanged.
    pub fn add_package(&mut self, entry: PackageEntry) -> Result<(), SchemaError> {
        if self.contains_package(&entry.name) {
            return Err(SchemaError::DuplicateSection(entry.section_name()));
        }
        self.packages.push(entry);
        Ok(())
    }

    /// Remove a package entry.
    pub fn remove_package(&mut self, name: &str) -> Option<PackageEntry> {
        let pos = self.packages.iter().position(|p| p.name == name)?;
        Some(self.packages.remove(pos))
    }

    /// Any non-package section, e.g. `Customize.text`.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.other.section(name)
    }

    /// A copy of this manifest's non-package sections with a different
    /// package list. Used to build checkpoints.
    pub fn with_packages(&self, packages: impl IntoIterator<Item = PackageEntry>) -> Self {
        Self {
            servers: self.servers.clone(),
            packages: packages.into_iter().collect(),
            other: self.other.clone(),
        }
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_table().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[Servers]
official = "http://x"
mirror = "http://y"

[Customize.text]
InfoPrefix = "info"

[Package.foo]
Version = 2
Server = official
Pinned = yes

[Package.bar]
Version = "1.0"
Server = mirror
"#;

    #[test]
    fn test_parse_typed_records() {
        let manifest = Manifest::parse(SAMPLE).unwrap();

        let servers: Vec<_> = manifest.servers().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(servers, vec!["official", "mirror"]);
        assert_eq!(manifest.server("mirror").unwrap().url, "http://y");

        let foo = manifest.package("foo").unwrap();
        assert_eq!(foo.version, "2");
        assert_eq!(foo.server, "official");
        assert_eq!(foo.extra, vec![("Pinned".to_string(), "yes".to_string())]);

        assert_eq!(
            manifest.section("Customize.text").unwrap().get("InfoPrefix"),
            Some("info")
        );
    }

    #[test]
    fn test_missing_version_fails_fast() {
        let err = Manifest::parse("[Package.foo]\nServer = official\n").unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingField {
                section: "Package.foo".to_string(),
                field: "Version"
            }
        );
    }

    #[test]
    fn test_empty_server_fails_fast() {
        let err = Manifest::parse("[Package.foo]\nVersion = 1\nServer = \"\"\n").unwrap_err();
        assert!(matches!(err, SchemaError::MissingField { field: "Server", .. }));
    }

    #[test]
    fn test_duplicate_package_rejected() {
        let text = "[Package.foo]\nVersion=1\nServer=a\n[Package.foo]\nVersion=2\nServer=a\n";
        assert_eq!(
            Manifest::parse(text).unwrap_err(),
            SchemaError::DuplicateSection("Package.foo".to_string())
        );
    }

    #[test]
    fn test_invalid_package_name_rejected() {
        let err = Manifest::parse("[Package.../x]\nVersion=1\nServer=a\n").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidName(_)));
    }

    #[test]
    fn test_server_name_must_be_a_file_name() {
        let err = Manifest::parse("[Servers]\n'../up' = \"http://x\"\n").unwrap_err();
        assert_eq!(err, SchemaError::InvalidName("../up".to_string()));
    }

    #[test]
    fn test_add_package_rejects_duplicate() {
        let mut manifest = Manifest::parse(SAMPLE).unwrap();
        let before = manifest.clone();

        let dup = PackageEntry::new("foo".into(), "9".into(), "mirror");
        assert!(manifest.add_package(dup).is_err());
        assert_eq!(manifest, before);

        let new = PackageEntry::new("baz".into(), "1".into(), "official");
        manifest.add_package(new).unwrap();
        assert_eq!(manifest.packages().len(), 3);
    }

    #[test]
    fn test_round_trip() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let reparsed = Manifest::parse(&manifest.to_string()).unwrap();
        assert_eq!(manifest, reparsed);
    }

    #[test]
    fn test_with_packages_keeps_other_sections() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let checkpoint = manifest.with_packages(Vec::new());
        assert!(checkpoint.packages().is_empty());
        assert_eq!(checkpoint.servers(), manifest.servers());
        assert!(checkpoint.section("Customize.text").is_some());
    }
}
