//! Build metadata shipped inside every package archive as `packageinfo`.
//!
//! ```text
//! [meta]
//! BuildScript = install.sh
//! MainFile = bin/tool
//! ForceDir = no
//!
//! [Dependencies]
//! libfoo = ""
//! shippkg = ""
//! ```

use std::fmt;
use std::path::PathBuf;

use crate::table::{Section, Table};
use crate::types::PackageName;
use crate::SchemaError;

/// File name of the metadata inside an archive and inside an installed
/// package directory.
pub const PACKAGE_INFO_FILE: &str = "packageinfo";

/// Reserved dependency name denoting ship itself. Never added to a manifest.
pub const SELF_PACKAGE: &str = "shippkg";

/// Build script used when `meta.BuildScript` is unset.
pub const DEFAULT_BUILD_SCRIPT: &str = "install.sh";

const META_SECTION: &str = "meta";
const DEPENDENCIES_SECTION: &str = "Dependencies";

/// Parsed `packageinfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMetadata {
    /// Script run from the package directory after dependencies are queued.
    pub build_script: String,
    /// File or directory that is the package's entry point.
    pub main_file: Option<String>,
    /// Place `main_file` directly at `install_dir` instead of the install root.
    pub force_dir: bool,
    /// Target for ForceDir placement.
    pub install_dir: Option<PathBuf>,
    /// Declared dependencies in file order, `shippkg` included.
    pub dependencies: Vec<PackageName>,
    raw: Table,
}

impl BuildMetadata {
    /// Parse `packageinfo` text.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Table`] for unparsable text and
    /// [`SchemaError::InvalidName`] for a dependency that is not a usable
    /// package name.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        Self::from_table(Table::parse(text)?)
    }

    /// Validate a parsed table.
    ///
    /// # Errors
    ///
    /// See [`BuildMetadata::parse`].
    pub fn from_table(raw: Table) -> Result<Self, SchemaError> {
        let empty = Section::new(META_SECTION);
        let meta = raw.section(META_SECTION).unwrap_or(&empty);

        let build_script = meta
            .get_non_empty("BuildScript")
            .unwrap_or(DEFAULT_BUILD_SCRIPT)
            .to_string();
        let main_file = meta.get_non_empty("MainFile").map(str::to_string);
        let force_dir = meta.get("ForceDir") == Some("yes");
        let install_dir = meta.get_non_empty("InstallDir").map(PathBuf::from);

        let dependencies = raw
            .section(DEPENDENCIES_SECTION)
            .map(|deps| {
                deps.iter()
                    .map(|(name, _)| PackageName::parse(name))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            build_script,
            main_file,
            force_dir,
            install_dir,
            dependencies,
            raw,
        })
    }

    /// Dependencies that should be queued, i.e. everything but `shippkg`.
    pub fn required_packages(&self) -> impl Iterator<Item = &PackageName> {
        self.dependencies.iter().filter(|d| *d != SELF_PACKAGE)
    }

    /// File the launcher points at: `MainFile`, falling back to the build
    /// script.
    pub fn launcher_target(&self) -> Option<&str> {
        self.main_file
            .as_deref()
            .or(Some(self.build_script.as_str()))
            .filter(|s| !s.is_empty())
    }

    /// The table this metadata was read from.
    pub fn raw(&self) -> &Table {
        &self.raw
    }
}

impl fmt::Display for BuildMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let meta = BuildMetadata::parse("").unwrap();
        assert_eq!(meta.build_script, DEFAULT_BUILD_SCRIPT);
        assert!(meta.main_file.is_none());
        assert!(!meta.force_dir);
        assert!(meta.install_dir.is_none());
        assert!(meta.dependencies.is_empty());
        assert_eq!(meta.launcher_target(), Some(DEFAULT_BUILD_SCRIPT));
    }

    #[test]
    fn test_full_metadata() {
        let meta = BuildMetadata::parse(
            "[meta]\nBuildScript = build.sh\nMainFile = bin/tool\nForceDir = yes\nInstallDir = /opt/tool\n\
             [Dependencies]\nlibfoo = \"\"\nshippkg = \"\"\nlibbar = \">=2\"\n",
        )
        .unwrap();

        assert_eq!(meta.build_script, "build.sh");
        assert_eq!(meta.main_file.as_deref(), Some("bin/tool"));
        assert!(meta.force_dir);
        assert_eq!(meta.install_dir, Some(PathBuf::from("/opt/tool")));
        assert_eq!(meta.launcher_target(), Some("bin/tool"));

        let required: Vec<_> = meta.required_packages().map(PackageName::as_str).collect();
        assert_eq!(required, vec!["libfoo", "libbar"]);
        assert_eq!(meta.dependencies.len(), 3);
    }

    #[test]
    fn test_force_dir_requires_literal_yes() {
        let meta = BuildMetadata::parse("[meta]\nForceDir = true\n").unwrap();
        assert!(!meta.force_dir);
    }

    #[test]
    fn test_display_round_trips_raw_table() {
        let text = "[meta]\nMainFile = run\n[Dependencies]\na = \"\"\n";
        let meta = BuildMetadata::parse(text).unwrap();
        assert_eq!(BuildMetadata::parse(&meta.to_string()).unwrap(), meta);
    }
}
