//! Moving a built package into its final location.
//!
//! Two modes, chosen by `ForceDir` in the package's metadata:
//!
//! - **shared**: the whole package directory becomes
//!   `<install_root>/<package>` and `<bin_dir>/<package>` is a symlink to the
//!   package's main file.
//! - **ForceDir**: only `MainFile` is moved, straight to `InstallDir`
//!   (default `<bin_dir>/<package>`).
//!
//! Either way a record is written to `<install_root>/<package>/packageinfo`
//! so uninstall knows what to remove.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use ship_schema::packageinfo::PACKAGE_INFO_FILE;
use ship_schema::{BuildMetadata, PackageName, Section, Table};
use tracing::debug;

use crate::paths::Layout;

const INSTALLED_SECTION: &str = "Installed";
const LOCATION_KEY: &str = "Location";
const LAUNCHER_KEY: &str = "Launcher";
/// Numbered keys, `Placed.1`, `Placed.2`, ...
const PLACED_KEY: &str = "Placed";
const CREATED_DIR_KEY: &str = "CreatedDir";

/// Where a package ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Installed directory (shared) or placed `MainFile` (ForceDir).
    pub location: PathBuf,
    /// Launcher symlink, if one was created.
    pub launcher: Option<PathBuf>,
    pub force_dir: bool,
    /// ForceDir only: every path moved into the target. A directory
    /// `MainFile` contributes its children, a file `MainFile` itself.
    pub placed: Vec<PathBuf>,
    /// ForceDir only: the target directory did not exist before placement.
    pub created_dir: bool,
    /// `MainFile` (or the build script standing in for it) as declared, when
    /// it is absent from the package and no launcher could be made.
    pub missing_main: Option<String>,
}

/// Move an extracted, built package into place.
///
/// # Errors
///
/// Fails if `MainFile` is missing in ForceDir mode or any move or link
/// fails. Nothing already moved is rolled back.
pub fn place(
    layout: &Layout,
    name: &PackageName,
    package_dir: &Path,
    meta: &BuildMetadata,
) -> Result<Placement> {
    if meta.force_dir {
        place_forced(layout, name, package_dir, meta)
    } else {
        place_shared(layout, name, package_dir, meta)
    }
}

fn place_forced(
    layout: &Layout,
    name: &PackageName,
    package_dir: &Path,
    meta: &BuildMetadata,
) -> Result<Placement> {
    let Some(main) = meta.main_file.as_deref() else {
        bail!("ForceDir is set but MainFile is empty");
    };
    let source = package_dir.join(main);
    if fs::symlink_metadata(&source).is_err() {
        bail!("MainFile '{main}' not found in package");
    }

    let mut target = meta
        .install_dir
        .clone()
        .unwrap_or_else(|| layout.launcher(name));

    let mut placed = Vec::new();
    let mut created_dir = false;
    if source.is_dir() {
        created_dir = fs::symlink_metadata(&target).is_err();
        fs::create_dir_all(&target)
            .with_context(|| format!("Failed to create {}", target.display()))?;
        for entry in fs::read_dir(&source)? {
            let entry = entry?;
            let dest = target.join(entry.file_name());
            remove_path(&dest)?;
            move_path(&entry.path(), &dest)?;
            placed.push(dest);
        }
    } else {
        if target.is_dir()
            && let Some(file_name) = source.file_name()
        {
            target = target.join(file_name);
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        remove_path(&target)?;
        move_path(&source, &target)?;
        placed.push(target.clone());
    }

    debug!(package = %name, target = %target.display(), entries = placed.len(), "placed with ForceDir");
    Ok(Placement {
        location: target,
        launcher: None,
        force_dir: true,
        placed,
        created_dir,
        missing_main: None,
    })
}

fn place_shared(
    layout: &Layout,
    name: &PackageName,
    package_dir: &Path,
    meta: &BuildMetadata,
) -> Result<Placement> {
    let dest = layout.package_dir(name);
    fs::create_dir_all(layout.install_root())
        .with_context(|| format!("Failed to create {}", layout.install_root().display()))?;
    remove_path(&dest)?;
    move_path(package_dir, &dest)?;

    let mut launcher = None;
    let mut missing_main = None;
    if let Some(main) = meta.launcher_target() {
        if dest.join(main).exists() {
            let link = layout.launcher(name);
            link_launcher(&dest.join(main), &link)?;
            launcher = Some(link);
        } else {
            missing_main = Some(main.to_string());
        }
    }

    debug!(package = %name, dest = %dest.display(), "placed in install root");
    Ok(Placement {
        location: dest,
        launcher,
        force_dir: false,
        placed: Vec::new(),
        created_dir: false,
        missing_main,
    })
}

/// Create or replace the `<bin_dir>/<package>` symlink.
fn link_launcher(target: &Path, link: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    if let Ok(meta) = fs::symlink_metadata(link) {
        if meta.is_dir() {
            bail!("{} exists and is a directory", link.display());
        }
        fs::remove_file(link).with_context(|| format!("Failed to replace {}", link.display()))?;
    }

    #[cfg(unix)]
    std::os::unix::fs::symlink(target, link)
        .with_context(|| format!("Failed to link {} -> {}", link.display(), target.display()))?;
    #[cfg(not(unix))]
    fs::copy(target, link)
        .with_context(|| format!("Failed to copy {} -> {}", target.display(), link.display()))?;

    Ok(())
}

/// Move a file or directory, falling back to copy + delete across
/// filesystems.
pub(crate) fn move_path(src: &Path, dst: &Path) -> Result<()> {
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    if src.is_dir() {
        fs::create_dir_all(dst).with_context(|| format!("Failed to create {}", dst.display()))?;
        copy_dir_all(src, dst)?;
        fs::remove_dir_all(src).with_context(|| format!("Failed to remove {}", src.display()))?;
    } else {
        fs::copy(src, dst)
            .with_context(|| format!("Failed to move {} to {}", src.display(), dst.display()))?;
        fs::remove_file(src).with_context(|| format!("Failed to remove {}", src.display()))?;
    }
    Ok(())
}

/// Recursively copy a directory tree from `src` into `dst`.
fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs_extra::dir::copy(
        src,
        dst,
        &fs_extra::dir::CopyOptions::new()
            .content_only(true)
            .overwrite(true),
    )
    .map_err(|e| anyhow::anyhow!("Copy failed: {e}"))?;
    Ok(())
}

/// Remove whatever is at `path`; a missing path is fine. Symlinks are
/// removed, never followed.
pub(crate) fn remove_path(path: &Path) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
    .with_context(|| format!("Failed to remove {}", path.display()))
}

/// What uninstall needs to know about an installed package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRecord {
    pub metadata: BuildMetadata,
    pub location: Option<PathBuf>,
    pub launcher: Option<PathBuf>,
    /// Paths a ForceDir placement moved into its target.
    pub placed: Vec<PathBuf>,
    /// A ForceDir placement created its target directory.
    pub created_dir: bool,
}

impl InstallRecord {
    /// Read `<install_root>/<package>/packageinfo`. `Ok(None)` if the package
    /// has no record.
    ///
    /// # Errors
    ///
    /// Fails if the record exists but cannot be read or parsed.
    pub fn read(layout: &Layout, name: &PackageName) -> Result<Option<Self>> {
        let path = layout.record_path(name);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };

        let table = Table::parse(&text).with_context(|| format!("Corrupt record {}", path.display()))?;
        let installed = table.section(INSTALLED_SECTION);
        let location = installed
            .and_then(|s| s.get_non_empty(LOCATION_KEY))
            .map(PathBuf::from);
        let launcher = installed
            .and_then(|s| s.get_non_empty(LAUNCHER_KEY))
            .map(PathBuf::from);
        let placed = installed
            .map(|s| {
                (1..)
                    .map_while(|i| s.get_non_empty(&format!("{PLACED_KEY}.{i}")))
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();
        let created_dir = installed
            .and_then(|s| s.get(CREATED_DIR_KEY))
            .is_some_and(|v| v == "yes");
        let metadata = BuildMetadata::from_table(table)
            .with_context(|| format!("Corrupt record {}", path.display()))?;

        Ok(Some(Self {
            metadata,
            location,
            launcher,
            placed,
            created_dir,
        }))
    }
}

/// Write the install record: the package's metadata plus where it went.
///
/// # Errors
///
/// Fails if the record file cannot be written.
pub fn write_record(
    layout: &Layout,
    name: &PackageName,
    meta: &BuildMetadata,
    placement: &Placement,
) -> Result<PathBuf> {
    let mut table = meta.raw().clone();
    table.remove(INSTALLED_SECTION);

    let mut installed = Section::new(INSTALLED_SECTION)
        .with(LOCATION_KEY, placement.location.display().to_string());
    if let Some(link) = &placement.launcher {
        installed.set(LAUNCHER_KEY, link.display().to_string());
    }
    for (i, path) in placement.placed.iter().enumerate() {
        installed.set(format!("{PLACED_KEY}.{}", i + 1), path.display().to_string());
    }
    if placement.created_dir {
        installed.set(CREATED_DIR_KEY, "yes");
    }
    table.push(installed);

    let dir = layout.package_dir(name);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(PACKAGE_INFO_FILE);
    fs::write(&path, table.to_string())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
