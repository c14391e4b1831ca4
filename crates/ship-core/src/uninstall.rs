//! Physical removal of installed packages.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ship_schema::PackageName;
use tracing::{debug, warn};

use crate::paths::Layout;
use crate::placement::{InstallRecord, remove_path};

/// What an uninstall actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    /// No record was found; anything under the package directory was
    /// still cleared.
    NotInstalled,
}

/// Remove a package's placed files, its launcher and its install directory.
///
/// A launcher is only removed when it is a symlink pointing into the install
/// root, so a user's own file of the same name survives.
///
/// # Errors
///
/// Fails if the record is unreadable or a removal fails. The caller keeps
/// the package in the checkpoint so the next sync retries.
pub fn uninstall(layout: &Layout, name: &PackageName) -> Result<Removal> {
    let Some(record) = InstallRecord::read(layout, name)? else {
        debug!(package = %name, "no install record");
        remove_path(&layout.package_dir(name))?;
        return Ok(Removal::NotInstalled);
    };

    if record.metadata.force_dir {
        let target = record
            .location
            .clone()
            .or_else(|| record.metadata.install_dir.clone())
            .unwrap_or_else(|| layout.launcher(name));
        remove_placed(&record, &target)?;
    }

    let launcher = record.launcher.unwrap_or_else(|| layout.launcher(name));
    remove_launcher(layout, &launcher)?;

    remove_path(&layout.package_dir(name))?;
    Ok(Removal::Removed)
}

/// Remove only what a ForceDir placement put into `target`. The target
/// directory itself goes only if ship created it and it is now empty.
fn remove_placed(record: &InstallRecord, target: &Path) -> Result<()> {
    if record.placed.is_empty() {
        match fs::symlink_metadata(target) {
            Ok(meta) if meta.is_dir() => {
                warn!(target = %target.display(), "record lists no placed files, leaving directory");
            }
            Ok(_) => remove_path(target)?,
            Err(_) => {}
        }
        return Ok(());
    }

    for path in &record.placed {
        remove_path(path)?;
    }
    if record.created_dir && fs::remove_dir(target).is_err() {
        debug!(target = %target.display(), "install directory not empty, leaving it");
    }
    Ok(())
}

fn remove_launcher(layout: &Layout, link: &Path) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(link) else {
        return Ok(());
    };
    if !meta.file_type().is_symlink() {
        return Ok(());
    }

    let target = fs::read_link(link).with_context(|| format!("Failed to read {}", link.display()))?;
    if target.starts_with(layout.install_root()) {
        fs::remove_file(link).with_context(|| format!("Failed to remove {}", link.display()))?;
    } else {
        warn!(link = %link.display(), "launcher points outside the install root, leaving it");
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::placement::{place, write_record};
    use ship_schema::BuildMetadata;
    use tempfile::tempdir;

    fn install(layout: &Layout, staging: &Path, info: &str) {
        fs::create_dir_all(staging.join("bin")).unwrap();
        fs::write(staging.join("bin/tool"), "#!/bin/sh\n").unwrap();
        let meta = BuildMetadata::parse(info).unwrap();
        let name = PackageName::new("foo");
        let placement = place(layout, &name, staging, &meta).unwrap();
        write_record(layout, &name, &meta, &placement).unwrap();
    }

    #[test]
    fn test_removes_directory_and_launcher() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().join("root"), dir.path().join("bin"));
        install(&layout, &dir.path().join("stage"), "[meta]\nMainFile = bin/tool\n");
        assert!(fs::symlink_metadata(layout.launcher("foo")).is_ok());

        let removal = uninstall(&layout, &PackageName::new("foo")).unwrap();

        assert_eq!(removal, Removal::Removed);
        assert!(!layout.package_dir("foo").exists());
        assert!(fs::symlink_metadata(layout.launcher("foo")).is_err());
    }

    #[test]
    fn test_removes_force_dir_target() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().join("root"), dir.path().join("bin"));
        let target = dir.path().join("opt/tool");
        let info = format!(
            "[meta]\nMainFile = bin/tool\nForceDir = yes\nInstallDir = \"{}\"\n",
            target.display()
        );
        install(&layout, &dir.path().join("stage"), &info);
        assert!(target.exists());

        uninstall(&layout, &PackageName::new("foo")).unwrap();
        assert!(!target.exists());
        assert!(!layout.package_dir("foo").exists());
    }

    #[test]
    fn test_force_dir_into_shared_directory_keeps_foreign_files() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().join("root"), dir.path().join("bin"));
        let shared = dir.path().join("share");
        fs::create_dir_all(&shared).unwrap();
        fs::write(shared.join("other"), "not ours").unwrap();
        let info = format!(
            "[meta]\nMainFile = bin\nForceDir = yes\nInstallDir = \"{}\"\n",
            shared.display()
        );
        install(&layout, &dir.path().join("stage"), &info);
        assert!(shared.join("tool").is_file());

        uninstall(&layout, &PackageName::new("foo")).unwrap();

        assert!(!shared.join("tool").exists());
        assert_eq!(fs::read_to_string(shared.join("other")).unwrap(), "not ours");
        assert!(!layout.package_dir("foo").exists());
    }

    #[test]
    fn test_force_dir_created_directory_is_removed() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().join("root"), dir.path().join("bin"));
        let target = dir.path().join("opt/foo");
        let info = format!(
            "[meta]\nMainFile = bin\nForceDir = yes\nInstallDir = \"{}\"\n",
            target.display()
        );
        install(&layout, &dir.path().join("stage"), &info);
        let record = InstallRecord::read(&layout, &PackageName::new("foo")).unwrap().unwrap();
        assert!(record.created_dir);
        assert_eq!(record.placed, vec![target.join("tool")]);

        uninstall(&layout, &PackageName::new("foo")).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn test_foreign_launcher_is_left_alone() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().join("root"), dir.path().join("bin"));
        install(&layout, &dir.path().join("stage"), "[meta]\nMainFile = bin/tool\n");

        // The user repointed the launcher at their own binary.
        let elsewhere = dir.path().join("elsewhere");
        fs::write(&elsewhere, "").unwrap();
        fs::remove_file(layout.launcher("foo")).unwrap();
        std::os::unix::fs::symlink(&elsewhere, layout.launcher("foo")).unwrap();

        let removal = uninstall(&layout, &PackageName::new("foo")).unwrap();
        assert_eq!(removal, Removal::Removed);
        assert_eq!(fs::read_link(layout.launcher("foo")).unwrap(), elsewhere);
    }

    #[test]
    fn test_missing_record_is_not_an_error() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().join("root"), dir.path().join("bin"));
        let removal = uninstall(&layout, &PackageName::new("ghost")).unwrap();
        assert_eq!(removal, Removal::NotInstalled);
    }
}
