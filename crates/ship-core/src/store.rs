//! Locked access to ship's on-disk state.
//!
//! A [`Store`] holds an exclusive advisory lock on `<root>/ship.pkg.lock` for
//! as long as it lives, so two ship processes never interleave manifest or
//! checkpoint writes. Every file is written to a sibling temp file first and
//! renamed into place.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use ship_schema::{Manifest, PackageIndex};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::paths::Layout;
use crate::reporter::Reporter;

/// Cached indices keyed by server name.
pub type Indices = HashMap<String, PackageIndex>;

/// Contents of the lock file, for diagnosing contention.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
    pub pid: u32,
    pub started_at_unix: u64,
    pub command: String,
}

/// Exclusive handle on a ship root.
#[derive(Debug)]
pub struct Store {
    layout: Layout,
    manifest: Manifest,
    _lock: File,
}

impl Store {
    /// Lock the root and load the manifest.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Locked`] / [`StoreError::LockedUnknown`] if another
    ///   process holds the lock.
    /// - [`StoreError::ManifestMissing`], [`StoreError::Read`] or
    ///   [`StoreError::Corrupt`] if the manifest cannot be loaded.
    pub fn open(layout: &Layout, command: &str) -> Result<Self, StoreError> {
        let lock = acquire_lock(layout, command)?;
        let manifest = read_manifest(&layout.manifest())?;
        debug!(
            root = %layout.root().display(),
            packages = manifest.packages().len(),
            "store opened"
        );
        Ok(Self {
            layout: layout.clone(),
            manifest,
            _lock: lock,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The manifest as last loaded or saved.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Re-read the manifest from disk.
    ///
    /// # Errors
    ///
    /// Same as the manifest part of [`Store::open`].
    pub fn reload(&mut self) -> Result<&Manifest, StoreError> {
        self.manifest = read_manifest(&self.layout.manifest())?;
        Ok(&self.manifest)
    }

    /// Replace the manifest on disk and in memory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the file cannot be written.
    pub fn save_manifest(&mut self, manifest: Manifest) -> Result<(), StoreError> {
        write_atomic(&self.layout.manifest(), manifest.to_string().as_bytes())?;
        self.manifest = manifest;
        Ok(())
    }

    /// Load the checkpoint; a missing file is an empty checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] or [`StoreError::Corrupt`].
    pub fn load_checkpoint(&self) -> Result<Manifest, StoreError> {
        let path = self.layout.checkpoint();
        match read_to_string(&path)? {
            Some(text) => Manifest::parse(&text).map_err(|source| StoreError::Corrupt { path, source }),
            None => Ok(Manifest::new()),
        }
    }

    /// Persist a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the file cannot be written.
    pub fn save_checkpoint(&self, checkpoint: &Manifest) -> Result<(), StoreError> {
        write_atomic(&self.layout.checkpoint(), checkpoint.to_string().as_bytes())
    }

    /// Load the cached index of every configured server.
    ///
    /// Servers without a cache are left out. An unreadable cache is reported
    /// and treated the same way, so one bad file never blocks a sync.
    /// Rejected index entries are reported once here.
    pub fn load_indices(&self, reporter: &dyn Reporter) -> Indices {
        let mut indices = Indices::new();

        for server in self.manifest.servers() {
            let path = self.layout.index_file(&server.name);
            let text = match read_to_string(&path) {
                Ok(Some(text)) => text,
                Ok(None) => {
                    debug!(server = %server.name, "no cached index");
                    continue;
                }
                Err(e) => {
                    reporter.warning(&e.to_string());
                    continue;
                }
            };

            match PackageIndex::parse(&text) {
                Ok(index) => {
                    for key in index.rejected() {
                        reporter.warning(&format!(
                            "{}: skipping index entry [{key}] (missing Version or duplicate)",
                            server.name
                        ));
                    }
                    indices.insert(server.name.clone(), index);
                }
                Err(e) => reporter.warning(&format!(
                    "ignoring corrupt index {}: {e}",
                    path.display()
                )),
            }
        }

        indices
    }

    /// Replace a server's cached index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the file cannot be written.
    pub fn save_index(&self, server: &str, text: &str) -> Result<(), StoreError> {
        write_atomic(&self.layout.index_file(server), text.as_bytes())
    }
}

fn read_manifest(path: &Path) -> Result<Manifest, StoreError> {
    let text = read_to_string(path)?.ok_or_else(|| StoreError::ManifestMissing(path.to_path_buf()))?;
    Manifest::parse(&text).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a file, mapping "not found" to `None`.
fn read_to_string(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write to `<path>.tmp` then rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).map_err(write_err)?;
    fs::rename(&tmp, path).map_err(|e| {
        fs::remove_file(&tmp).ok();
        write_err(e)
    })
}

fn acquire_lock(layout: &Layout, command: &str) -> Result<File, StoreError> {
    let path = layout.lock_file();
    let lock_err = |source| StoreError::Lock {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(layout.root()).map_err(lock_err)?;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(lock_err)?;

    if let Err(e) = fs2::FileExt::try_lock_exclusive(&file) {
        if e.kind() == io::ErrorKind::WouldBlock
            || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
        {
            return Err(contention_error(&path));
        }
        return Err(lock_err(e));
    }

    write_lock_metadata(&file, command).map_err(lock_err)?;
    Ok(file)
}

fn write_lock_metadata(file: &File, command: &str) -> io::Result<()> {
    let metadata = LockMetadata {
        pid: std::process::id(),
        started_at_unix: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
        command: command.to_string(),
    };

    file.set_len(0)?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &metadata).map_err(io::Error::other)?;
    writer.flush()
}

fn contention_error(lock_path: &Path) -> StoreError {
    let mut contents = String::new();
    if let Ok(mut file) = File::open(lock_path)
        && file.read_to_string(&mut contents).is_ok()
        && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents)
    {
        return StoreError::Locked {
            command: metadata.command,
            pid: metadata.pid,
            started_at: metadata.started_at_unix,
            lock_path: lock_path.to_path_buf(),
        };
    }

    warn!(path = %lock_path.display(), "lock held but metadata unreadable");
    StoreError::LockedUnknown {
        lock_path: lock_path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;
    use ship_schema::PackageEntry;
    use tempfile::tempdir;

    fn layout(dir: &Path) -> Layout {
        Layout::new(dir.join("root"), dir.join("bin"))
    }

    fn seed(layout: &Layout, manifest: &str) {
        fs::create_dir_all(layout.root()).unwrap();
        fs::write(layout.manifest(), manifest).unwrap();
    }

    #[test]
    fn test_missing_manifest_is_fatal() {
        let dir = tempdir().unwrap();
        let err = Store::open(&layout(dir.path()), "test").unwrap_err();
        assert!(matches!(err, StoreError::ManifestMissing(_)));
    }

    #[test]
    fn test_corrupt_manifest_is_fatal() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        seed(&layout, "[Package.foo]\nServer = x\n");
        let err = Store::open(&layout, "test").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_second_writer_is_locked_out() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        seed(&layout, "[Servers]\nofficial = http://x\n");

        let _first = Store::open(&layout, "sync").unwrap();
        match Store::open(&layout, "add").unwrap_err() {
            StoreError::Locked { command, pid, .. } => {
                assert_eq!(command, "sync");
                assert_eq!(pid, std::process::id());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        seed(&layout, "");

        drop(Store::open(&layout, "sync").unwrap());
        assert!(Store::open(&layout, "sync").is_ok());
    }

    #[test]
    fn test_checkpoint_defaults_to_empty_and_round_trips() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        seed(&layout, "[Servers]\nofficial = http://x\n");
        let store = Store::open(&layout, "sync").unwrap();

        assert!(store.load_checkpoint().unwrap().packages().is_empty());

        let checkpoint = store.manifest().with_packages(vec![PackageEntry::new(
            "foo".into(),
            "2".into(),
            "official",
        )]);
        store.save_checkpoint(&checkpoint).unwrap();
        assert_eq!(store.load_checkpoint().unwrap(), checkpoint);
        assert!(!layout.checkpoint().with_extension("pkg.tmp").exists());
    }

    #[test]
    fn test_save_and_reload_manifest() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        seed(&layout, "[Servers]\nofficial = http://x\n");
        let mut store = Store::open(&layout, "add").unwrap();

        let mut manifest = store.manifest().clone();
        manifest
            .add_package(PackageEntry::new("foo".into(), "2".into(), "official"))
            .unwrap();
        store.save_manifest(manifest).unwrap();

        fs::write(
            layout.manifest(),
            "[Servers]\nofficial = http://x\n[Package.bar]\nVersion=1\nServer=official\n",
        )
        .unwrap();
        let reloaded = store.reload().unwrap();
        assert!(reloaded.contains_package("bar"));
        assert!(!reloaded.contains_package("foo"));
    }

    #[test]
    fn test_load_indices_skips_missing_and_corrupt() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        seed(
            &layout,
            "[Servers]\nofficial = http://x\nmirror = http://y\nempty = http://z\n",
        );
        let store = Store::open(&layout, "sync").unwrap();
        store.save_index("official", "[foo.1]\nVersion = 1\n").unwrap();
        store.save_index("mirror", "garbage line\n").unwrap();

        let indices = store.load_indices(&NullReporter);
        assert_eq!(indices.len(), 1);
        assert!(indices["official"].latest("foo").is_some());
    }
}
