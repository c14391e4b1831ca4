use std::path::{Path, PathBuf};

use ship_schema::index::INDEX_FILE;
use ship_schema::packageinfo::PACKAGE_INFO_FILE;

/// Default state root: /etc/ship
pub const DEFAULT_ROOT: &str = "/etc/ship";

/// Default launcher directory: /usr/local/bin
pub const DEFAULT_BIN_DIR: &str = "/usr/local/bin";

/// On-disk layout of one ship installation.
///
/// Everything except launchers lives under `root`; launchers and the default
/// ForceDir target live in `bin_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    bin_dir: PathBuf,
}

impl Layout {
    /// Relative paths are resolved against the current directory, so build
    /// scripts run from their own directory and launcher symlinks stay valid.
    pub fn new(root: impl Into<PathBuf>, bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: absolute(root.into()),
            bin_dir: absolute(bin_dir.into()),
        }
    }

    /// State root: /etc/ship
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Launcher directory: /usr/local/bin
    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    /// Desired-state manifest: <root>/ship.pkg
    pub fn manifest(&self) -> PathBuf {
        self.root.join("ship.pkg")
    }

    /// Advisory lock: <root>/ship.pkg.lock
    pub fn lock_file(&self) -> PathBuf {
        self.root.join("ship.pkg.lock")
    }

    /// Last-synced snapshot: <root>/checkpoint.pkg
    pub fn checkpoint(&self) -> PathBuf {
        self.root.join("checkpoint.pkg")
    }

    /// Cached server indices: <root>/servers
    pub fn index_dir(&self) -> PathBuf {
        self.root.join("servers")
    }

    /// Cached index of one server: <root>/servers/<server>.pkg
    pub fn index_file(&self, server: &str) -> PathBuf {
        self.index_dir().join(format!("{server}.pkg"))
    }

    /// Download and staging area: <root>/downloads
    pub fn downloads(&self) -> PathBuf {
        self.root.join("downloads")
    }

    /// Downloaded archive: <root>/downloads/<package>-<version>.zip
    pub fn archive_path(&self, package: &str, version: &str) -> PathBuf {
        self.downloads().join(format!("{package}-{version}.zip"))
    }

    /// Extraction target: <root>/downloads/<package>-<version>
    pub fn staging_dir(&self, package: &str, version: &str) -> PathBuf {
        self.downloads().join(format!("{package}-{version}"))
    }

    /// Shared install root: <root>/packages
    pub fn install_root(&self) -> PathBuf {
        self.root.join("packages")
    }

    /// Installed package directory: <root>/packages/<package>
    pub fn package_dir(&self, package: &str) -> PathBuf {
        self.install_root().join(package)
    }

    /// Installed package record: <root>/packages/<package>/packageinfo
    pub fn record_path(&self, package: &str) -> PathBuf {
        self.package_dir(package).join(PACKAGE_INFO_FILE)
    }

    /// Launcher symlink and default ForceDir target: <bin_dir>/<package>
    pub fn launcher(&self, package: &str) -> PathBuf {
        self.bin_dir.join(package)
    }

    /// Build logs: <root>/logs
    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Generate a build log path for a package
    pub fn build_log_path(&self, package: &str, version: &str) -> PathBuf {
        let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        self.log_dir()
            .join(format!("build-{package}-{version}-{timestamp}.log"))
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT, DEFAULT_BIN_DIR)
    }
}

/// Join a server base URL and its index file name.
pub fn index_url(base: &str) -> String {
    format!("{}/{INDEX_FILE}", base.trim_end_matches('/'))
}

/// Falls back to `path` as given if the current directory is unavailable.
fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = Layout::new("/r", "/b");
        assert_eq!(layout.manifest(), PathBuf::from("/r/ship.pkg"));
        assert_eq!(layout.index_file("official"), PathBuf::from("/r/servers/official.pkg"));
        assert_eq!(
            layout.archive_path("foo", "2"),
            PathBuf::from("/r/downloads/foo-2.zip")
        );
        assert_eq!(layout.record_path("foo"), PathBuf::from("/r/packages/foo/packageinfo"));
        assert_eq!(layout.launcher("foo"), PathBuf::from("/b/foo"));
    }

    #[test]
    fn test_relative_paths_are_made_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let layout = Layout::new("state", "./bin");
        assert_eq!(layout.root(), cwd.join("state"));
        assert_eq!(layout.bin_dir(), cwd.join("bin"));
        assert!(layout.launcher("foo").is_absolute());
        assert!(layout.package_dir("foo").is_absolute());
    }

    #[test]
    fn test_build_log_path_is_under_log_dir() {
        let layout = Layout::new("/r", "/b");
        let log = layout.build_log_path("foo", "2");
        assert!(log.starts_with("/r/logs"));
        assert!(log.file_name().unwrap().to_string_lossy().starts_with("build-foo-2-"));
    }

    #[test]
    fn test_index_url() {
        assert_eq!(index_url("http://x"), "http://x/packages.pkg");
        assert_eq!(index_url("http://x/"), "http://x/packages.pkg");
    }
}
