//! Domain-specific errors for package and store operations

use std::io;
use std::path::PathBuf;

use ship_schema::{PackageName, SchemaError};
use thiserror::Error;

use crate::io::download::DownloadError;

/// A failure scoped to one package. Never fatal to a sync.
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("{package}: server '{server}' is not configured")]
    ServerNotConfigured { package: PackageName, server: String },

    #[error("package '{0}' was not found on any configured server")]
    PackageNotFound(PackageName),

    #[error("{package}: no download URL on server '{server}'")]
    PackageUrlNotFound { package: PackageName, server: String },

    #[error("{package}: download failed: {source}")]
    DownloadFailed {
        package: PackageName,
        #[source]
        source: DownloadError,
    },

    #[error("{package}: extraction failed: {reason}")]
    ExtractFailed { package: PackageName, reason: String },

    #[error("{package}: build script failed: {reason}")]
    BuildScriptFailed { package: PackageName, reason: String },

    #[error("{package}: placement failed: {reason}")]
    PlacementFailed { package: PackageName, reason: String },

    #[error("package '{0}' is already in the manifest")]
    AlreadyAdded(PackageName),

    #[error("{package}: uninstall failed: {reason}")]
    UninstallFailed { package: PackageName, reason: String },

    #[error(transparent)]
    InvalidName(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PackageError {
    /// The package this error is about, when it names one.
    pub fn package(&self) -> Option<&PackageName> {
        match self {
            Self::ServerNotConfigured { package, .. }
            | Self::PackageUrlNotFound { package, .. }
            | Self::DownloadFailed { package, .. }
            | Self::ExtractFailed { package, .. }
            | Self::BuildScriptFailed { package, .. }
            | Self::PlacementFailed { package, .. }
            | Self::UninstallFailed { package, .. } => Some(package),
            Self::PackageNotFound(package) | Self::AlreadyAdded(package) => Some(package),
            Self::InvalidName(_) | Self::Store(_) => None,
        }
    }
}

/// A failure reading or writing ship's own state. Fatal to the command.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("manifest not found at {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },

    #[error(
        "ship is already running: {command} (PID {pid}, started at unix time {started_at})\n\
         If you're sure no ship process is running, remove the lock file:\n  {}",
        .lock_path.display()
    )]
    Locked {
        command: String,
        pid: u32,
        started_at: u64,
        lock_path: PathBuf,
    },

    #[error(
        "ship is already running (could not read lock metadata)\n\
         If you're sure no ship process is running, remove the lock file:\n  {}",
        .lock_path.display()
    )]
    LockedUnknown { lock_path: PathBuf },

    #[error("failed to acquire lock {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
