//! Per-package install workflow.
//!
//! `install` walks one manifest entry through download, extraction,
//! dependency discovery, build and placement. Each step either hands its
//! product to the next or ends the package with a [`PackageError`]; nothing
//! escapes to the caller's other packages.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context as _, bail};
use ship_schema::packageinfo::PACKAGE_INFO_FILE;
use ship_schema::{BuildMetadata, PackageEntry, PackageName, Version};
use tracing::{debug, info};

use crate::catalog;
use crate::context::Context;
use crate::error::PackageError;
use crate::io::DownloadError;
use crate::io::exec::read_last_lines;
use crate::placement::{self, Placement, remove_path};
use crate::resolver::resolve_on_server;
use crate::store::{Indices, Store};

/// Lines of build output shown when a build script fails.
const LOG_TAIL_LINES: usize = 20;

/// Result of one install attempt.
#[derive(Debug)]
pub enum InstallOutcome {
    Installed,
    /// The package could not be attempted (unknown server, no URL).
    Skipped(PackageError),
    /// The package was attempted and a step failed.
    Failed(PackageError),
}

impl InstallOutcome {
    /// Process-style status: 0 for installed or skipped, 1 for failed.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Installed | Self::Skipped(_) => 0,
            Self::Failed(_) => 1,
        }
    }

    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed)
    }
}

/// Runs the install workflow against a [`Context`].
#[derive(Debug, Clone, Copy)]
pub struct Installer<'a> {
    ctx: &'a Context,
}

impl<'a> Installer<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Install one manifest entry. Discovered dependencies are appended to
    /// the manifest through `store` before the build script runs.
    pub async fn install(
        &self,
        entry: &PackageEntry,
        store: &mut Store,
        indices: &Indices,
    ) -> InstallOutcome {
        let reporter = &self.ctx.reporter;
        let name = &entry.name;
        let version = &entry.version;

        if store.manifest().server(&entry.server).is_none() {
            let err = PackageError::ServerNotConfigured {
                package: name.clone(),
                server: entry.server.clone(),
            };
            reporter.warning(&err.to_string());
            return InstallOutcome::Skipped(err);
        }

        let Some(url) =
            resolve_on_server(name, &entry.server, indices).and_then(|e| e.url.clone())
        else {
            let err = PackageError::PackageUrlNotFound {
                package: name.clone(),
                server: entry.server.clone(),
            };
            reporter.warning(&err.to_string());
            return InstallOutcome::Skipped(err);
        };

        match self.run(entry, &url, store, indices).await {
            Ok(placement) => {
                let detail = match &placement.launcher {
                    Some(link) => format!("installed, launcher {}", link.display()),
                    None => format!("installed to {}", placement.location.display()),
                };
                reporter.done(name, version, &detail);
                InstallOutcome::Installed
            }
            Err(err) => {
                reporter.failed(name, version, &err.to_string());
                InstallOutcome::Failed(err)
            }
        }
    }

    async fn run(
        &self,
        entry: &PackageEntry,
        url: &str,
        store: &mut Store,
        indices: &Indices,
    ) -> Result<Placement, PackageError> {
        let name = &entry.name;
        let version = &entry.version;

        let archive = self.download(name, version, url).await?;
        let package_dir = self.extract(name, version, archive).await?;

        let meta = read_metadata(&package_dir).map_err(|e| PackageError::ExtractFailed {
            package: name.clone(),
            reason: format!("{e:#}"),
        })?;

        self.queue_dependencies(name, &meta, store, indices);
        self.build(name, version, &package_dir, &meta).await?;
        let placement = self.place(name, &package_dir, meta).await?;

        remove_path(&self.ctx.layout.staging_dir(name, version)).ok();
        Ok(placement)
    }

    async fn download(
        &self,
        name: &PackageName,
        version: &Version,
        url: &str,
    ) -> Result<PathBuf, PackageError> {
        let reporter = &self.ctx.reporter;
        let dest = self.ctx.layout.archive_path(name, version);

        let warned = AtomicBool::new(false);
        let progress = |current: u64, total: Option<u64>| {
            if total.is_none() && !warned.swap(true, Ordering::Relaxed) {
                reporter.warning(&format!(
                    "{name}: server did not report a size, downloading without progress"
                ));
            }
            reporter.downloading(name, version, current, total);
        };

        let fetched = match tokio::fs::create_dir_all(self.ctx.layout.downloads()).await {
            Ok(()) => self.ctx.fetcher.download(url, &dest, &progress).await,
            Err(e) => Err(DownloadError::Io(e)),
        };

        match fetched {
            Ok(bytes) => {
                debug!(package = %name, url, bytes, "downloaded");
                Ok(dest)
            }
            Err(source) => Err(PackageError::DownloadFailed {
                package: name.clone(),
                source,
            }),
        }
    }

    async fn extract(
        &self,
        name: &PackageName,
        version: &Version,
        archive: PathBuf,
    ) -> Result<PathBuf, PackageError> {
        let archiver = Arc::clone(&self.ctx.archiver);
        let staging = self.ctx.layout.staging_dir(name, version);

        blocking(move || {
            remove_path(&staging)?;
            archiver.extract(&archive, &staging)?;
            locate_package_dir(&staging)
        })
        .await
        .map_err(|reason| PackageError::ExtractFailed {
            package: name.clone(),
            reason,
        })
    }

    fn queue_dependencies(
        &self,
        name: &PackageName,
        meta: &BuildMetadata,
        store: &mut Store,
        indices: &Indices,
    ) {
        let reporter = &self.ctx.reporter;

        for dep in meta.required_packages() {
            match catalog::add(store, indices, dep) {
                Ok(res) => reporter.info(&format!(
                    "{name}: queued dependency {dep} {} from {}",
                    res.version, res.server
                )),
                Err(PackageError::AlreadyAdded(_)) => {
                    debug!(package = %name, dependency = %dep, "dependency already in manifest");
                }
                Err(e) => reporter.warning(&format!("{name}: cannot queue dependency {dep}: {e}")),
            }
        }
    }

    async fn build(
        &self,
        name: &PackageName,
        version: &Version,
        package_dir: &Path,
        meta: &BuildMetadata,
    ) -> Result<(), PackageError> {
        let reporter = &self.ctx.reporter;
        let executor = Arc::clone(&self.ctx.executor);
        let script = package_dir.join(&meta.build_script);
        let cwd = package_dir.to_path_buf();
        let log = self.ctx.layout.build_log_path(name, version);

        reporter.installing(name, version);
        let log_path = log.clone();
        let code = blocking(move || {
            make_executable(&script)?;
            Ok(executor.run(&script, &cwd, &log_path)?)
        })
        .await
        .map_err(|reason| PackageError::BuildScriptFailed {
            package: name.clone(),
            reason,
        })?;

        if code == 0 {
            info!(package = %name, log = %log.display(), "build script succeeded");
            return Ok(());
        }

        if let Ok(tail) = read_last_lines(&log, LOG_TAIL_LINES) {
            reporter.error(&format!(
                "{name}: last {LOG_TAIL_LINES} lines of build output:\n{tail}\nFull log: {}",
                log.display()
            ));
        }
        Err(PackageError::BuildScriptFailed {
            package: name.clone(),
            reason: format!("exited with code {code}"),
        })
    }

    async fn place(
        &self,
        name: &PackageName,
        package_dir: &Path,
        meta: BuildMetadata,
    ) -> Result<Placement, PackageError> {
        let layout = self.ctx.layout.clone();
        let owned_name = name.clone();
        let package_dir = package_dir.to_path_buf();

        let placement = blocking(move || {
            let placement = placement::place(&layout, &owned_name, &package_dir, &meta)?;
            placement::write_record(&layout, &owned_name, &meta, &placement)?;
            Ok(placement)
        })
        .await
        .map_err(|reason| PackageError::PlacementFailed {
            package: name.clone(),
            reason,
        })?;

        if let Some(main) = &placement.missing_main {
            self.ctx.reporter.warning(&format!(
                "{name}: main file {main} not found in package, installed without a launcher"
            ));
        } else if placement.launcher.is_none() && !placement.force_dir {
            self.ctx
                .reporter
                .warning(&format!("{name}: no main file to link, installed without a launcher"));
        }
        Ok(placement)
    }
}

/// Run blocking filesystem or process work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(e) => Err(e.to_string()),
    }
}

/// The directory holding `packageinfo`: the extraction root, or its only
/// subdirectory when the archive wraps everything in one folder.
fn locate_package_dir(staging: &Path) -> anyhow::Result<PathBuf> {
    if staging.join(PACKAGE_INFO_FILE).is_file() {
        return Ok(staging.to_path_buf());
    }

    let mut dirs = Vec::new();
    for entry in fs::read_dir(staging)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }

    match dirs.as_slice() {
        [only] if only.join(PACKAGE_INFO_FILE).is_file() => Ok(only.clone()),
        _ => bail!("archive has no {PACKAGE_INFO_FILE}"),
    }
}

fn read_metadata(package_dir: &Path) -> anyhow::Result<BuildMetadata> {
    let path = package_dir.join(PACKAGE_INFO_FILE);
    let text = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    BuildMetadata::parse(&text).with_context(|| format!("Invalid {}", path.display()))
}

fn make_executable(script: &Path) -> anyhow::Result<()> {
    let meta = fs::metadata(script)
        .with_context(|| format!("build script {} not found", script.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = meta.permissions();
        perms.set_mode(perms.mode() | 0o755);
        fs::set_permissions(script, perms)?;
    }
    #[cfg(not(unix))]
    let _ = meta;

    Ok(())
}
