//! Fake collaborators shared by the pipeline, sync and update tests.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ship_schema::packageinfo::{DEFAULT_BUILD_SCRIPT, PACKAGE_INFO_FILE};
use ship_schema::{PackageName, Version};
use zip::write::SimpleFileOptions;

use crate::config::Settings;
use crate::context::Context;
use crate::io::{ArchiveExtractor, DownloadError, ExecError, Executor, Fetcher, Prober};
use crate::io::download::Progress;
use crate::paths::Layout;
use crate::reporter::Reporter;
use crate::store::Store;

/// Files of a package archive, `packageinfo` included.
pub(crate) type ArchiveFiles = Vec<(String, String)>;

/// Archive holding `packageinfo`, `files`, and a no-op `install.sh` unless
/// `files` brings its own.
pub(crate) fn archive_with(info: &str, files: &[(&str, &str)]) -> ArchiveFiles {
    let mut all = vec![(PACKAGE_INFO_FILE.to_string(), info.to_string())];
    all.extend(files.iter().map(|(n, b)| ((*n).to_string(), (*b).to_string())));
    if !all.iter().any(|(n, _)| n == DEFAULT_BUILD_SCRIPT) {
        all.push((DEFAULT_BUILD_SCRIPT.to_string(), "#!/bin/sh\n".to_string()));
    }
    all
}

/// Write `manifest` and the `official` server index under the context's
/// root, then open the store.
pub(crate) fn open_store(ctx: &Context, manifest: &str, official_index: &str) -> Store {
    fs::create_dir_all(ctx.layout.root()).unwrap();
    fs::create_dir_all(ctx.layout.index_dir()).unwrap();
    fs::write(ctx.layout.manifest(), manifest).unwrap();
    let store = Store::open(&ctx.layout, "test").unwrap();
    store.save_index("official", official_index).unwrap();
    store
}

/// Serves zip archives built in memory and records every URL asked for.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    archives: Mutex<HashMap<String, ArchiveFiles>>,
    requests: Mutex<Vec<String>>,
    /// Report progress without a total, like a server sending no
    /// Content-Length.
    unknown_size: AtomicBool,
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Progress<'_>,
    ) -> Result<u64, DownloadError> {
        self.requests.lock().unwrap().push(url.to_string());
        let files = self.archives.lock().unwrap().get(url).cloned();
        let Some(files) = files else {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: 404,
            });
        };

        let mut zip = zip::ZipWriter::new(File::create(dest)?);
        for (name, body) in &files {
            zip.start_file(name.as_str(), SimpleFileOptions::default().unix_permissions(0o644))
                .unwrap();
            zip.write_all(body.as_bytes())?;
        }
        zip.finish().unwrap();

        let len = fs::metadata(dest)?.len();
        if self.unknown_size.load(Ordering::Relaxed) {
            progress(0, None);
            progress(len / 2, None);
            progress(len, None);
        } else {
            progress(0, Some(len));
            progress(len, Some(len));
        }
        Ok(len)
    }
}

/// Exits 0 unless a package was told to fail. The package is recognised by
/// its staging directory name, `<package>-<version>`.
#[derive(Default)]
pub(crate) struct FakeExecutor {
    exit_codes: Mutex<HashMap<String, i32>>,
}

impl Executor for FakeExecutor {
    fn run(&self, _script: &Path, cwd: &Path, log: &Path) -> Result<i32, ExecError> {
        if let Some(parent) = log.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(log, "building\n")?;

        let codes = self.exit_codes.lock().unwrap();
        let code = cwd
            .ancestors()
            .filter_map(|p| p.file_name()?.to_str())
            .find_map(|dir| {
                codes
                    .iter()
                    .find(|(pkg, _)| dir.starts_with(&format!("{pkg}-")))
                    .map(|(_, code)| *code)
            })
            .unwrap_or(0);
        Ok(code)
    }
}

/// Every server is reachable.
pub(crate) struct FakeProber;

#[async_trait]
impl Prober for FakeProber {
    async fn ping(&self, _url: &str) -> Option<Duration> {
        Some(Duration::from_millis(1))
    }
}

/// Keeps warnings and errors for assertions.
#[derive(Default)]
pub(crate) struct RecordingReporter {
    warnings: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl Reporter for RecordingReporter {
    fn section(&self, _: &str) {}
    fn downloading(&self, _: &PackageName, _: &Version, _: u64, _: Option<u64>) {}
    fn installing(&self, _: &PackageName, _: &Version) {}
    fn removing(&self, _: &PackageName, _: &Version) {}
    fn done(&self, _: &PackageName, _: &Version, _: &str) {}
    fn failed(&self, name: &PackageName, _: &Version, reason: &str) {
        self.errors.lock().unwrap().push(format!("{name}: {reason}"));
    }
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, msg: &str) {
        self.warnings.lock().unwrap().push(msg.to_string());
    }
    fn error(&self, msg: &str) {
        self.errors.lock().unwrap().push(msg.to_string());
    }
    fn summary(&self, _: usize, _: &str, _: f64) {}
}

/// One set of fakes, shared by every context built from it.
pub(crate) struct Fakes {
    fetcher: Arc<FakeFetcher>,
    executor: Arc<FakeExecutor>,
    reporter: Arc<RecordingReporter>,
}

impl Fakes {
    pub(crate) fn new() -> Self {
        Self {
            fetcher: Arc::default(),
            executor: Arc::default(),
            reporter: Arc::default(),
        }
    }

    pub(crate) fn serve(&self, url: &str, files: ArchiveFiles) {
        self.fetcher
            .archives
            .lock()
            .unwrap()
            .insert(url.to_string(), files);
    }

    pub(crate) fn hide_download_size(&self) {
        self.fetcher.unknown_size.store(true, Ordering::Relaxed);
    }

    pub(crate) fn fail_build(&self, package: &str, code: i32) {
        self.executor
            .exit_codes
            .lock()
            .unwrap()
            .insert(package.to_string(), code);
    }

    pub(crate) fn downloads(&self) -> Vec<String> {
        self.fetcher.requests.lock().unwrap().clone()
    }

    pub(crate) fn warnings(&self) -> Vec<String> {
        self.reporter.warnings.lock().unwrap().clone()
    }

    /// Context rooted at `<dir>/root` with launchers in `<dir>/bin`. Archives
    /// are extracted for real.
    pub(crate) fn context(&self, dir: &Path) -> Context {
        Context {
            layout: Layout::new(dir.join("root"), dir.join("bin")),
            settings: Settings::default(),
            fetcher: self.fetcher.clone(),
            archiver: Arc::new(ArchiveExtractor),
            executor: self.executor.clone(),
            prober: Arc::new(FakeProber),
            reporter: self.reporter.clone(),
        }
    }
}
