//! Converge the system to the manifest.
//!
//! A sync is a bounded loop of passes. Each pass reloads the manifest (so
//! dependencies queued by the previous pass are seen), diffs it against the
//! working checkpoint, removes and installs what changed, and persists the
//! checkpoint. A package name is attempted at most once per sync, which
//! together with the pass limit guarantees termination even when
//! dependencies form a cycle.

use std::collections::HashSet;
use std::time::Instant;

use ship_schema::{PackageEntry, PackageName};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::diff::diff;
use crate::error::{PackageError, StoreError};
use crate::pipeline::{InstallOutcome, Installer, blocking};
use crate::store::Store;
use crate::uninstall::{Removal, uninstall};

/// What a sync did.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub installed: Vec<PackageName>,
    pub skipped: Vec<PackageError>,
    pub failed: Vec<PackageError>,
    pub removed: Vec<PackageName>,
    pub passes: usize,
    /// The first pass found nothing to do.
    pub already_in_sync: bool,
}

impl SyncReport {
    /// 1 if any install or removal failed, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.failed.is_empty())
    }
}

pub struct SyncDriver<'a> {
    ctx: &'a Context,
}

impl<'a> SyncDriver<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Run passes until the manifest and checkpoint agree, every pending
    /// name has been attempted, or the pass limit is reached.
    ///
    /// # Errors
    ///
    /// Only store failures are returned: the manifest cannot be reloaded or
    /// the checkpoint cannot be read or written. Package failures are
    /// collected in the report.
    pub async fn run(&self, store: &mut Store) -> Result<SyncReport, StoreError> {
        let reporter = &self.ctx.reporter;
        let max_passes = self.ctx.settings.limits.max_passes.max(1);
        let start = Instant::now();

        let indices = store.load_indices(&**reporter);
        let mut settled: Vec<PackageEntry> = store.load_checkpoint()?.packages().to_vec();
        let mut attempted_install: HashSet<PackageName> = HashSet::new();
        let mut attempted_removal: HashSet<PackageName> = HashSet::new();
        let mut report = SyncReport::default();

        loop {
            let manifest = store.reload()?.clone();
            let working = manifest.with_packages(settled.iter().cloned());
            let mut pending = diff(&manifest, &working);
            pending.install.retain(|e| !attempted_install.contains(&e.name));
            pending.uninstall.retain(|e| !attempted_removal.contains(&e.name));

            if pending.is_empty() {
                if report.passes == 0 {
                    report.already_in_sync = true;
                    reporter.success("Already in sync");
                }
                break;
            }

            if report.passes == max_passes {
                warn!(max_passes, "sync pass limit reached");
                reporter.warning(&format!(
                    "Stopped after {max_passes} passes with {} package(s) still pending",
                    pending.install.len() + pending.uninstall.len()
                ));
                break;
            }
            report.passes += 1;
            debug!(
                pass = report.passes,
                install = pending.install.len(),
                uninstall = pending.uninstall.len(),
                "sync pass"
            );

            if !pending.uninstall.is_empty() {
                reporter.section("Removing");
            }
            for entry in pending.uninstall {
                attempted_removal.insert(entry.name.clone());
                match self.remove(&entry).await {
                    Ok(()) => {
                        settled.retain(|e| e.name != entry.name);
                        report.removed.push(entry.name);
                    }
                    Err(err) => report.failed.push(err),
                }
            }

            if !pending.install.is_empty() {
                reporter.section("Installing");
            }
            for entry in pending.install {
                attempted_install.insert(entry.name.clone());
                match Installer::new(self.ctx).install(&entry, store, &indices).await {
                    InstallOutcome::Installed => {
                        report.installed.push(entry.name.clone());
                        settled.push(entry);
                    }
                    InstallOutcome::Skipped(err) => report.skipped.push(err),
                    InstallOutcome::Failed(err) => report.failed.push(err),
                }
            }

            store.save_checkpoint(&store.manifest().with_packages(settled.iter().cloned()))?;
        }

        // Also covers the already-in-sync case, where no pass wrote one.
        store.save_checkpoint(&store.manifest().with_packages(settled))?;

        let changed = report.installed.len() + report.removed.len();
        info!(
            installed = report.installed.len(),
            removed = report.removed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            passes = report.passes,
            "sync finished"
        );
        if changed > 0 {
            reporter.summary(changed, "synced", start.elapsed().as_secs_f64());
        }
        Ok(report)
    }

    async fn remove(&self, entry: &PackageEntry) -> Result<(), PackageError> {
        let reporter = &self.ctx.reporter;
        let layout = self.ctx.layout.clone();
        let name = entry.name.clone();

        reporter.removing(&entry.name, &entry.version);
        let result = blocking(move || uninstall(&layout, &name)).await;

        match result {
            Ok(Removal::Removed) => {
                reporter.done(&entry.name, &entry.version, "removed");
                Ok(())
            }
            Ok(Removal::NotInstalled) => {
                reporter.info(&format!("{}: nothing installed, dropping it", entry.name));
                Ok(())
            }
            Err(reason) => {
                reporter.failed(&entry.name, &entry.version, &reason);
                Err(PackageError::UninstallFailed {
                    package: entry.name.clone(),
                    reason,
                })
            }
        }
    }
}
