//! Refresh cached server indices.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use ship_schema::{PackageIndex, ServerEntry};
use tracing::{debug, info};

use crate::context::Context;
use crate::error::StoreError;
use crate::paths::index_url;
use crate::store::{Store, write_atomic};

/// Probes in flight at once.
const PROBE_CONCURRENCY: usize = 8;

/// A server whose index was downloaded and cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refreshed {
    pub server: String,
    pub latency: Duration,
    pub packages: usize,
}

/// Outcome of `update`, per server.
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub refreshed: Vec<Refreshed>,
    /// Servers that did not answer the probe. Their caches were kept.
    pub unreachable: Vec<String>,
    /// Servers that answered but whose index could not be fetched or parsed.
    pub failed: Vec<(String, String)>,
}

impl UpdateReport {
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.failed.is_empty())
    }
}

/// Probe every configured server, then download and cache the index of each
/// reachable one. A server's cache is only replaced by an index that parses.
///
/// # Errors
///
/// Only a failure to write a validated index into the cache is returned.
pub async fn update(ctx: &Context, store: &Store) -> Result<UpdateReport, StoreError> {
    let reporter = &ctx.reporter;
    let layout = store.layout();
    let servers = store.manifest().servers();
    let mut report = UpdateReport::default();

    if servers.is_empty() {
        reporter.warning("No servers configured");
        return Ok(report);
    }

    reporter.section("Probing servers");
    let probes: Vec<(&ServerEntry, Option<Duration>)> = stream::iter(servers)
        .map(|server| async move { (server, ctx.prober.ping(&server.url).await) })
        .buffered(PROBE_CONCURRENCY)
        .collect()
        .await;

    let index_dir = layout.index_dir();
    if let Err(source) = tokio::fs::create_dir_all(&index_dir).await {
        return Err(StoreError::Write {
            path: index_dir,
            source,
        });
    }

    for (server, latency) in probes {
        let Some(latency) = latency else {
            reporter.info(&format!("{}: unreachable, keeping cached index", server.name));
            report.unreachable.push(server.name.clone());
            continue;
        };
        debug!(server = %server.name, latency_ms = latency.as_millis(), "reachable");

        let dest = layout.index_file(&server.name);
        match fetch_index(ctx, server, &dest).await {
            Ok((text, index)) => {
                write_atomic(&dest, text.as_bytes())?;
                let packages = index.len();
                reporter.success(&format!(
                    "{}: {packages} entries ({} ms)",
                    server.name,
                    latency.as_millis()
                ));
                info!(server = %server.name, packages, "index refreshed");
                report.refreshed.push(Refreshed {
                    server: server.name.clone(),
                    latency,
                    packages,
                });
            }
            Err(reason) => {
                reporter.warning(&format!("{}: {reason}, keeping cached index", server.name));
                report.failed.push((server.name.clone(), reason));
            }
        }
    }

    Ok(report)
}

/// Download a server's index next to its cache and validate it.
async fn fetch_index(
    ctx: &Context,
    server: &ServerEntry,
    dest: &Path,
) -> Result<(String, PackageIndex), String> {
    let partial = dest.with_extension("download");
    let url = index_url(&server.url);

    let fetched = ctx.fetcher.download(&url, &partial, &|_, _| {}).await;
    let text = match fetched {
        Ok(_) => tokio::fs::read_to_string(&partial).await.map_err(|e| e.to_string()),
        Err(e) => Err(format!("cannot download {url}: {e}")),
    };
    tokio::fs::remove_file(&partial).await.ok();

    let text = text?;
    let index = PackageIndex::parse(&text).map_err(|e| format!("invalid index: {e}"))?;
    for key in index.rejected() {
        ctx.reporter.warning(&format!(
            "{}: index entry [{key}] has no Version and will be ignored",
            server.name
        ));
    }
    Ok((text, index))
}
