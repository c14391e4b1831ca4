//! Sync command

use anyhow::Result;
use ship_core::Layout;
use ship_core::Reporter;
use ship_core::sync::SyncDriver;

/// Converge the system to the manifest.
pub async fn sync(layout: Layout) -> Result<u8> {
    let (mut store, ctx) = super::open(layout, "sync")?;
    let report = SyncDriver::new(&ctx).run(&mut store).await?;

    let output = &ctx.reporter;
    if !report.skipped.is_empty() {
        output.warning(&format!("{} package(s) skipped", report.skipped.len()));
    }
    if !report.failed.is_empty() {
        output.error(&format!(
            "{} package(s) failed and will be retried by the next sync",
            report.failed.len()
        ));
    }
    Ok(u8::try_from(report.exit_code()).unwrap_or(1))
}
