//! Update command

use anyhow::Result;
use ship_core::Layout;
use ship_core::Reporter;
use ship_core::update::update as refresh;

/// Refresh the cached index of every reachable server.
pub async fn update(layout: Layout) -> Result<u8> {
    let (store, ctx) = super::open(layout, "update")?;
    let report = refresh(&ctx, &store).await?;

    let output = &ctx.reporter;
    if !report.unreachable.is_empty() {
        output.info(&format!("Unreachable: {}", report.unreachable.join(", ")));
    }
    output.success(&format!(
        "{} of {} server index(es) refreshed",
        report.refreshed.len(),
        store.manifest().servers().len()
    ));
    Ok(u8::try_from(report.exit_code()).unwrap_or(1))
}
