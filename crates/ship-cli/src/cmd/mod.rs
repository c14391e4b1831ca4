//! Command handlers. Each returns the process exit status.

pub mod add;
pub mod sync;
pub mod update;

use std::sync::Arc;

use anyhow::Result;
use ship_core::{Context, Layout, Settings, Store};

use crate::ui::ConsoleReporter;

/// Lock the root, read settings from the manifest and build the context
/// for a network command.
fn open(layout: Layout, command: &str) -> Result<(Store, Context)> {
    let store = Store::open(&layout, command)?;
    let settings = Settings::from_manifest(store.manifest());
    let reporter = Arc::new(ConsoleReporter::new(settings.style.clone()));
    let ctx = Context::new(layout, settings, reporter)?;
    Ok((store, ctx))
}
