//! Add command

use anyhow::Result;
use ship_core::catalog;
use ship_core::{Reporter, Settings, Store};
use ship_core::{Layout, PackageError};
use ship_schema::PackageName;

use crate::ui::ConsoleReporter;

/// Resolve `name` against the cached indices and append it to the manifest.
pub fn add(layout: Layout, name: &str) -> Result<u8> {
    let mut store = Store::open(&layout, "add")?;
    let output = ConsoleReporter::new(Settings::from_manifest(store.manifest()).style);

    let name = match PackageName::parse(name) {
        Ok(name) => name,
        Err(e) => {
            output.error(&e.to_string());
            return Ok(1);
        }
    };

    let indices = store.load_indices(&output);
    match catalog::add(&mut store, &indices, &name) {
        Ok(res) => {
            output.success(&format!("Added {name} {} from {}", res.version, res.server));
            output.info("Run 'ship sync' to install it");
            Ok(0)
        }
        Err(PackageError::Store(e)) => Err(e.into()),
        Err(e @ PackageError::PackageNotFound(_)) => {
            output.error(&e.to_string());
            if indices.is_empty() {
                output.info("No server index is cached yet, run 'ship update' first");
            }
            Ok(1)
        }
        Err(e) => {
            output.error(&e.to_string());
            Ok(1)
        }
    }
}
