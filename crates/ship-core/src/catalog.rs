//! Adding packages to the manifest.

use ship_schema::{PackageEntry, PackageName};
use tracing::info;

use crate::error::PackageError;
use crate::resolver::{Resolution, resolve};
use crate::store::{Indices, Store};

/// Resolve `name` and append `Package.<name>` to the manifest.
///
/// # Errors
///
/// - [`PackageError::AlreadyAdded`] if the manifest already has the package;
///   nothing is written.
/// - [`PackageError::PackageNotFound`] if no cached index catalogs it.
/// - [`PackageError::Store`] if the manifest cannot be saved.
pub fn add(
    store: &mut Store,
    indices: &Indices,
    name: &PackageName,
) -> Result<Resolution, PackageError> {
    let manifest = store.manifest();
    if manifest.contains_package(name) {
        return Err(PackageError::AlreadyAdded(name.clone()));
    }

    let resolution = resolve(name, manifest.servers(), indices)?;

    let mut updated = manifest.clone();
    updated
        .add_package(PackageEntry::new(
            name.clone(),
            resolution.version.clone(),
            resolution.server.as_str(),
        ))
        .map_err(|_| PackageError::AlreadyAdded(name.clone()))?;
    store.save_manifest(updated)?;

    info!(package = %name, version = %resolution.version, server = %resolution.server, "added");
    Ok(resolution)
}
