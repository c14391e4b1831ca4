//! Desired state versus last synced state.

use ship_schema::{Manifest, PackageEntry};

/// Packages to install and to remove, in manifest and checkpoint order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub install: Vec<PackageEntry>,
    pub uninstall: Vec<PackageEntry>,
}

impl Diff {
    /// Nothing to do: the system is in sync.
    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.uninstall.is_empty()
    }
}

/// Compare package sets by name. Non-package sections are never diffed and a
/// changed version alone does not trigger a reinstall.
pub fn diff(desired: &Manifest, checkpoint: &Manifest) -> Diff {
    let install = desired
        .packages()
        .iter()
        .filter(|p| !checkpoint.contains_package(&p.name))
        .cloned()
        .collect();

    let uninstall = checkpoint
        .packages()
        .iter()
        .filter(|p| !desired.contains_package(&p.name))
        .cloned()
        .collect();

    Diff { install, uninstall }
}
