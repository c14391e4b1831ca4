//! ship - a declarative package manager
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
//!
//! Keeps a machine in line with a manifest of desired packages.
//!
//! # Commands
//!
//! - `ship update` probes every configured server and caches its index.
//! - `ship add <name>` resolves a package against the cached indices and
//!   appends it to the manifest.
//! - `ship sync` installs what the manifest gained and removes what it lost
//!   since the last sync, including dependencies discovered on the way.
//!
//! # Directory Layout
//!
//! ```text
//! /etc/ship/
//! ├── ship.pkg         # Manifest: servers, packages, customization
//! ├── ship.pkg.lock    # Held while a command runs
//! ├── checkpoint.pkg   # Manifest as of the last sync
//! ├── servers/         # Cached index per server
//! ├── downloads/       # Archives and extraction staging
//! ├── packages/        # Installed packages
//! └── logs/            # Build script output
//! ```

pub mod cmd;
pub mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ship_core::paths::{DEFAULT_BIN_DIR, DEFAULT_ROOT, Layout};

pub use ship_core::USER_AGENT;

#[derive(Debug, Parser)]
#[command(name = "ship")]
#[command(author, version, about = "ship - a declarative package manager")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Directory holding the manifest, caches and installed packages
    #[arg(long, global = true, env = "SHIP_ROOT", default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Directory receiving package launchers
    #[arg(long, global = true, env = "SHIP_BIN_DIR", default_value = DEFAULT_BIN_DIR)]
    pub bin_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn layout(&self) -> Layout {
        Layout::new(&self.root, &self.bin_dir)
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Refresh the package index of every reachable server
    Update,
    /// Add a package to the manifest
    Add {
        /// Package name
        name: String,
    },
    /// Install and remove packages until the system matches the manifest
    Sync,
}
