//! Engine behind the `ship` package manager: resolution, diffing, the
//! install pipeline and the sync loop, over a locked on-disk store.

pub mod catalog;
pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod placement;
pub mod reporter;
pub mod resolver;
pub mod store;
pub mod sync;
pub mod uninstall;
pub mod update;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Settings;
pub use context::Context;
pub use error::{PackageError, StoreError};
pub use paths::Layout;
pub use reporter::{NullReporter, Reporter};
pub use store::Store;

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("ship/", env!("CARGO_PKG_VERSION"));
