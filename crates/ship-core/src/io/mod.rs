//! IO modules - side effects (network, filesystem, processes)
//!
//! Each collaborator is a trait with one production implementation so the
//! pipeline can be driven by fakes in tests.

pub mod download;
pub mod exec;
pub mod extract;
pub mod probe;

pub use download::{DownloadError, Fetcher};
pub use exec::{ExecError, Executor};
pub use extract::{Archiver, ExtractError};
pub use probe::Prober;

#[cfg(feature = "network")]
pub use download::HttpFetcher;
#[cfg(feature = "network")]
pub use probe::HttpProber;
pub use exec::ScriptExecutor;
pub use extract::ArchiveExtractor;
