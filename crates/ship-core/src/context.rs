//! Shared command context.
//!
//! Groups the layout, settings and IO collaborators that every operation
//! needs, to reduce argument fatigue. Tests swap collaborators with the
//! `with_*` builders.

use std::fmt;
use std::sync::Arc;

use crate::config::Settings;
use crate::io::{Archiver, Executor, Fetcher, Prober};
use crate::paths::Layout;
use crate::reporter::Reporter;

#[derive(Clone)]
pub struct Context {
    pub layout: Layout,
    pub settings: Settings,
    pub fetcher: Arc<dyn Fetcher>,
    pub archiver: Arc<dyn Archiver>,
    pub executor: Arc<dyn Executor>,
    pub prober: Arc<dyn Prober>,
    pub reporter: Arc<dyn Reporter>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("layout", &self.layout)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Context with the production HTTP, archive and process collaborators.
    ///
    /// # Errors
    ///
    /// Fails if an HTTP client cannot be built.
    #[cfg(feature = "network")]
    pub fn new(
        layout: Layout,
        settings: Settings,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self, crate::io::DownloadError> {
        use crate::io::{ArchiveExtractor, HttpFetcher, HttpProber, ScriptExecutor};

        let limits = settings.limits;
        Ok(Self {
            fetcher: Arc::new(HttpFetcher::new(limits.download_timeout)?),
            prober: Arc::new(HttpProber::new(limits.probe_timeout)?),
            archiver: Arc::new(ArchiveExtractor),
            executor: Arc::new(ScriptExecutor::new(limits.build_timeout, limits.kill_grace)),
            layout,
            settings,
            reporter,
        })
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }
}
