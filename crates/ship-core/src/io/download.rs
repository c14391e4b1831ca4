//! Streaming downloads with progress reporting.
//!
//! Archives and indices are fetched with a plain GET and written to disk
//! chunk by chunk. A failed transfer never leaves a partial file behind.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[cfg(feature = "network")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
}

/// Progress callback: `(bytes so far, total if known)`.
pub type Progress<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// Fetches a URL into a local file.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` to `dest`, returning the number of bytes written.
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Progress<'_>,
    ) -> Result<u64, DownloadError>;
}

#[cfg(feature = "network")]
pub use http::HttpFetcher;

#[cfg(feature = "network")]
mod http {
    use std::path::Path;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::StreamExt;
    use reqwest::Client;
    use tokio::fs::File;
    use tokio::io::AsyncWriteExt;
    use tracing::debug;

    use super::{DownloadError, Fetcher, Progress};

    /// [`Fetcher`] backed by a shared reqwest client.
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        client: Client,
    }

    impl HttpFetcher {
        /// Build a client with the given whole-request timeout.
        ///
        /// # Errors
        ///
        /// Returns [`DownloadError::Http`] if the TLS backend cannot be
        /// initialised.
        pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
            let client = Client::builder()
                .user_agent(crate::USER_AGENT)
                .timeout(timeout)
                .build()?;
            Ok(Self { client })
        }

        /// Wrap an existing client.
        pub fn with_client(client: Client) -> Self {
            Self { client }
        }

        async fn stream_to(
            &self,
            url: &str,
            dest: &Path,
            progress: Progress<'_>,
        ) -> Result<u64, DownloadError> {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(DownloadError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let total = response.content_length();
            progress(0, total);

            let mut file = File::create(dest).await?;
            let mut stream = response.bytes_stream();
            let mut downloaded: u64 = 0;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                downloaded += chunk.len() as u64;
                progress(downloaded, total);
            }

            file.flush().await?;
            Ok(downloaded)
        }
    }

    #[async_trait]
    impl Fetcher for HttpFetcher {
        async fn download(
            &self,
            url: &str,
            dest: &Path,
            progress: Progress<'_>,
        ) -> Result<u64, DownloadError> {
            debug!(url, dest = %dest.display(), "downloading");
            let result = self.stream_to(url, dest, progress).await;
            if result.is_err() {
                tokio::fs::remove_file(dest).await.ok();
            }
            result
        }
    }
}
