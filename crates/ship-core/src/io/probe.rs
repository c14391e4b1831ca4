//! Server reachability probes.

use std::time::Duration;

use async_trait::async_trait;

/// Measures whether a server answers, and how fast.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Round-trip time to `url`, or `None` if it is unreachable.
    async fn ping(&self, url: &str) -> Option<Duration>;
}

#[cfg(feature = "network")]
pub use http::HttpProber;

#[cfg(feature = "network")]
mod http {
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use reqwest::Client;
    use reqwest::redirect::Policy;
    use tracing::debug;

    use super::Prober;
    use crate::io::DownloadError;

    /// [`Prober`] that sends a HEAD request and counts any 2xx or 3xx answer
    /// as reachable. Redirects are not followed.
    #[derive(Debug, Clone)]
    pub struct HttpProber {
        client: Client,
    }

    impl HttpProber {
        /// Build a prober whose requests give up after `timeout`.
        ///
        /// # Errors
        ///
        /// Returns [`DownloadError::Http`] if the client cannot be built.
        pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
            let client = Client::builder()
                .user_agent(crate::USER_AGENT)
                .redirect(Policy::none())
                .timeout(timeout)
                .build()?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl Prober for HttpProber {
        async fn ping(&self, url: &str) -> Option<Duration> {
            let start = Instant::now();
            match self.client.head(url).send().await {
                Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
                    Some(start.elapsed())
                }
                Ok(resp) => {
                    debug!(url, status = resp.status().as_u16(), "probe rejected");
                    None
                }
                Err(e) => {
                    debug!(url, error = %e, "probe failed");
                    None
                }
            }
        }
    }
}

#[cfg(all(test, feature = "network"))]
mod tests {
    use super::*;
    use mockito::Server;

    fn prober() -> HttpProber {
        HttpProber::new(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_success_and_redirect_are_reachable() {
        let mut server = Server::new_async().await;
        let _ok = server.mock("HEAD", "/").with_status(200).create_async().await;
        let _moved = server
            .mock("HEAD", "/moved")
            .with_status(301)
            .with_header("location", "http://elsewhere.invalid/")
            .create_async()
            .await;

        assert!(prober().ping(&server.url()).await.is_some());
        assert!(prober().ping(&format!("{}/moved", server.url())).await.is_some());
    }

    #[tokio::test]
    async fn test_server_error_is_unreachable() {
        let mut server = Server::new_async().await;
        let _m = server.mock("HEAD", "/").with_status(503).create_async().await;
        assert!(prober().ping(&server.url()).await.is_none());
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        assert!(prober().ping("http://127.0.0.1:1").await.is_none());
    }
}
