//! # HTTP Fetcher
//!
//! The production [`Fetcher`]: a single plain HTTP GET against the endpoint URL.
//!
//! ## Behaviour:
//! - **Bounded**: every fetch is capped by a timeout, enforced both on the shared
//!   `reqwest::Client` and around the whole request/body read, so one unreachable
//!   server cannot stall a pass.
//! - **Status checked**: only 2xx responses are scraped; anything else is a
//!   [`FetchError::Status`].
//! - **No retries**: a failed fetch is reported once and the server simply sits out
//!   the current pass.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::{FetchError, Fetcher, snapshot_from_extraction};
use crate::extract::Extractor;
use crate::snapshot::{ServerEndpoint, ServerSnapshot};

/// Default per-fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Default `User-Agent` header sent with every request.
pub const DEFAULT_USER_AGENT: &str = "MapWatch/1.0";

/// # HTTP Fetcher
///
/// Reuses one `reqwest::Client` across all fetches for connection pooling.
pub struct HttpFetcher {
    /// Shared HTTP client with timeout and user agent applied.
    client: reqwest::Client,
    /// Turns response bodies into snapshot fields.
    extractor: Arc<dyn Extractor>,
    /// Upper bound for one fetch, request and body included.
    timeout: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher with the given extractor, timeout and user agent.
    pub fn new(extractor: Arc<dyn Extractor>, timeout: Duration, user_agent: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(user_agent)
                .build()
                .unwrap_or_default(), // Fallback to a default client if builder fails.
            extractor,
            timeout,
        }
    }

    async fn get_body(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| self.classify(url, e))
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, endpoint: &ServerEndpoint) -> Result<ServerSnapshot, FetchError> {
        let url = endpoint.url();
        let body = match tokio::time::timeout(self.timeout, self.get_body(url)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    after: self.timeout,
                });
            }
        };

        debug!(url, bytes = body.len(), "Fetched status page");
        let extraction = self.extractor.extract(&body);
        Ok(snapshot_from_extraction(endpoint, extraction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Extraction;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Echoes the body back as the map name and a fixed player count text.
    struct BodyAsMap;

    impl Extractor for BodyAsMap {
        fn extract(&self, raw_body: &str) -> Extraction {
            Extraction {
                active_map: raw_body.trim().to_string(),
                player_count_text: "21".to_string(),
                image_url: Some("http://img.example/map.png".to_string()),
            }
        }
    }

    fn fetcher(timeout: Duration) -> HttpFetcher {
        HttpFetcher::new(Arc::new(BodyAsMap), timeout, DEFAULT_USER_AGENT)
    }

    /// Starts a one-shot mock HTTP server and returns its URL.
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
        let port = listener.local_addr().unwrap().port();

        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        format!("http://127.0.0.1:{}/status", port)
    }

    #[tokio::test]
    async fn test_fetch_success_builds_snapshot() {
        let url = serve_once("200 OK", "haven");
        let endpoint = ServerEndpoint::new(url);

        let snapshot = fetcher(Duration::from_secs(5)).fetch(&endpoint).await.unwrap();

        assert_eq!(snapshot.server, endpoint);
        assert_eq!(snapshot.active_map, "haven");
        assert_eq!(snapshot.player_count, 21);
        assert_eq!(snapshot.image_ref.as_deref(), Some("http://img.example/map.png"));
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_is_error() {
        let url = serve_once("503 Service Unavailable", "busy");
        let endpoint = ServerEndpoint::new(url.clone());

        let err = fetcher(Duration::from_secs(5)).fetch(&endpoint).await.unwrap_err();

        assert_eq!(err, FetchError::Status { url, status: 503 });
    }

    #[tokio::test]
    async fn test_fetch_unresponsive_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://127.0.0.1:{}/status", listener.local_addr().unwrap().port());
        thread::spawn(move || {
            // Accept and hold the connection without answering.
            if let Ok((stream, _)) = listener.accept() {
                thread::sleep(Duration::from_secs(3));
                drop(stream);
            }
        });

        let err = fetcher(Duration::from_millis(200))
            .fetch(&ServerEndpoint::new(url))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_fetch_refused_connection_is_network_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let endpoint = ServerEndpoint::new(format!("http://127.0.0.1:{}/status", port));

        let err = fetcher(Duration::from_secs(5)).fetch(&endpoint).await.unwrap_err();

        assert!(matches!(err, FetchError::Network { .. }), "got {err:?}");
    }
}
