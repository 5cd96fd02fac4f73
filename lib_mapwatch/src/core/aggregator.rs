//! # Aggregator
//!
//! Runs one fetch per server concurrently and joins on all of them before choosing a
//! winner. The join is strict: a pass never looks at a partial result set, and the
//! order in which fetches complete has no influence on the outcome.

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::retrieve::Fetcher;
use crate::snapshot::{ServerEndpoint, ServerSnapshot};

/// Fans out fetches over a server list and picks the busiest server.
pub struct Aggregator<F> {
    fetcher: F,
}

impl<F: Fetcher> Aggregator<F> {
    /// Wraps the fetcher used for every server.
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// The underlying fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Polls every server and returns the winner, or `None` when no fetch succeeded.
    ///
    /// Failed fetches are logged and dropped; they never abort the pass.
    pub async fn poll(&self, servers: &[ServerEndpoint]) -> Option<ServerSnapshot> {
        // join_all keeps results in input order, which is what the tie-break relies on.
        let outcomes = join_all(servers.iter().map(|server| self.fetcher.fetch(server))).await;

        let snapshots = outcomes.into_iter().filter_map(|outcome| match outcome {
            Ok(snapshot) => {
                debug!(
                    server = %snapshot.server,
                    map = %snapshot.active_map,
                    players = snapshot.player_count,
                    "Server responded"
                );
                Some(snapshot)
            }
            Err(e) => {
                warn!("Server contributed no snapshot: {}", e);
                None
            }
        });

        select_winner(snapshots)
    }
}

/// Picks the snapshot with the strictly greatest player count.
///
/// Ties go to the snapshot that came first, so passing snapshots in registration
/// order makes the earliest registered server win.
pub fn select_winner<I>(snapshots: I) -> Option<ServerSnapshot>
where
    I: IntoIterator<Item = ServerSnapshot>,
{
    snapshots.into_iter().fold(None, |best, candidate| match best {
        Some(current) if candidate.player_count <= current.player_count => Some(current),
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::FetchError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Canned outcome per URL, with an optional delay to shuffle completion order.
    #[derive(Default)]
    struct StubFetcher {
        outcomes: HashMap<String, (Option<(&'static str, u32)>, u64)>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn ok(mut self, url: &str, map: &'static str, players: u32, delay_ms: u64) -> Self {
            self.outcomes.insert(url.to_string(), (Some((map, players)), delay_ms));
            self
        }

        fn failing(mut self, url: &str) -> Self {
            self.outcomes.insert(url.to_string(), (None, 0));
            self
        }
    }

    impl Fetcher for StubFetcher {
        async fn fetch(&self, endpoint: &ServerEndpoint) -> Result<ServerSnapshot, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (outcome, delay_ms) = self.outcomes.get(endpoint.url()).cloned().unwrap_or((None, 0));
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            match outcome {
                Some((map, players)) => Ok(ServerSnapshot {
                    server: endpoint.clone(),
                    active_map: map.to_string(),
                    player_count: players,
                    image_ref: None,
                }),
                None => Err(FetchError::Status {
                    url: endpoint.url().to_string(),
                    status: 500,
                }),
            }
        }
    }

    fn endpoints(urls: &[&str]) -> Vec<ServerEndpoint> {
        urls.iter().map(|u| ServerEndpoint::new(*u)).collect()
    }

    #[tokio::test]
    async fn test_poll_picks_most_players() {
        let fetcher = StubFetcher::default()
            .ok("a", "dust", 5, 0)
            .ok("b", "haven", 12, 0)
            .ok("c", "inferno", 3, 0);
        let aggregator = Aggregator::new(fetcher);

        let winner = aggregator.poll(&endpoints(&["a", "b", "c"])).await.unwrap();

        assert_eq!(winner.server.url(), "b");
        assert_eq!(winner.active_map, "haven");
        assert_eq!(aggregator.fetcher().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tie_goes_to_first_registered_regardless_of_completion_order() {
        // "a" finishes last but was registered first.
        let fetcher = StubFetcher::default()
            .ok("a", "dust", 8, 300)
            .ok("b", "haven", 8, 10)
            .ok("c", "mirage", 2, 0);
        let aggregator = Aggregator::new(fetcher);

        let winner = aggregator.poll(&endpoints(&["a", "b", "c"])).await.unwrap();

        assert_eq!(winner.server.url(), "a");
    }

    #[tokio::test]
    async fn test_failed_servers_are_skipped() {
        let fetcher = StubFetcher::default()
            .failing("a")
            .ok("b", "haven", 1, 0)
            .failing("c");
        let aggregator = Aggregator::new(fetcher);

        let winner = aggregator.poll(&endpoints(&["a", "b", "c"])).await.unwrap();

        assert_eq!(winner.server.url(), "b");
    }

    #[tokio::test]
    async fn test_all_failed_returns_none() {
        let fetcher = StubFetcher::default().failing("a").failing("b");
        let aggregator = Aggregator::new(fetcher);

        assert!(aggregator.poll(&endpoints(&["a", "b"])).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_server_list_returns_none() {
        let aggregator = Aggregator::new(StubFetcher::default());
        assert!(aggregator.poll(&[]).await.is_none());
        assert_eq!(aggregator.fetcher().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_run_concurrently() {
        let fetcher = StubFetcher::default()
            .ok("a", "dust", 1, 1000)
            .ok("b", "haven", 2, 1000)
            .ok("c", "mirage", 3, 1000);
        let aggregator = Aggregator::new(fetcher);

        let started = tokio::time::Instant::now();
        aggregator.poll(&endpoints(&["a", "b", "c"])).await.unwrap();

        // Sequential fetches would take three seconds.
        assert!(started.elapsed() < Duration::from_millis(1500));
    }

    #[test]
    fn test_select_winner_zero_players_still_wins() {
        let snapshot = ServerSnapshot {
            server: ServerEndpoint::new("a"),
            active_map: "dust".to_string(),
            player_count: 0,
            image_ref: None,
        };
        assert_eq!(select_winner(vec![snapshot.clone()]), Some(snapshot));
        assert_eq!(select_winner(Vec::new()), None);
    }
}
