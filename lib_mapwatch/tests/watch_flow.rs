//! End-to-end flow: registry on disk, a pass over stubbed servers, the gate, the sink.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeDelta, TimeZone, Utc};
use lib_mapwatch::store::JsonFileStore;
use lib_mapwatch::{
    FetchError, Fetcher, MapWatcher, NotificationDecision, NotifySink, PassOutcome, Scheduler,
    ServerEndpoint, ServerSnapshot, WatchEvent, WatchRegistry, WatcherOptions,
};

#[derive(Default, Clone)]
struct Servers(HashMap<String, (String, u32)>);

impl Servers {
    fn up(mut self, url: &str, map: &str, players: u32) -> Self {
        self.0.insert(url.to_string(), (map.to_string(), players));
        self
    }
}

impl Fetcher for Servers {
    async fn fetch(&self, endpoint: &ServerEndpoint) -> Result<ServerSnapshot, FetchError> {
        match self.0.get(endpoint.url()) {
            Some((map, players)) => Ok(ServerSnapshot {
                server: endpoint.clone(),
                active_map: map.clone(),
                player_count: *players,
                image_ref: Some(format!("{}/map.png", endpoint.url())),
            }),
            None => Err(FetchError::Status {
                url: endpoint.url().to_string(),
                status: 503,
            }),
        }
    }
}

#[derive(Default)]
struct RecordingSink(Mutex<Vec<(String, String)>>);

impl NotifySink for RecordingSink {
    fn notify(&self, title: &str, body: &str) {
        self.0.lock().unwrap().push((title.to_string(), body.to_string()));
    }
}

fn fast_options() -> WatcherOptions {
    WatcherOptions {
        notify_delay: Duration::from_millis(0),
        ..WatcherOptions::default()
    }
}

#[tokio::test]
async fn test_busiest_watched_server_notifies_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("store.json")).unwrap();
    let mut registry = WatchRegistry::load(Box::new(store)).unwrap();
    registry.add_server("http://a").unwrap();
    registry.add_server("http://b").unwrap();
    registry.add_map("haven").unwrap();

    let servers = Servers::default().up("http://a", "dust", 5).up("http://b", "haven", 12);
    let sink = Arc::new(RecordingSink::default());
    let watcher = MapWatcher::new(registry, servers, sink.clone(), fast_options());
    let mut events = watcher.subscribe();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();

    let first = watcher.run_pass_at(now).await;
    let PassOutcome::Completed { winner, decision } = first else {
        panic!("expected a winner, got {:?}", first);
    };
    assert_eq!(winner.server.url(), "http://b");
    assert_eq!(winner.active_map, "haven");
    assert_eq!(winner.player_count, 12);
    assert!(decision.is_notify());

    let debounce = watcher.debounce().await;
    assert_eq!(debounce.last_notified_at, now);
    assert_eq!(debounce.last_notified_map, "haven");

    assert!(matches!(events.recv().await.unwrap(), WatchEvent::Refreshed(ref s) if s.player_count == 12));
    assert_eq!(
        events.recv().await.unwrap(),
        WatchEvent::WatchedMapActive {
            map: "haven".to_string()
        }
    );

    let again = watcher.run_pass_at(now + TimeDelta::seconds(10)).await;
    assert!(matches!(
        again,
        PassOutcome::Completed {
            decision: NotificationDecision::NoAction,
            ..
        }
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        sink.0.lock().unwrap().as_slice(),
        &[("Favorite map is running".to_string(), "haven".to_string())]
    );
}

#[tokio::test]
async fn test_all_servers_down_leaves_state_untouched() {
    let mut registry =
        WatchRegistry::load(Box::new(lib_mapwatch::store::MemoryStore::new())).unwrap();
    registry.add_server("http://a").unwrap();
    registry.add_server("http://b").unwrap();
    registry.add_map("haven").unwrap();

    let sink = Arc::new(RecordingSink::default());
    let watcher = MapWatcher::new(registry, Servers::default(), sink.clone(), fast_options());
    let mut events = watcher.subscribe();

    assert_eq!(watcher.run_pass().await, PassOutcome::NoWinner);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err());
    assert!(sink.0.lock().unwrap().is_empty());
    assert!(watcher.debounce().await.last_notified_map.is_empty());
}

#[tokio::test]
async fn test_registry_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mapwatch").join("store.json");

    {
        let store = JsonFileStore::open(&path).unwrap();
        let watcher = MapWatcher::new(
            WatchRegistry::load(Box::new(store)).unwrap(),
            Servers::default(),
            Arc::new(RecordingSink::default()),
            fast_options(),
        );
        watcher.add_server("http://c").await.unwrap();
        watcher.add_server("http://a").await.unwrap();
        watcher.add_server("http://b").await.unwrap();
        assert!(watcher.add_map("mirage").await.unwrap());
        assert!(watcher.add_map("dust").await.unwrap());
        assert!(!watcher.add_map("mirage").await.unwrap());
        watcher.remove_server(1).await.unwrap();
    }

    let reloaded = WatchRegistry::load(Box::new(JsonFileStore::open(&path).unwrap())).unwrap();
    let urls: Vec<&str> = reloaded.servers().iter().map(|s| s.url()).collect();
    assert_eq!(urls, vec!["http://c", "http://b"]);
    assert_eq!(reloaded.maps(), &["mirage".to_string(), "dust".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_drives_watcher() {
    let mut registry =
        WatchRegistry::load(Box::new(lib_mapwatch::store::MemoryStore::new())).unwrap();
    registry.add_server("http://a").unwrap();

    let watcher = Arc::new(MapWatcher::new(
        registry,
        Servers::default().up("http://a", "inferno", 9),
        Arc::new(RecordingSink::default()),
        fast_options(),
    ));
    let mut events = watcher.subscribe();
    let scheduler = Scheduler::new(Arc::clone(&watcher), Duration::from_secs(150));
    scheduler.arm();

    tokio::time::sleep(Duration::from_secs(151)).await;

    match events.recv().await.unwrap() {
        WatchEvent::Refreshed(snapshot) => assert_eq!(snapshot.active_map, "inferno"),
        other => panic!("unexpected event {:?}", other),
    }
    scheduler.disarm();
}
