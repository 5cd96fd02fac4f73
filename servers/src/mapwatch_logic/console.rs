//! # Console Front-End
//!
//! Prints every pass result to stdout and reads line commands from stdin.
//!
//! Stdin is read on a dedicated OS thread: a blocking read cannot be cancelled, and
//! a detached thread does not hold up process exit the way a runtime blocking task
//! would.

use std::io::BufRead;
use std::sync::Arc;

use lib_mapwatch::{Fetcher, MapWatcher, Scheduler, ServerSnapshot, WatchEvent};
use tokio::sync::{broadcast, mpsc};
use tokio_graceful::ShutdownGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

const HELP: &str = "\
commands:
  refresh              poll all servers now
  on | off             enable / disable scheduled polling
  maps                 list watched maps
  servers              list servers
  add-map <name>       watch a map
  rm-map <n>           stop watching map number n
  add-server <url>     register a server status page
  rm-server <n>        remove server number n
  quit                 exit";

/// One parsed console line. Indices are still 1-based as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Refresh,
    On,
    Off,
    Maps,
    Servers,
    AddMap(String),
    RmMap(usize),
    AddServer(String),
    RmServer(usize),
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let needs_arg = |what: &str| -> Result<String, String> {
            if rest.is_empty() {
                Err(format!("{} needs {}", word, what))
            } else {
                Ok(rest.to_string())
            }
        };
        let needs_index = || -> Result<usize, String> {
            rest.parse::<usize>()
                .map_err(|_| format!("{} needs a list number, got '{}'", word, rest))
        };

        match word.to_ascii_lowercase().as_str() {
            "refresh" | "r" => Ok(Self::Refresh),
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "maps" => Ok(Self::Maps),
            "servers" => Ok(Self::Servers),
            "add-map" => needs_arg("a map name").map(Self::AddMap),
            "rm-map" => needs_index().map(Self::RmMap),
            "add-server" => needs_arg("a URL").map(Self::AddServer),
            "rm-server" => needs_index().map(Self::RmServer),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            "" => Err(String::new()),
            other => Err(format!("unknown command '{}', try 'help'", other)),
        }
    }
}

/// Turns a 1-based list number into a 0-based index, rejecting anything outside
/// a list of `len` entries.
pub fn validate_index(number: usize, len: usize) -> Result<usize, String> {
    if number == 0 || number > len {
        Err(format!("no entry {} (list has {})", number, len))
    } else {
        Ok(number - 1)
    }
}

/// Accepts absolute http(s) URLs only.
pub fn parse_server_url(input: &str) -> Result<String, String> {
    let url = Url::parse(input.trim()).map_err(|e| format!("invalid URL '{}': {}", input, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(format!("unsupported scheme '{}', use http or https", other)),
    }
}

pub fn format_snapshot(snapshot: &ServerSnapshot) -> String {
    let map = if snapshot.active_map.is_empty() { "?" } else { snapshot.active_map.as_str() };
    match &snapshot.image_ref {
        Some(image) => format!(
            "[{}] map: {}  players: {}  image: {}",
            snapshot.server, map, snapshot.player_count, image
        ),
        None => format!("[{}] map: {}  players: {}", snapshot.server, map, snapshot.player_count),
    }
}

fn print_list<T: std::fmt::Display>(title: &str, items: &[T]) {
    if items.is_empty() {
        println!("{}: (none)", title);
        return;
    }
    println!("{}:", title);
    for (i, item) in items.iter().enumerate() {
        println!("  {}. {}", i + 1, item);
    }
}

/// Prints pass results until shutdown. The watched-map alert is only shown when
/// stdout is a terminal.
pub async fn print_events(
    mut events: broadcast::Receiver<WatchEvent>,
    foreground: bool,
    shutdown_guard: ShutdownGuard,
) {
    loop {
        tokio::select! {
            _ = shutdown_guard.cancelled() => break,
            event = events.recv() => match event {
                Ok(WatchEvent::Refreshed(snapshot)) => println!("{}", format_snapshot(&snapshot)),
                Ok(WatchEvent::WatchedMapActive { map }) => {
                    if foreground {
                        println!(">>> {} is running on the busiest server!", map);
                    } else {
                        debug!("Alert for {} not shown, not in foreground", map);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Console fell behind, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Reads commands from stdin until `quit`, end of input or shutdown.
pub async fn run_commands<F: Fetcher + 'static>(
    watcher: Arc<MapWatcher<F>>,
    scheduler: Arc<Scheduler<MapWatcher<F>>>,
    quit: CancellationToken,
    shutdown_guard: ShutdownGuard,
) {
    let mut lines = spawn_stdin_reader();
    println!("{}", HELP);

    loop {
        let line = tokio::select! {
            _ = shutdown_guard.cancelled() => break,
            line = lines.recv() => match line {
                Some(line) => line,
                None => {
                    info!("Console input closed");
                    // Without a console the scheduler keeps running until Ctrl-C.
                    shutdown_guard.cancelled().await;
                    break;
                }
            },
        };

        let command = match ConsoleCommand::parse(&line) {
            Ok(command) => command,
            Err(msg) => {
                if !msg.is_empty() {
                    println!("{}", msg);
                }
                continue;
            }
        };

        if command == ConsoleCommand::Quit {
            quit.cancel();
            break;
        }
        execute(command, &watcher, &scheduler).await;
    }
}

async fn execute<F: Fetcher + 'static>(
    command: ConsoleCommand,
    watcher: &Arc<MapWatcher<F>>,
    scheduler: &Arc<Scheduler<MapWatcher<F>>>,
) {
    match command {
        ConsoleCommand::Refresh => {
            let _ = scheduler.trigger_now();
        }
        ConsoleCommand::On => {
            scheduler.set_enabled(true);
            println!("polling on");
        }
        ConsoleCommand::Off => {
            scheduler.set_enabled(false);
            println!("polling off");
        }
        ConsoleCommand::Maps => print_list("watched maps", &watcher.maps().await),
        ConsoleCommand::Servers => print_list("servers", &watcher.servers().await),
        ConsoleCommand::AddMap(name) => match watcher.add_map(&name).await {
            Ok(true) => println!("watching {}", name),
            Ok(false) => println!("{} is already watched", name),
            Err(e) => warn!("Could not save watched map: {}", e),
        },
        ConsoleCommand::RmMap(number) => match validate_index(number, watcher.maps().await.len()) {
            Ok(index) => match watcher.remove_map(index).await {
                Ok(name) => println!("stopped watching {}", name),
                Err(e) => warn!("Could not save watched maps: {}", e),
            },
            Err(msg) => println!("{}", msg),
        },
        ConsoleCommand::AddServer(input) => match parse_server_url(&input) {
            Ok(url) => match watcher.add_server(url.as_str()).await {
                Ok(()) => {
                    println!("added {}", url);
                    let _ = scheduler.trigger_now();
                }
                Err(e) => warn!("Could not save server: {}", e),
            },
            Err(msg) => println!("{}", msg),
        },
        ConsoleCommand::RmServer(number) => {
            match validate_index(number, watcher.servers().await.len()) {
                Ok(index) => match watcher.remove_server(index).await {
                    Ok(server) => println!("removed {}", server),
                    Err(e) => warn!("Could not save servers: {}", e),
                },
                Err(msg) => println!("{}", msg),
            }
        }
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => {}
    }
}
