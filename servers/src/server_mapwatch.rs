//! # MapWatch Server
//!
//! Watches a set of game-server status pages and announces when one of your
//! favourite maps is running on the busiest server.
//!
//! ## Functionality:
//! - **Scheduled polling**: every server is polled concurrently on a fixed interval
//!   (150 s by default); the server with the most players wins the pass.
//! - **Notifications**: a watched map on the winning server is logged and, when
//!   enabled, spoken through `espeak` / `wsay`. Repeats are debounced.
//! - **Console**: pass results are printed to stdout; line commands edit the lists,
//!   toggle polling and force a refresh.
//! - **Subcommands**: one-shot registry edits and a single `poll` pass for scripts.
//! - **Configuration**: defaults, then `mapwatch.conf`, then `MAPWATCH_*` environment
//!   variables and CLI flags.
//! - **Graceful Shutdown**: Ctrl-C or `quit` stops the timer and drains running tasks
//!   through `tokio-graceful`.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_graceful::Shutdown;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use lib_mapwatch::extract::RegexExtractor;
use lib_mapwatch::notify::{FanoutSink, LogSink, SpeechSink};
use lib_mapwatch::retrieve::HttpFetcher;
use lib_mapwatch::store::JsonFileStore;
use lib_mapwatch::{MapWatcher, PassOutcome, Scheduler, WatchRegistry};

mod mapwatch_logic;
use mapwatch_logic::config::{self, Config};
use mapwatch_logic::{console, logger};

#[derive(Parser, Debug)]
#[command(name = "server_mapwatch", about = "Notifies when a watched map runs on the busiest game server", version)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Poll on a schedule with an interactive console (default).
    Run,
    /// Print the watched maps and servers.
    List,
    /// Register a server status page.
    AddServer { url: String },
    /// Remove a server by its list number.
    RemoveServer { number: usize },
    /// Watch a map.
    AddMap { name: String },
    /// Stop watching a map by its list number.
    RemoveMap { number: usize },
    /// Run a single pass and print the winner.
    Poll,
}

/// Loads `.env`, then the platform specific `.env.windows` / `.env.linux`.
fn load_dotenv() {
    let dotenv_os: &str = if cfg!(target_os = "windows") {
        ".env.windows"
    } else {
        ".env.linux"
    };
    dotenvy::dotenv().ok();
    dotenvy::from_filename(dotenv_os).ok();
}

fn open_registry(config: &Config) -> Result<WatchRegistry> {
    let path = config.store_path();
    let store = JsonFileStore::open(&path).with_context(|| format!("Failed to open store {}", path.display()))?;
    Ok(WatchRegistry::load(Box::new(store))?)
}

fn build_watcher(config: &Config, registry: WatchRegistry) -> Result<MapWatcher<HttpFetcher>> {
    let extractor = RegexExtractor::new(&config.pattern_set()).context("Invalid extraction pattern")?;
    let fetcher = HttpFetcher::new(Arc::new(extractor), config.fetch_timeout(), &config.user_agent());

    let mut sink = FanoutSink::new().with(Arc::new(LogSink));
    if config.speech_enabled() {
        sink = sink.with(Arc::new(SpeechSink::new(config.voice_options())));
    }

    Ok(MapWatcher::new(registry, fetcher, Arc::new(sink), config.watcher_options()))
}

fn edit_registry(command: Command, registry: &mut WatchRegistry) -> Result<()> {
    match command {
        Command::List => {
            println!("watched maps:");
            for (i, map) in registry.maps().iter().enumerate() {
                println!("  {}. {}", i + 1, map);
            }
            println!("servers:");
            for (i, server) in registry.servers().iter().enumerate() {
                println!("  {}. {}", i + 1, server);
            }
        }
        Command::AddServer { url } => {
            let url = console::parse_server_url(&url).map_err(anyhow::Error::msg)?;
            registry.add_server(url.as_str())?;
            println!("added {}", url);
        }
        Command::RemoveServer { number } => {
            let index = console::validate_index(number, registry.servers().len()).map_err(anyhow::Error::msg)?;
            println!("removed {}", registry.remove_server(index)?);
        }
        Command::AddMap { name } => {
            if registry.add_map(&name)? {
                println!("watching {}", name);
            } else {
                println!("{} is already watched", name);
            }
        }
        Command::RemoveMap { number } => {
            let index = console::validate_index(number, registry.maps().len()).map_err(anyhow::Error::msg)?;
            println!("stopped watching {}", registry.remove_map(index)?);
        }
        Command::Run | Command::Poll => bail!("{:?} is not a registry edit", command),
    }
    Ok(())
}

async fn poll_once(config: &Config, registry: WatchRegistry) -> Result<()> {
    let watcher = build_watcher(config, registry)?;
    match watcher.run_pass().await {
        PassOutcome::Completed { winner, decision } => {
            println!("{}", console::format_snapshot(&winner));
            if decision.is_notify() {
                // Give the delayed notification a chance to be delivered before exit.
                tokio::time::sleep(config.watcher_options().notify_delay + Duration::from_millis(200)).await;
            }
        }
        PassOutcome::NoWinner => println!("no server answered"),
        PassOutcome::Superseded => {}
    }
    Ok(())
}

async fn run(config: Config, registry: WatchRegistry) -> Result<()> {
    let watcher = Arc::new(build_watcher(&config, registry)?);
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&watcher), config.poll_interval()));
    let quit = CancellationToken::new();

    let shutdown = Shutdown::new({
        let quit = quit.clone();
        async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Ctrl-C received, initiating shutdown."),
                _ = quit.cancelled() => info!("Quit requested, initiating shutdown."),
            }
        }
    });

    let foreground = std::io::stdout().is_terminal();
    let events = watcher.subscribe();
    shutdown.spawn_task_fn(move |guard| console::print_events(events, foreground, guard));
    shutdown.spawn_task_fn({
        let watcher = Arc::clone(&watcher);
        let scheduler = Arc::clone(&scheduler);
        move |guard| console::run_commands(watcher, scheduler, quit, guard)
    });

    info!(
        "Polling {} servers every {:?}",
        watcher.servers().await.len(),
        scheduler.period()
    );
    scheduler.arm();
    let _ = scheduler.trigger_now();

    match shutdown.shutdown_with_limit(Duration::from_secs(10)).await {
        Ok(elapsed) => info!(
            "shutdown: gracefully {}s after shutdown signal received",
            elapsed.as_secs_f64()
        ),
        Err(e) => info!("shutdown: forcefully due to timeout: {}", e),
    }
    scheduler.disarm();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    let (config, config_warnings) = config::load_config(cli.config);
    let _guard = logger::setup_logging(&config.log_dir(), &config.log_level())?;
    for message in &config_warnings {
        warn!("{}", message);
    }

    let mut registry = match open_registry(&config) {
        Ok(registry) => registry,
        Err(e) => {
            error!("{:#}", e);
            return Err(e);
        }
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, registry).await?,
        Command::Poll => poll_once(&config, registry).await?,
        edit => edit_registry(edit, &mut registry)?,
    }

    info!("Bye!");
    Ok(())
}
