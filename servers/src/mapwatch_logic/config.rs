use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use clap::Args;
use lib_mapwatch::extract::PatternSet;
use lib_mapwatch::notify::{DEFAULT_NOTIFY_DELAY, VoiceOptions};
use lib_mapwatch::retrieve::http_fetcher::{DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT};
use lib_mapwatch::core::gate::DEFAULT_COOLDOWN_SECS;
use lib_mapwatch::core::scheduler::DEFAULT_POLL_INTERVAL;
use lib_mapwatch::WatcherOptions;
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_FILE: &str = "mapwatch.conf";

#[derive(Args, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[arg(long, env = "MAPWATCH_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[arg(long, env = "MAPWATCH_STORE_PATH", help = "JSON file holding the watched maps and servers.")]
    pub store_path: Option<PathBuf>,

    #[arg(long, env = "MAPWATCH_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[arg(long, env = "MAPWATCH_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[arg(long, env = "MAPWATCH_POLL_INTERVAL_SECS", help = "Seconds between scheduled polls.")]
    pub poll_interval_secs: Option<u64>,

    #[arg(long, env = "MAPWATCH_FETCH_TIMEOUT_SECS", help = "Per-server request timeout in seconds.")]
    pub fetch_timeout_secs: Option<u64>,

    #[arg(long, env = "MAPWATCH_NOTIFY_DELAY_SECS", help = "Seconds between detecting a watched map and notifying.")]
    pub notify_delay_secs: Option<u64>,

    #[arg(long, env = "MAPWATCH_COOLDOWN_SECS", help = "Minimum seconds between two notifications.")]
    pub cooldown_secs: Option<i64>,

    #[arg(long, env = "MAPWATCH_USER_AGENT", help = "User-Agent header sent to status pages.")]
    pub user_agent: Option<String>,

    #[arg(long, env = "MAPWATCH_SPEECH", help = "Speak notifications aloud (true/false).")]
    pub speech: Option<bool>,

    #[arg(long, env = "MAPWATCH_VOICE", help = "Voice passed to espeak / wsay.")]
    pub voice: Option<String>,

    #[arg(long, env = "MAPWATCH_VOLUME", help = "Speech volume passed to espeak / wsay.")]
    pub volume: Option<i64>,

    #[arg(long, env = "MAPWATCH_MAP_PATTERN", help = "Regex whose first group captures the active map.")]
    pub map_pattern: Option<String>,

    #[arg(long, env = "MAPWATCH_PLAYERS_PATTERN", help = "Regex whose first group captures the player count.")]
    pub players_pattern: Option<String>,

    #[arg(long, env = "MAPWATCH_IMAGE_PATTERN", help = "Regex whose first group captures the map image URL.")]
    pub image_pattern: Option<String>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            store_path: other.store_path.or(self.store_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            poll_interval_secs: other.poll_interval_secs.or(self.poll_interval_secs),
            fetch_timeout_secs: other.fetch_timeout_secs.or(self.fetch_timeout_secs),
            notify_delay_secs: other.notify_delay_secs.or(self.notify_delay_secs),
            cooldown_secs: other.cooldown_secs.or(self.cooldown_secs),
            user_agent: other.user_agent.or(self.user_agent),
            speech: other.speech.or(self.speech),
            voice: other.voice.or(self.voice),
            volume: other.volume.or(self.volume),
            map_pattern: other.map_pattern.or(self.map_pattern),
            players_pattern: other.players_pattern.or(self.players_pattern),
            image_pattern: other.image_pattern.or(self.image_pattern),
        }
    }

    fn defaults() -> Config {
        let patterns = PatternSet::default();
        Config {
            store_path: Some(default_store_path()),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            poll_interval_secs: Some(DEFAULT_POLL_INTERVAL.as_secs()),
            fetch_timeout_secs: Some(DEFAULT_FETCH_TIMEOUT.as_secs()),
            notify_delay_secs: Some(DEFAULT_NOTIFY_DELAY.as_secs()),
            cooldown_secs: Some(DEFAULT_COOLDOWN_SECS),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            speech: Some(false),
            map_pattern: Some(patterns.map),
            players_pattern: Some(patterns.players),
            image_pattern: Some(patterns.image),
            ..Default::default()
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(default_store_path)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> String {
        self.log_level.clone().unwrap_or_else(|| "info".to_string())
    }

    /// Zero is not a usable interval and falls back to the default.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout_secs.map(Duration::from_secs).unwrap_or(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent.clone().unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn speech_enabled(&self) -> bool {
        self.speech.unwrap_or(false)
    }

    pub fn watcher_options(&self) -> WatcherOptions {
        let defaults = WatcherOptions::default();
        WatcherOptions {
            cooldown: self.cooldown_secs.map(TimeDelta::seconds).unwrap_or(defaults.cooldown),
            notify_delay: self
                .notify_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.notify_delay),
        }
    }

    pub fn voice_options(&self) -> VoiceOptions {
        let defaults = VoiceOptions::default();
        VoiceOptions {
            volume: self.volume.unwrap_or(defaults.volume),
            voice: self.voice.clone().unwrap_or(defaults.voice),
            program: None,
        }
    }

    pub fn pattern_set(&self) -> PatternSet {
        let defaults = PatternSet::default();
        PatternSet {
            map: self.map_pattern.clone().unwrap_or(defaults.map),
            players: self.players_pattern.clone().unwrap_or(defaults.players),
            image: self.image_pattern.clone().unwrap_or(defaults.image),
        }
    }
}

fn default_store_path() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("mapwatch").join("store.json"),
        None => PathBuf::from("mapwatch_store.json"),
    }
}

/// Resolves the effective configuration: defaults, then the config file, then
/// environment and CLI values already parsed into `cli`.
///
/// Nothing is logged here because the subscriber is only installed once the
/// configuration is known. Problems with the config file come back as warnings
/// for the caller to log.
pub fn load_config(cli: Config) -> (Config, Vec<String>) {
    let mut warnings = Vec::new();

    // 1. Load defaults
    let mut current_config = Config::defaults();

    // 2. Load from config file (mapwatch.conf) if present.
    //    The CLI / environment may point at a different file.
    let explicit_path = cli.config_path.clone();
    let config_file_path = explicit_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if config_file_path.exists() {
        match fs::read_to_string(&config_file_path) {
            Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
                Ok(file_config) => current_config = current_config.merge(file_config),
                Err(e) => warnings.push(format!(
                    "Failed to parse config file: {} ({}). Falling back to other sources.",
                    config_file_path.display(),
                    e
                )),
            },
            Err(e) => warnings.push(format!(
                "Failed to read config file: {} ({}). Falling back to other sources.",
                config_file_path.display(),
                e
            )),
        }
    } else if explicit_path.is_some() {
        warnings.push(format!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            config_file_path.display()
        ));
    }

    // 3. Override with environment variables and CLI arguments
    let config = current_config.merge(cli);
    if config.poll_interval_secs == Some(0) {
        warnings.push(format!(
            "pollIntervalSecs must be positive, using {}s",
            DEFAULT_POLL_INTERVAL.as_secs()
        ));
    }
    (config, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_without_file_or_cli() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Config {
            config_path: Some(dir.path().join("absent.conf")),
            ..Default::default()
        };

        let (config, warnings) = load_config(cli);

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("not found"));
        assert_eq!(config.poll_interval(), Duration::from_secs(150));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.watcher_options(), WatcherOptions::default());
        assert_eq!(config.log_level(), "info");
        assert!(!config.speech_enabled());
        assert_eq!(config.pattern_set(), PatternSet::default());
    }

    #[test]
    fn test_file_overrides_defaults_and_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapwatch.conf");
        fs::write(
            &path,
            r#"{ "pollIntervalSecs": 60, "cooldownSecs": 300, "logLevel": "debug", "speech": true }"#,
        )
        .unwrap();

        let cli = Config {
            config_path: Some(path.clone()),
            log_level: Some("warn".to_string()),
            ..Default::default()
        };
        let (config, warnings) = load_config(cli);

        assert!(warnings.is_empty());
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.watcher_options().cooldown, TimeDelta::seconds(300));
        assert_eq!(config.log_level(), "warn");
        assert!(config.speech_enabled());
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_unparseable_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapwatch.conf");
        fs::write(&path, "pollIntervalSecs = 60").unwrap();

        let (config, warnings) = load_config(Config {
            config_path: Some(path.clone()),
            ..Default::default()
        });

        assert_eq!(config.poll_interval(), Duration::from_secs(150));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Failed to parse config file"));
        assert!(warnings[0].contains(&path.display().to_string()));
    }

    #[test]
    fn test_zero_poll_interval_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let (config, warnings) = load_config(Config {
            config_path: Some(dir.path().join("absent.conf")),
            poll_interval_secs: Some(0),
            ..Default::default()
        });

        assert_eq!(config.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert!(warnings.iter().any(|w| w.contains("pollIntervalSecs")));
    }

    #[test]
    fn test_voice_and_pattern_overrides() {
        let config = Config {
            voice: Some("en-us".to_string()),
            volume: Some(150),
            map_pattern: Some(r"map=(\w+)".to_string()),
            ..Default::default()
        };

        let voice = config.voice_options();
        assert_eq!(voice.voice, "en-us");
        assert_eq!(voice.volume, 150);

        let patterns = config.pattern_set();
        assert_eq!(patterns.map, r"map=(\w+)");
        assert_eq!(patterns.players, PatternSet::default().players);
    }
}
