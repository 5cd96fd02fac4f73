//! # Speech Sink
//!
//! Speaks notifications with an external text-to-speech program: `wsay` on Windows,
//! `espeak` elsewhere. The program runs on a blocking worker and a shared lock keeps
//! utterances from overlapping.

use std::process::Command;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::NotifySink;

/// Voice and volume settings for the speech program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceOptions {
    /// Output volume, passed straight to the program (espeak amplitude 0..200).
    pub volume: i64,
    /// Voice name, e.g. "en+f2" for espeak, "5" for wsay.
    pub voice: String,
    /// Program to run instead of the platform default.
    pub program: Option<String>,
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self {
            volume: 100,
            voice: if cfg!(target_os = "windows") { "5".to_string() } else { "en+f2".to_string() },
            program: None,
        }
    }
}

/// # Speech Sink
#[derive(Debug, Clone, Default)]
pub struct SpeechSink {
    options: VoiceOptions,
    /// Held while the program runs so only one notification is spoken at a time.
    say_lock: Arc<Mutex<()>>,
}

impl SpeechSink {
    /// Creates a sink with the given voice options.
    pub fn new(options: VoiceOptions) -> Self {
        Self {
            options,
            say_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The program and arguments used to speak `text`.
    pub fn command_line(&self, text: &str) -> (String, Vec<String>) {
        let opts = &self.options;
        if cfg!(target_os = "windows") {
            let program = opts.program.clone().unwrap_or_else(|| "wsay".to_string());
            let args = vec![
                "-V".to_string(),
                opts.volume.to_string(),
                "-v".to_string(),
                opts.voice.clone(),
                text.to_string(),
            ];
            (program, args)
        } else {
            let program = opts.program.clone().unwrap_or_else(|| "espeak".to_string());
            let args = vec![
                format!("-a{}", opts.volume),
                format!("-v{}", opts.voice),
                text.to_string(),
            ];
            (program, args)
        }
    }

    fn say(program: String, args: Vec<String>, lock: Arc<Mutex<()>>) {
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match Command::new(&program).args(&args).output() {
            Ok(output) if output.status.success() => debug!(program = %program, "Spoke notification"),
            Ok(output) => warn!(program = %program, status = %output.status, "Speech program exited with failure"),
            Err(e) => warn!(program = %program, error = %e, "Could not run speech program"),
        }
    }
}

impl NotifySink for SpeechSink {
    fn notify(&self, title: &str, body: &str) {
        let (program, args) = self.command_line(&format!("{}. {}", title, body));
        let lock = Arc::clone(&self.say_lock);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || Self::say(program, args, lock));
            }
            Err(_) => {
                std::thread::spawn(move || Self::say(program, args, lock));
            }
        }
    }
}
