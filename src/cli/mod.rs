use crate::chat::stream::{ Delivery, TypewriterConfig };
use crate::store::settings::{ Language, ResponseMode };
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Backend Args ---
    /// Base URL of the SATYAM AI backend API
    #[arg(long, env = "SATYAM_API_URL", default_value = "http://127.0.0.1:8000")]
    pub api_base_url: String,

    /// Transport timeout for backend requests, in seconds
    #[arg(long, env = "SATYAM_TIMEOUT_SECS", default_value = "120")]
    pub timeout_secs: u64,

    // --- Credential Args ---
    /// File holding the signed-in token and user. Defaults to <config dir>/satyam-chat/credentials.json
    #[arg(long, env = "SATYAM_CREDENTIALS_PATH")]
    pub credentials_path: Option<PathBuf>,

    // --- Conversation Args ---
    /// Answer language (en, hi)
    #[arg(long, env = "SATYAM_LANGUAGE", default_value = "en")]
    pub language: Language,

    /// Answer style (simple, professional)
    #[arg(long, env = "SATYAM_MODE", default_value = "simple")]
    pub mode: ResponseMode,

    /// Print each answer at once instead of replaying it as typed text
    #[arg(long, env = "SATYAM_NO_TYPEWRITER", default_value = "false")]
    pub no_typewriter: bool,

    /// Shortest pause between typed slices, in milliseconds
    #[arg(long, env = "SATYAM_TYPING_MIN_DELAY_MS", default_value = "10")]
    pub typing_min_delay_ms: u64,

    /// Longest pause between typed slices, in milliseconds
    #[arg(long, env = "SATYAM_TYPING_MAX_DELAY_MS", default_value = "30")]
    pub typing_max_delay_ms: u64,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}

impl Args {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn resolved_credentials_path(&self) -> PathBuf {
        match &self.credentials_path {
            Some(path) => path.clone(),
            None =>
                dirs
                    ::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("satyam-chat")
                    .join("credentials.json"),
        }
    }

    pub fn delivery(&self) -> Delivery {
        if self.no_typewriter {
            return Delivery::Whole;
        }
        Delivery::Typewriter(TypewriterConfig {
            min_delay: Duration::from_millis(self.typing_min_delay_ms),
            max_delay: Duration::from_millis(self.typing_max_delay_ms),
            ..TypewriterConfig::default()
        })
    }
}
