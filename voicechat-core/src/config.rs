use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub polling: PollConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub wake: WakeConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8081".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub base_url: String,
    pub assistant_id: String,

    // The API key is never stored in config at rest.
    #[serde(default)]
    pub api_key_present: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            assistant_id: String::new(),
            api_key_present: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    // Growth per poll in milli-units (1500 = x1.5). Stored as an integer to keep the config `Eq`.
    pub backoff_milli: u32,
    pub max_wait_ms: u64,
}

/// Shortest gap allowed between two run-status requests.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

impl PollConfig {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    pub fn max_interval(&self) -> Duration {
        self.initial_interval().max(Duration::from_millis(self.max_interval_ms))
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1_000,
            max_interval_ms: 5_000,
            backoff_milli: 1_500,
            max_wait_ms: 120_000,
        }
    }
}

/// Fixed speech engine settings; not changeable while the engine runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionConfig {
    pub continuous: bool,
    pub interim_results: bool,
    pub language: String,
    pub restart_delay_ms: u64,
    /// Start listening as soon as the client has restored its session.
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
}

fn default_auto_start() -> bool {
    true
}

impl RecognitionConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: false,
            language: "en-US".into(),
            restart_delay_ms: 250,
            auto_start: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeRevertPolicy {
    #[default]
    AfterEachCommand,
    StayActive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeConfig {
    pub wake_token: String,
    pub trigger_token: String,
    #[serde(default)]
    pub revert: WakeRevertPolicy,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            wake_token: "hey".into(),
            trigger_token: "assistant".into(),
            revert: WakeRevertPolicy::AfterEachCommand,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server_url: String,
    #[serde(default)]
    pub state_path: Option<String>,
    /// Oldest messages beyond this count are dropped when the transcript is saved.
    #[serde(default = "default_max_transcript_messages")]
    pub max_transcript_messages: usize,
}

pub const DEFAULT_MAX_TRANSCRIPT_MESSAGES: usize = 500;

fn default_max_transcript_messages() -> usize {
    DEFAULT_MAX_TRANSCRIPT_MESSAGES
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8081".into(),
            state_path: None,
            max_transcript_messages: DEFAULT_MAX_TRANSCRIPT_MESSAGES,
        }
    }
}
