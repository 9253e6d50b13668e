pub mod assistant;
pub mod client;
pub mod config_store;
pub mod defaults;
pub mod fsutil;
pub mod history;
pub mod recognizer;
pub mod transcript_store;
pub mod wire;

pub use assistant::OpenAiAssistantBackend;
pub use client::ChatClient;
pub use config_store::ConfigStore;
pub use history::{ChatHistoryLoader, HistoryOutcome};
pub use recognizer::{LoopbackHandle, LoopbackRecognizer};
pub use transcript_store::{ClientState, TranscriptStore};
