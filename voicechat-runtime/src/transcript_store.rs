use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use voicechat_core::config::DEFAULT_MAX_TRANSCRIPT_MESSAGES;
use voicechat_core::types::{ChatMessage, ThreadId};

use crate::fsutil::{remove_if_exists, write_atomic};

/// What the client remembers between launches.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientState {
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone)]
pub struct TranscriptStore {
    path: PathBuf,
    max_messages: usize,
}

impl TranscriptStore {
    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            max_messages: DEFAULT_MAX_TRANSCRIPT_MESSAGES,
        }
    }

    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = max.max(1);
        self
    }

    pub fn load(&self) -> anyhow::Result<ClientState> {
        if !self.path.exists() {
            return Ok(ClientState::default());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read state: {}", self.path.display()))?;
        let state: ClientState = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse state: {}", self.path.display()))?;
        Ok(state)
    }

    pub fn save(&self, state: &ClientState) -> anyhow::Result<()> {
        let mut state = state.clone();
        if state.messages.len() > self.max_messages {
            let start = state.messages.len() - self.max_messages;
            state.messages = state.messages.split_off(start);
        }

        let json = serde_json::to_vec_pretty(&state).context("encode state JSON")?;
        write_atomic(&self.path, &json)
            .with_context(|| format!("failed to save state: {}", self.path.display()))
    }

    /// Thread id and transcript go together.
    pub fn clear(&self) -> anyhow::Result<()> {
        remove_if_exists(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
