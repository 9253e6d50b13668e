use crate::config::{WakeConfig, WakeRevertPolicy};
use crate::text::normalize_transcript;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    #[default]
    WaitingForWakeWord,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub next: GateState,
    pub command: Option<String>,
}

/// Decides whether an utterance arms the gate or is a command to forward.
///
/// Classification is a pure function of `(transcript, state)`; the gate
/// itself only holds the configured tokens and revert policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeWordGate {
    wake_token: String,
    trigger_token: String,
    revert: WakeRevertPolicy,
}

impl WakeWordGate {
    pub fn new(cfg: &WakeConfig) -> Self {
        Self {
            wake_token: normalize_transcript(&cfg.wake_token),
            trigger_token: normalize_transcript(&cfg.trigger_token),
            revert: cfg.revert,
        }
    }

    pub fn classify(&self, transcript: &str, state: GateState) -> GateDecision {
        let text = normalize_transcript(transcript);

        match state {
            GateState::WaitingForWakeWord => {
                let next = if self.is_wake_phrase(&text) {
                    GateState::Active
                } else {
                    GateState::WaitingForWakeWord
                };
                GateDecision {
                    next,
                    command: None,
                }
            }
            GateState::Active if text.is_empty() => GateDecision {
                next: GateState::Active,
                command: None,
            },
            GateState::Active => {
                let next = match self.revert {
                    WakeRevertPolicy::AfterEachCommand => GateState::WaitingForWakeWord,
                    WakeRevertPolicy::StayActive => GateState::Active,
                };
                GateDecision {
                    next,
                    command: Some(text),
                }
            }
        }
    }

    fn is_wake_phrase(&self, text: &str) -> bool {
        // Both tokens must appear; order and adjacency don't matter.
        !self.wake_token.is_empty()
            && !self.trigger_token.is_empty()
            && text.contains(&self.wake_token)
            && text.contains(&self.trigger_token)
    }
}

impl Default for WakeWordGate {
    fn default() -> Self {
        Self::new(&WakeConfig::default())
    }
}
