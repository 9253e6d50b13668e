use crate::traits::{
    EngineFault, Generation, RecognitionEngine, RecognitionErrorKind, RecognitionEvent,
    RecognitionEventKind,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use voicechat_core::config::{RecognitionConfig, WakeConfig};
use voicechat_core::wake::{GateState, WakeWordGate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    #[default]
    Stopped,
    Starting,
    Listening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecognitionSession {
    pub engine_state: EngineState,
    pub gate_state: GateState,
    pub desired_listening: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    #[error("speech recognition unavailable: {0}")]
    Unavailable(String),
    #[error("microphone permission is required")]
    PermissionRequired,
    #[error("speech recognition interrupted ({0:?})")]
    Interrupted(RecognitionErrorKind),
}

impl RecognitionError {
    /// `PermissionRequired` needs outside consent; everything else may be retried by the user.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, RecognitionError::PermissionRequired)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// Event from an engine instance this session no longer owns.
    Stale,
    Ignored,
    WakeDetected,
    Command(String),
    Restarted,
    Stopped,
}

/// Owns the recognition engine and keeps it listening while the user wants it to.
///
/// Every start attempt, deactivation and error advances the generation, so
/// callbacks from an instance the session has moved past are dropped.
pub struct RecognitionSessionManager {
    engine: Box<dyn RecognitionEngine>,
    gate: WakeWordGate,
    restart_delay: Duration,
    state: RecognitionSession,
    generation: Generation,
}

impl RecognitionSessionManager {
    pub fn new(
        engine: Box<dyn RecognitionEngine>,
        recognition: &RecognitionConfig,
        wake: &WakeConfig,
    ) -> Self {
        Self {
            engine,
            gate: WakeWordGate::new(wake),
            restart_delay: recognition.restart_delay(),
            state: RecognitionSession::default(),
            generation: Generation::default(),
        }
    }

    pub fn state(&self) -> RecognitionSession {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub async fn activate(&mut self) -> Result<(), RecognitionError> {
        if self.state.engine_state != EngineState::Stopped {
            log::debug!("activate ignored: already {:?}", self.state.engine_state);
            return Ok(());
        }

        self.state.desired_listening = true;
        self.state.gate_state = GateState::WaitingForWakeWord;
        self.set_engine_state(EngineState::Starting);

        match self.start_engine() {
            Ok(()) => {}
            Err(EngineFault::AlreadyActive) => {
                // A previous instance is still alive: stop it, wait, try once more.
                log::warn!("recognition engine already active; restarting");
                if let Err(e) = self.engine.stop() {
                    log::debug!("stop before restart: {e}");
                }
                tokio::time::sleep(self.restart_delay).await;
                if let Err(e) = self.start_engine() {
                    return Err(self.give_up(e));
                }
            }
            Err(e) => return Err(self.give_up(e)),
        }

        self.set_engine_state(EngineState::Listening);
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.state.desired_listening = false;
        self.state.gate_state = GateState::WaitingForWakeWord;
        self.generation = self.generation.next();

        if self.state.engine_state != EngineState::Stopped {
            if let Err(e) = self.engine.stop() {
                log::debug!("stop on deactivate: {e}");
            }
            self.set_engine_state(EngineState::Stopped);
        }
    }

    pub fn handle_event(
        &mut self,
        event: RecognitionEvent,
    ) -> Result<RecognitionOutcome, RecognitionError> {
        if event.generation != self.generation {
            log::debug!(
                "dropping stale recognition event (gen {} != {})",
                event.generation.0,
                self.generation.0
            );
            return Ok(RecognitionOutcome::Stale);
        }

        match event.kind {
            RecognitionEventKind::Transcript(text) => Ok(self.on_transcript(&text)),
            RecognitionEventKind::Ended => self.on_ended(),
            RecognitionEventKind::Error(kind) => Err(self.on_error(kind)),
        }
    }

    fn on_transcript(&mut self, text: &str) -> RecognitionOutcome {
        let before = self.state.gate_state;
        let decision = self.gate.classify(text, before);
        self.state.gate_state = decision.next;

        match decision.command {
            Some(command) => RecognitionOutcome::Command(command),
            None if before == GateState::WaitingForWakeWord && decision.next == GateState::Active => {
                log::info!("wake phrase detected");
                RecognitionOutcome::WakeDetected
            }
            None => RecognitionOutcome::Ignored,
        }
    }

    fn on_ended(&mut self) -> Result<RecognitionOutcome, RecognitionError> {
        if !self.state.desired_listening {
            self.set_engine_state(EngineState::Stopped);
            return Ok(RecognitionOutcome::Stopped);
        }

        // Continuous mode still ends on silence; keep listening.
        self.set_engine_state(EngineState::Starting);
        match self.start_engine() {
            Ok(()) => {
                self.set_engine_state(EngineState::Listening);
                Ok(RecognitionOutcome::Restarted)
            }
            Err(e) => Err(self.give_up(e)),
        }
    }

    fn on_error(&mut self, kind: RecognitionErrorKind) -> RecognitionError {
        log::warn!("recognition error: {kind:?}");
        self.generation = self.generation.next();
        self.state.desired_listening = false;
        self.state.gate_state = GateState::WaitingForWakeWord;
        if let Err(e) = self.engine.stop() {
            log::debug!("stop after error: {e}");
        }
        self.set_engine_state(EngineState::Stopped);

        match kind {
            RecognitionErrorKind::PermissionDenied => RecognitionError::PermissionRequired,
            other => RecognitionError::Interrupted(other),
        }
    }

    fn start_engine(&mut self) -> Result<(), EngineFault> {
        self.generation = self.generation.next();
        self.engine.start(self.generation)
    }

    fn give_up(&mut self, fault: EngineFault) -> RecognitionError {
        log::error!("recognition engine failed to start: {fault}");
        self.state.desired_listening = false;
        self.set_engine_state(EngineState::Stopped);
        RecognitionError::Unavailable(fault.to_string())
    }

    fn set_engine_state(&mut self, next: EngineState) {
        let prev = self.state.engine_state;
        self.state.engine_state = next;
        if prev != next {
            log::info!("recognition: {prev:?} -> {next:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullEngine;

    impl RecognitionEngine for NullEngine {
        fn start(&mut self, _generation: Generation) -> Result<(), EngineFault> {
            Ok(())
        }

        fn stop(&mut self) -> Result<(), EngineFault> {
            Ok(())
        }
    }

    fn manager() -> RecognitionSessionManager {
        RecognitionSessionManager::new(
            Box::new(NullEngine),
            &RecognitionConfig::default(),
            &WakeConfig::default(),
        )
    }

    #[test]
    fn starts_stopped_and_idle() {
        let m = manager();
        assert_eq!(m.state(), RecognitionSession::default());
    }

    #[tokio::test]
    async fn wake_then_command_round_trip() {
        let mut m = manager();
        m.activate().await.unwrap();
        let g = m.generation();

        assert_eq!(
            m.handle_event(RecognitionEvent::transcript(g, "Hey there assistant")),
            Ok(RecognitionOutcome::WakeDetected)
        );
        assert_eq!(
            m.handle_event(RecognitionEvent::transcript(g, " What Time Is It ")),
            Ok(RecognitionOutcome::Command("what time is it".into()))
        );
        assert_eq!(m.state().gate_state, GateState::WaitingForWakeWord);
    }

    #[tokio::test]
    async fn deactivate_is_idempotent() {
        let mut m = manager();
        m.activate().await.unwrap();
        m.deactivate();
        m.deactivate();
        assert_eq!(m.state().engine_state, EngineState::Stopped);
        assert!(!m.state().desired_listening);
    }

    #[test]
    fn permission_is_the_only_fatal_error() {
        assert!(!RecognitionError::PermissionRequired.is_recoverable());
        assert!(RecognitionError::Unavailable("x".into()).is_recoverable());
        assert!(RecognitionError::Interrupted(RecognitionErrorKind::NetworkError).is_recoverable());
    }
}
