use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use voicechat_core::types::{MessageOrder, Run, RunId, ThreadId, ThreadMessage};

/// Remote conversation service, consumed as an opaque capability.
///
/// The assistant identity a run is bound to belongs to the implementation's
/// configuration, not to the caller.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    async fn create_thread(&self) -> anyhow::Result<ThreadId>;
    async fn retrieve_thread(&self, thread: &ThreadId) -> anyhow::Result<ThreadId>;
    async fn append_user_message(&self, thread: &ThreadId, content: &str) -> anyhow::Result<()>;
    async fn create_run(&self, thread: &ThreadId) -> anyhow::Result<Run>;
    async fn get_run(&self, thread: &ThreadId, run: &RunId) -> anyhow::Result<Run>;
    /// Asks the service to stop a run that is still queued or in progress.
    async fn cancel_run(&self, thread: &ThreadId, run: &RunId) -> anyhow::Result<()>;
    async fn list_messages(
        &self,
        thread: &ThreadId,
        order: MessageOrder,
    ) -> anyhow::Result<Vec<ThreadMessage>>;
}

/// Tags every event of one engine instance so stale callbacks can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineFault {
    #[error("recognition engine is already active")]
    AlreadyActive,
    #[error("recognition engine is not active")]
    NotActive,
    #[error("recognition engine unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionErrorKind {
    PermissionDenied,
    NoSpeechTimeout,
    NetworkError,
    Aborted,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEventKind {
    Transcript(String),
    Ended,
    Error(RecognitionErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionEvent {
    pub generation: Generation,
    pub kind: RecognitionEventKind,
}

impl RecognitionEvent {
    pub fn transcript(generation: Generation, text: impl Into<String>) -> Self {
        Self {
            generation,
            kind: RecognitionEventKind::Transcript(text.into()),
        }
    }

    pub fn ended(generation: Generation) -> Self {
        Self {
            generation,
            kind: RecognitionEventKind::Ended,
        }
    }

    pub fn error(generation: Generation, kind: RecognitionErrorKind) -> Self {
        Self {
            generation,
            kind: RecognitionEventKind::Error(kind),
        }
    }
}

/// Continuous speech-to-text engine.
///
/// Offers no "is running" query; the session manager tracks that itself.
/// Events are delivered out of band and must carry the generation passed to
/// the `start` call that created the emitting instance.
pub trait RecognitionEngine: Send {
    fn start(&mut self, generation: Generation) -> Result<(), EngineFault>;
    fn stop(&mut self) -> Result<(), EngineFault>;
}
