use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use voicechat_core::config::AppConfig;
use voicechat_core::text::is_blank;
use voicechat_core::types::{ChatMessage, ThreadId};
use voicechat_runtime::defaults::state_path;
use voicechat_runtime::{ChatClient, ChatHistoryLoader, ClientState, HistoryOutcome, TranscriptStore};

// Headroom over the server's run deadline for the relay's own requests.
const CHAT_TIMEOUT_MARGIN: Duration = Duration::from_secs(30);

/// Shown in place of a reply when a turn fails for any reason.
pub const APOLOGY_MESSAGE: &str = "Error: Unable to connect to the server. Please try again later.";

/// Client-side conversation: transcript, current thread, and persistence.
///
/// Cheap to clone; clones share the same conversation.
#[derive(Clone)]
pub struct ChatService {
    client: ChatClient,
    loader: ChatHistoryLoader,
    store: TranscriptStore,
    state: Arc<Mutex<ClientState>>,
    // One turn at a time, so a new thread id is known before the next send.
    turn: Arc<Mutex<()>>,
}

impl ChatService {
    pub fn new(client: ChatClient, loader: ChatHistoryLoader, store: TranscriptStore) -> Self {
        Self {
            client,
            loader,
            store,
            state: Arc::new(Mutex::new(ClientState::default())),
            turn: Arc::new(Mutex::new(())),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        let base = cfg.client.server_url.clone();
        Self::new(
            ChatClient::new(base.clone())
                .with_timeout(cfg.polling.max_wait() + CHAT_TIMEOUT_MARGIN),
            ChatHistoryLoader::new(base),
            TranscriptStore::at_path(state_path(cfg))
                .with_max_messages(cfg.client.max_transcript_messages),
        )
    }

    /// Loads persisted state and, when a thread is remembered, refreshes it from the server.
    ///
    /// Returns `None` when there was no thread to check. Any failed history
    /// load discards the thread and transcript so the next turn starts fresh.
    pub async fn restore(&self) -> anyhow::Result<Option<HistoryOutcome>> {
        let local = match self.store.load() {
            Ok(s) => s,
            Err(e) => {
                log::warn!("discarding unreadable client state: {e:#}");
                ClientState::default()
            }
        };

        let Some(thread) = local.thread_id.clone() else {
            *self.state.lock().await = local;
            return Ok(None);
        };

        let outcome = self.loader.load(&thread).await;
        let next = match &outcome {
            HistoryOutcome::Loaded(messages) => {
                log::info!("restored {} messages for {thread}", messages.len());
                ClientState {
                    thread_id: Some(thread),
                    messages: messages.clone(),
                }
            }
            other => {
                log::info!("starting a fresh session: {other:?}");
                self.store.clear()?;
                ClientState::default()
            }
        };

        *self.state.lock().await = next;
        if !outcome.should_reset() {
            self.persist().await;
        }
        Ok(Some(outcome))
    }

    /// Sends one user utterance and appends the reply (or the apology) to the transcript.
    ///
    /// Blank input is ignored and returns `None`.
    pub async fn send_text(&self, text: &str) -> Option<ChatMessage> {
        if is_blank(text) {
            return None;
        }
        let _turn = self.turn.lock().await;

        let thread = {
            let mut state = self.state.lock().await;
            state.messages.push(ChatMessage::user(text));
            state.thread_id.clone()
        };
        self.persist().await;

        let reply = match self.client.send(text, thread.as_ref()).await {
            Ok(resp) => {
                let mut state = self.state.lock().await;
                state.thread_id = Some(resp.thread_id);
                ChatMessage::assistant(resp.message)
            }
            Err(e) => {
                log::warn!("chat turn failed: {e:#}");
                ChatMessage::assistant(APOLOGY_MESSAGE)
            }
        };

        self.state.lock().await.messages.push(reply.clone());
        self.persist().await;
        Some(reply)
    }

    /// Forgets the thread and the transcript together.
    pub async fn clear(&self) -> anyhow::Result<()> {
        let _turn = self.turn.lock().await;
        *self.state.lock().await = ClientState::default();
        self.store.clear()
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.state.lock().await.messages.clone()
    }

    pub async fn thread_id(&self) -> Option<ThreadId> {
        self.state.lock().await.thread_id.clone()
    }

    async fn persist(&self) {
        let snapshot = self.state.lock().await.clone();
        // Best-effort: a failed write must not fail the turn.
        if let Err(e) = self.store.save(&snapshot) {
            log::warn!("failed to persist client state: {e:#}");
        }
    }
}
