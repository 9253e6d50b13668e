use crate::client::server_endpoint;
use crate::wire::HistoryResponse;
use voicechat_core::types::{ChatMessage, ThreadId};
use voicechat_providers::request::HttpRequest;
use voicechat_providers::runtime::execute;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOutcome {
    Loaded(Vec<ChatMessage>),
    /// The server no longer knows the thread (or answered with a page instead of data).
    Expired { reason: String },
    /// Transport or decode failure; the thread may still exist.
    Unavailable(String),
}

impl HistoryOutcome {
    pub fn messages(&self) -> &[ChatMessage] {
        match self {
            HistoryOutcome::Loaded(m) => m,
            _ => &[],
        }
    }

    /// Every failed load starts a fresh session.
    pub fn should_reset(&self) -> bool {
        !matches!(self, HistoryOutcome::Loaded(_))
    }
}

/// Restores a thread's transcript from the relay server on startup.
#[derive(Debug, Clone)]
pub struct ChatHistoryLoader {
    base_url: String,
}

impl ChatHistoryLoader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub async fn load(&self, thread: &ThreadId) -> HistoryOutcome {
        let url = match server_endpoint(&self.base_url, &["chat", "history", thread.as_str()]) {
            Ok(u) => u,
            Err(e) => return HistoryOutcome::Unavailable(format!("{e:#}")),
        };

        let resp = match execute(&HttpRequest::get(url)).await {
            Ok(r) => r,
            Err(e) => {
                log::warn!("history fetch failed for {thread}: {e:#}");
                return HistoryOutcome::Unavailable(format!("{e:#}"));
            }
        };

        // Checked before the status: an HTML body is never decoded.
        if resp.is_markup() {
            log::info!("history for {thread} came back as markup; treating as expired");
            return HistoryOutcome::Expired {
                reason: "server returned markup instead of history".into(),
            };
        }
        if !resp.is_success() {
            log::info!("history for {thread} returned status {}", resp.status);
            return HistoryOutcome::Expired {
                reason: format!("status {}", resp.status),
            };
        }

        match serde_json::from_slice::<HistoryResponse>(&resp.body) {
            Ok(h) => HistoryOutcome::Loaded(h.messages),
            Err(e) => HistoryOutcome::Unavailable(format!("decode history JSON: {e}")),
        }
    }
}
