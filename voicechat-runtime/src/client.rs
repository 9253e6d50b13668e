use crate::wire::{ChatRequest, ChatResponse, ErrorResponse};
use anyhow::{Context, anyhow};
use std::time::Duration;
use url::Url;
use voicechat_core::types::ThreadId;
use voicechat_providers::request::HttpRequest;
use voicechat_providers::runtime::execute_with_timeout;

// One turn may legitimately take as long as the server's run deadline.
const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(150);

/// Talks to the relay server's `/chat` endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    base_url: String,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TURN_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn send(
        &self,
        message: &str,
        thread_id: Option<&ThreadId>,
    ) -> anyhow::Result<ChatResponse> {
        let url = server_endpoint(&self.base_url, &["chat"])?;
        let body = serde_json::to_value(ChatRequest {
            message: message.to_string(),
            thread_id: thread_id.cloned(),
        })
        .context("encode chat request")?;

        let resp = execute_with_timeout(&HttpRequest::post_json(url, &body), self.timeout).await?;
        if !resp.is_success() {
            let detail = serde_json::from_slice::<ErrorResponse>(&resp.body)
                .map(|e| format!("{}: {}", e.error, e.details))
                .unwrap_or_else(|_| resp.body_text());
            return Err(anyhow!("chat failed: status={} {detail}", resp.status));
        }

        serde_json::from_slice(&resp.body).context("decode chat response JSON")
    }
}

/// Joins path segments onto the server base url, percent-encoding each one.
pub(crate) fn server_endpoint(base: &str, segments: &[&str]) -> anyhow::Result<String> {
    let mut url = Url::parse(base).with_context(|| format!("invalid server url: {base}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("server url cannot be a base: {base}"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_path() {
        assert_eq!(
            server_endpoint("http://127.0.0.1:8081/api/", &["chat"]).unwrap(),
            "http://127.0.0.1:8081/api/chat"
        );
        assert_eq!(
            server_endpoint("http://localhost:8081", &["chat", "history", "a/b"]).unwrap(),
            "http://localhost:8081/chat/history/a%2Fb"
        );
    }
}
