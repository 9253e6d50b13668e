use crate::request::HttpRequest;
use anyhow::{Context, anyhow};
use serde_json::json;
use url::Url;
use voicechat_core::types::MessageOrder;

const BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

#[derive(Clone, PartialEq, Eq)]
pub struct AssistantsApiConfig {
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for AssistantsApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantsApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

fn order_query(order: MessageOrder) -> &'static str {
    match order {
        MessageOrder::NewestFirst => "desc",
        MessageOrder::OldestFirst => "asc",
    }
}

pub fn build_create_thread_request(cfg: &AssistantsApiConfig) -> anyhow::Result<HttpRequest> {
    let url = endpoint(&cfg.base_url, &["threads"])?;
    Ok(authorized(HttpRequest::post_json(url, &json!({})), cfg))
}

pub fn build_retrieve_thread_request(
    cfg: &AssistantsApiConfig,
    thread_id: &str,
) -> anyhow::Result<HttpRequest> {
    let url = endpoint(&cfg.base_url, &["threads", thread_id])?;
    Ok(authorized(HttpRequest::get(url), cfg))
}

pub fn build_create_message_request(
    cfg: &AssistantsApiConfig,
    thread_id: &str,
    content: &str,
) -> anyhow::Result<HttpRequest> {
    let url = endpoint(&cfg.base_url, &["threads", thread_id, "messages"])?;
    let payload = json!({
        "role": "user",
        "content": content,
    });
    Ok(authorized(HttpRequest::post_json(url, &payload), cfg))
}

pub fn build_create_run_request(
    cfg: &AssistantsApiConfig,
    thread_id: &str,
    assistant_id: &str,
) -> anyhow::Result<HttpRequest> {
    if assistant_id.trim().is_empty() {
        return Err(anyhow!("missing assistant id"));
    }
    let url = endpoint(&cfg.base_url, &["threads", thread_id, "runs"])?;
    let payload = json!({ "assistant_id": assistant_id });
    Ok(authorized(HttpRequest::post_json(url, &payload), cfg))
}

pub fn build_retrieve_run_request(
    cfg: &AssistantsApiConfig,
    thread_id: &str,
    run_id: &str,
) -> anyhow::Result<HttpRequest> {
    let url = endpoint(&cfg.base_url, &["threads", thread_id, "runs", run_id])?;
    Ok(authorized(HttpRequest::get(url), cfg))
}

pub fn build_cancel_run_request(
    cfg: &AssistantsApiConfig,
    thread_id: &str,
    run_id: &str,
) -> anyhow::Result<HttpRequest> {
    let url = endpoint(&cfg.base_url, &["threads", thread_id, "runs", run_id, "cancel"])?;
    Ok(authorized(HttpRequest::post_json(url, &json!({})), cfg))
}

/// One page of a thread's messages. `after` is the last message id of the previous page.
pub fn build_list_messages_request(
    cfg: &AssistantsApiConfig,
    thread_id: &str,
    order: MessageOrder,
    limit: u32,
    after: Option<&str>,
) -> anyhow::Result<HttpRequest> {
    let mut url = Url::parse(&endpoint(&cfg.base_url, &["threads", thread_id, "messages"])?)
        .context("parse list messages url")?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("order", order_query(order))
            .append_pair("limit", &limit.clamp(1, 100).to_string());
        if let Some(after) = after {
            query.append_pair("after", after);
        }
    }
    Ok(authorized(HttpRequest::get(url.to_string()), cfg))
}

fn authorized(req: HttpRequest, cfg: &AssistantsApiConfig) -> HttpRequest {
    req.with_header("Authorization", format!("Bearer {}", cfg.api_key))
        .with_header(BETA_HEADER.0, BETA_HEADER.1)
}

// Ids come from callers (and ultimately from HTTP paths), so every segment is percent-encoded.
fn endpoint(base: &str, segments: &[&str]) -> anyhow::Result<String> {
    let mut url = Url::parse(base).with_context(|| format!("invalid base url: {base}"))?;
    if segments.iter().any(|s| s.trim().is_empty()) {
        return Err(anyhow!("empty path segment"));
    }
    url.path_segments_mut()
        .map_err(|_| anyhow!("base url cannot be a base: {base}"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.to_string())
}
