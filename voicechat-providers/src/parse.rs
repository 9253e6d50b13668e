use anyhow::Context;
use serde::Deserialize;
use voicechat_core::types::{Role, Run, RunId, RunStatus, ThreadId, ThreadMessage};

#[derive(Debug, Deserialize)]
struct ThreadObject {
    id: String,
}

pub fn parse_thread(body: &[u8]) -> anyhow::Result<ThreadId> {
    let thread: ThreadObject = serde_json::from_slice(body).context("decode thread JSON")?;
    Ok(ThreadId(thread.id))
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    status: RunStatus,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub fn parse_run(body: &[u8]) -> anyhow::Result<Run> {
    let run: RunObject = serde_json::from_slice(body).context("decode run JSON")?;
    let last_error = run
        .last_error
        .and_then(|e| e.message.or(e.code))
        .filter(|m| !m.trim().is_empty());
    Ok(Run {
        id: RunId(run.id),
        status: run.status,
        last_error,
    })
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<MessageObject>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

/// Messages of one list page plus the cursor for the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePage {
    pub messages: Vec<ThreadMessage>,
    pub has_more: bool,
    pub last_id: Option<String>,
}

impl MessagePage {
    /// Cursor for the following page, if the server says there is one.
    pub fn next_cursor(&self) -> Option<&str> {
        if !self.has_more {
            return None;
        }
        self.last_id
            .as_deref()
            .or_else(|| self.messages.last().map(|m| m.id.as_str()))
    }
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    id: String,
    role: Role,
    #[serde(default)]
    content: Vec<ContentPart>,
    #[serde(default)]
    run_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    value: String,
}

/// Decodes a message page, preserving the order the server returned.
///
/// Non-text content parts (images, files) are skipped; multiple text parts are
/// joined with a newline.
pub fn parse_message_page(body: &[u8]) -> anyhow::Result<MessagePage> {
    let list: MessageList = serde_json::from_slice(body).context("decode message list JSON")?;
    let messages = list
        .data
        .into_iter()
        .map(|m| {
            let text = m
                .content
                .into_iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.value),
                    ContentPart::Other => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            ThreadMessage {
                id: m.id,
                role: m.role,
                text,
                run_id: m.run_id.map(RunId),
            }
        })
        .collect();
    Ok(MessagePage {
        messages,
        has_more: list.has_more,
        last_id: list.last_id,
    })
}
