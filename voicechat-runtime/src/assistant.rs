use anyhow::anyhow;
use voicechat_core::types::{MessageOrder, Run, RunId, ThreadId, ThreadMessage};
use voicechat_engine::traits::AssistantBackend;
use voicechat_providers::assistants::{
    AssistantsApiConfig, build_cancel_run_request, build_create_message_request,
    build_create_run_request, build_create_thread_request, build_list_messages_request,
    build_retrieve_run_request, build_retrieve_thread_request,
};
use voicechat_providers::parse::{MessagePage, parse_message_page, parse_run, parse_thread};
use voicechat_providers::request::HttpRequest;
use voicechat_providers::runtime::{HttpResponse, execute};

const MESSAGE_PAGE_LIMIT: u32 = 100;
// Upper bound on pages followed for one full transcript.
const MAX_MESSAGE_PAGES: usize = 100;

/// `AssistantBackend` over the hosted Assistants HTTP API.
#[derive(Clone)]
pub struct OpenAiAssistantBackend {
    api: AssistantsApiConfig,
    assistant_id: String,
}

impl std::fmt::Debug for OpenAiAssistantBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAssistantBackend")
            .field("api", &self.api)
            .field("assistant_id", &self.assistant_id)
            .finish()
    }
}

impl OpenAiAssistantBackend {
    pub fn new(api: AssistantsApiConfig, assistant_id: impl Into<String>) -> Self {
        Self {
            api,
            assistant_id: assistant_id.into(),
        }
    }

    async fn send(&self, req: HttpRequest, what: &str) -> anyhow::Result<HttpResponse> {
        let resp = execute(&req).await?;
        if !resp.is_success() {
            return Err(anyhow!(
                "{what} failed: status={} body={}",
                resp.status,
                resp.body_text()
            ));
        }
        Ok(resp)
    }

    async fn message_page(
        &self,
        thread: &ThreadId,
        order: MessageOrder,
        after: Option<&str>,
    ) -> anyhow::Result<MessagePage> {
        let req = build_list_messages_request(
            &self.api,
            thread.as_str(),
            order,
            MESSAGE_PAGE_LIMIT,
            after,
        )?;
        let resp = self.send(req, "list messages").await?;
        parse_message_page(&resp.body)
    }
}

#[async_trait::async_trait]
impl AssistantBackend for OpenAiAssistantBackend {
    async fn create_thread(&self) -> anyhow::Result<ThreadId> {
        let req = build_create_thread_request(&self.api)?;
        let resp = self.send(req, "create thread").await?;
        parse_thread(&resp.body)
    }

    async fn retrieve_thread(&self, thread: &ThreadId) -> anyhow::Result<ThreadId> {
        let req = build_retrieve_thread_request(&self.api, thread.as_str())?;
        let resp = self.send(req, "retrieve thread").await?;
        parse_thread(&resp.body)
    }

    async fn append_user_message(&self, thread: &ThreadId, content: &str) -> anyhow::Result<()> {
        let req = build_create_message_request(&self.api, thread.as_str(), content)?;
        self.send(req, "create message").await?;
        Ok(())
    }

    async fn create_run(&self, thread: &ThreadId) -> anyhow::Result<Run> {
        let req = build_create_run_request(&self.api, thread.as_str(), &self.assistant_id)?;
        let resp = self.send(req, "create run").await?;
        parse_run(&resp.body)
    }

    async fn get_run(&self, thread: &ThreadId, run: &RunId) -> anyhow::Result<Run> {
        let req = build_retrieve_run_request(&self.api, thread.as_str(), run.as_str())?;
        let resp = self.send(req, "retrieve run").await?;
        parse_run(&resp.body)
    }

    async fn cancel_run(&self, thread: &ThreadId, run: &RunId) -> anyhow::Result<()> {
        let req = build_cancel_run_request(&self.api, thread.as_str(), run.as_str())?;
        self.send(req, "cancel run").await?;
        Ok(())
    }

    /// Newest-first listings stop after the first page; that is where a reply lives.
    /// Oldest-first listings follow the cursor to the end of the thread.
    async fn list_messages(
        &self,
        thread: &ThreadId,
        order: MessageOrder,
    ) -> anyhow::Result<Vec<ThreadMessage>> {
        let mut page = self.message_page(thread, order, None).await?;
        if order == MessageOrder::NewestFirst {
            return Ok(page.messages);
        }

        let mut out = Vec::new();
        for _ in 1..MAX_MESSAGE_PAGES {
            let cursor = page.next_cursor().map(str::to_owned);
            out.append(&mut page.messages);
            let Some(cursor) = cursor else {
                return Ok(out);
            };
            page = self.message_page(thread, order, Some(&cursor)).await?;
        }
        out.append(&mut page.messages);
        log::warn!("thread {thread} has more than {MAX_MESSAGE_PAGES} pages; transcript truncated");
        Ok(out)
    }
}
