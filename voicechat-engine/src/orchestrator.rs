use crate::polling::{PollPolicy, ms};
use crate::traits::AssistantBackend;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use voicechat_core::text::is_blank;
use voicechat_core::types::{ChatMessage, MessageOrder, Role, Run, RunId, RunStatus, ThreadId};

pub const STAGE_RESOLVING_THREAD: &str = "resolving_thread";
pub const STAGE_APPENDING_MESSAGE: &str = "appending_message";
pub const STAGE_STARTING_RUN: &str = "starting_run";
pub const STAGE_POLLING: &str = "polling";
pub const STAGE_READING_REPLY: &str = "reading_reply";

const CANCEL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("assistant service unavailable ({step}): {detail}")]
    UpstreamUnavailable { step: &'static str, detail: String },
    #[error(
        "assistant run {}: {}",
        .status.label(),
        .message.as_deref().unwrap_or("no error details")
    )]
    RunFailed {
        status: RunStatus,
        message: Option<String>,
    },
    #[error("assistant run did not finish within {waited_ms} ms (last status: {})", .last_status.label())]
    RunTimedOut {
        waited_ms: u64,
        last_status: RunStatus,
    },
}

impl TurnError {
    fn upstream(step: &'static str, e: anyhow::Error) -> Self {
        TurnError::UpstreamUnavailable {
            step,
            detail: format!("{e:#}"),
        }
    }

    /// Rejected input rather than a failed turn.
    pub fn is_client_error(&self) -> bool {
        matches!(self, TurnError::EmptyMessage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub thread_id: ThreadId,
    pub reply: String,
}

/// Drives one conversation turn against the remote service:
/// thread → user message → run → poll → newest assistant reply.
///
/// Turns that target the same thread are serialised; turns on different
/// threads run concurrently.
pub struct RunOrchestrator {
    backend: Arc<dyn AssistantBackend>,
    policy: PollPolicy,
    locks: TurnLocks,
}

impl RunOrchestrator {
    pub fn new(backend: Arc<dyn AssistantBackend>, policy: PollPolicy) -> Self {
        Self {
            backend,
            policy,
            locks: TurnLocks::default(),
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub async fn submit_turn(
        &self,
        message: &str,
        thread_id: Option<&ThreadId>,
    ) -> Result<TurnReply, TurnError> {
        self.submit_turn_with_hook(message, thread_id, |_stage| async {})
            .await
    }

    /// Same as `submit_turn`, but reports each protocol step as it starts.
    ///
    /// The hook runs inline with the turn and must be fast.
    pub async fn submit_turn_with_hook<F, Fut>(
        &self,
        message: &str,
        thread_id: Option<&ThreadId>,
        on_stage: F,
    ) -> Result<TurnReply, TurnError>
    where
        F: Fn(&'static str) -> Fut,
        Fut: Future<Output = ()>,
    {
        if is_blank(message) {
            return Err(TurnError::EmptyMessage);
        }

        // 1) Resolve thread
        on_stage(STAGE_RESOLVING_THREAD).await;
        let thread = match thread_id {
            Some(id) => self
                .backend
                .retrieve_thread(id)
                .await
                .map_err(|e| TurnError::upstream("retrieve thread", e))?,
            None => self
                .backend
                .create_thread()
                .await
                .map_err(|e| TurnError::upstream("create thread", e))?,
        };
        log::info!("thread resolved: {thread}");

        let _turn = self.locks.acquire(&thread).await;

        // 2) Append the user's message
        on_stage(STAGE_APPENDING_MESSAGE).await;
        self.backend
            .append_user_message(&thread, message)
            .await
            .map_err(|e| TurnError::upstream("append message", e))?;

        // 3) Start a run
        on_stage(STAGE_STARTING_RUN).await;
        let run = self
            .backend
            .create_run(&thread)
            .await
            .map_err(|e| TurnError::upstream("create run", e))?;
        log::info!("run created: {} on thread {thread}", run.id);

        // 4) Poll until terminal
        on_stage(STAGE_POLLING).await;
        let polled = self.wait_for_terminal(&thread, &run).await;
        if matches!(polled, Err(TurnError::RunTimedOut { .. })) {
            // An active run locks the thread against new messages.
            self.cancel_abandoned_run(&thread, &run.id).await;
        }
        let run = polled?;
        if run.status.is_failure() {
            log::warn!(
                "run {} ended as {}: {:?}",
                run.id,
                run.status.label(),
                run.last_error
            );
            return Err(TurnError::RunFailed {
                status: run.status,
                message: run.last_error,
            });
        }

        // 5) Read the reply, only after the run is terminal.
        on_stage(STAGE_READING_REPLY).await;
        let messages = self
            .backend
            .list_messages(&thread, MessageOrder::NewestFirst)
            .await
            .map_err(|e| TurnError::upstream("list messages", e))?;

        // Skip assistant messages that belong to some other run on the same thread.
        let reply = messages
            .into_iter()
            .find(|m| {
                m.role == Role::Assistant
                    && !is_blank(&m.text)
                    && m.run_id.as_ref().is_none_or(|r| r == &run.id)
            })
            .map(|m| m.text)
            .ok_or_else(|| TurnError::UpstreamUnavailable {
                step: "list messages",
                detail: format!("run {} completed without an assistant reply", run.id),
            })?;

        Ok(TurnReply {
            thread_id: thread,
            reply,
        })
    }

    /// Full transcript of a thread, oldest message first.
    pub async fn history(&self, thread: &ThreadId) -> Result<Vec<ChatMessage>, TurnError> {
        let messages = self
            .backend
            .list_messages(thread, MessageOrder::OldestFirst)
            .await
            .map_err(|e| TurnError::upstream("list messages", e))?;
        Ok(messages.iter().map(|m| m.to_chat_message()).collect())
    }

    async fn cancel_abandoned_run(&self, thread: &ThreadId, run: &RunId) {
        match tokio::time::timeout(CANCEL_TIMEOUT, self.backend.cancel_run(thread, run)).await {
            Ok(Ok(())) => log::info!("cancelled run {run} on thread {thread}"),
            Ok(Err(e)) => log::warn!("failed to cancel run {run} on thread {thread}: {e:#}"),
            Err(_) => log::warn!("cancel of run {run} on thread {thread} timed out"),
        }
    }

    async fn wait_for_terminal(&self, thread: &ThreadId, run: &Run) -> Result<Run, TurnError> {
        let started = Instant::now();
        let deadline = started + self.policy.max_wait;
        let mut interval = self.policy.initial_interval;
        let mut last_status = run.status;

        loop {
            // A hung status request must not outlive the deadline either.
            let polled = tokio::time::timeout_at(deadline, self.backend.get_run(thread, &run.id))
                .await
                .map_err(|_| TurnError::RunTimedOut {
                    waited_ms: ms(started.elapsed()),
                    last_status,
                })?
                .map_err(|e| TurnError::upstream("retrieve run", e))?;

            if polled.status != last_status {
                log::info!("run {} status: {}", polled.id, polled.status.label());
            }
            last_status = polled.status;

            if polled.status.is_terminal() {
                return Ok(polled);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(TurnError::RunTimedOut {
                    waited_ms: ms(started.elapsed()),
                    last_status,
                });
            }

            tokio::time::sleep(interval.min(deadline - now)).await;
            interval = self.policy.next_interval(interval);
        }
    }
}

#[derive(Default)]
struct TurnLocks {
    inner: StdMutex<HashMap<ThreadId, Arc<Mutex<()>>>>,
}

struct TurnGuard<'a> {
    locks: &'a TurnLocks,
    thread: ThreadId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl TurnLocks {
    async fn acquire(&self, thread: &ThreadId) -> TurnGuard<'_> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(thread.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        TurnGuard {
            locks: self,
            thread: thread.clone(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Forget the lock once nobody holds or waits on it.
        let mut map = self.locks.inner.lock().unwrap_or_else(|e| e.into_inner());
        if map
            .get(&self.thread)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            map.remove(&self.thread);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn turn_locks_are_released_and_forgotten() {
        let locks = TurnLocks::default();
        let t = ThreadId::new("t1");
        {
            let _g = locks.acquire(&t).await;
            assert_eq!(locks.len(), 1);
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn second_turn_on_same_thread_waits() {
        let locks = Arc::new(TurnLocks::default());
        let t = ThreadId::new("t1");
        let first = locks.acquire(&t).await;

        let waiter = {
            let locks = locks.clone();
            let t = t.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(&t).await;
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.unwrap();
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn different_threads_do_not_block_each_other() {
        let locks = TurnLocks::default();
        let _a = locks.acquire(&ThreadId::new("a")).await;
        let b = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            locks.acquire(&ThreadId::new("b")),
        )
        .await;
        assert!(b.is_ok());
    }
}
