use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use voicechat_core::types::{
    ChatMessage, MessageOrder, Role, Run, RunId, RunStatus, ThreadId, ThreadMessage,
};
use voicechat_engine::orchestrator::{
    RunOrchestrator, STAGE_POLLING, STAGE_READING_REPLY, STAGE_RESOLVING_THREAD, TurnError,
};
use voicechat_engine::polling::PollPolicy;
use voicechat_engine::traits::AssistantBackend;

#[derive(Default)]
struct Calls {
    create_thread: usize,
    retrieve_thread: usize,
    appended: Vec<(ThreadId, String)>,
    create_run: usize,
    get_run: usize,
    cancelled: Vec<RunId>,
    list_messages: Vec<MessageOrder>,
}

impl Calls {
    fn total(&self) -> usize {
        self.create_thread
            + self.retrieve_thread
            + self.appended.len()
            + self.create_run
            + self.get_run
            + self.cancelled.len()
            + self.list_messages.len()
    }
}

struct ScriptedBackend {
    calls: Mutex<Calls>,
    statuses: Mutex<VecDeque<RunStatus>>,
    last_error: Option<String>,
    messages: Vec<ThreadMessage>,
    hang_on_get_run: bool,
    fail_retrieve_thread: bool,
}

impl ScriptedBackend {
    fn new(statuses: &[RunStatus]) -> Self {
        Self {
            calls: Mutex::new(Calls::default()),
            statuses: Mutex::new(statuses.iter().copied().collect()),
            last_error: None,
            messages: vec![
                assistant("m3", "Newest reply", Some("run_1")),
                user("m2", "hello"),
                assistant("m1", "Older reply", Some("run_0")),
            ],
            hang_on_get_run: false,
            fail_retrieve_thread: false,
        }
    }
}

fn assistant(id: &str, text: &str, run: Option<&str>) -> ThreadMessage {
    ThreadMessage {
        id: id.into(),
        role: Role::Assistant,
        text: text.into(),
        run_id: run.map(RunId::new),
    }
}

fn user(id: &str, text: &str) -> ThreadMessage {
    ThreadMessage {
        id: id.into(),
        role: Role::User,
        text: text.into(),
        run_id: None,
    }
}

#[async_trait::async_trait]
impl AssistantBackend for ScriptedBackend {
    async fn create_thread(&self) -> anyhow::Result<ThreadId> {
        self.calls.lock().unwrap().create_thread += 1;
        Ok(ThreadId::new("thread_new"))
    }

    async fn retrieve_thread(&self, thread: &ThreadId) -> anyhow::Result<ThreadId> {
        self.calls.lock().unwrap().retrieve_thread += 1;
        if self.fail_retrieve_thread {
            anyhow::bail!("404 no such thread");
        }
        Ok(thread.clone())
    }

    async fn append_user_message(&self, thread: &ThreadId, content: &str) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .appended
            .push((thread.clone(), content.to_string()));
        Ok(())
    }

    async fn create_run(&self, _thread: &ThreadId) -> anyhow::Result<Run> {
        self.calls.lock().unwrap().create_run += 1;
        Ok(Run {
            id: RunId::new("run_1"),
            status: RunStatus::Queued,
            last_error: None,
        })
    }

    async fn get_run(&self, _thread: &ThreadId, run: &RunId) -> anyhow::Result<Run> {
        self.calls.lock().unwrap().get_run += 1;
        if self.hang_on_get_run {
            std::future::pending::<()>().await;
        }
        let status = {
            let mut q = self.statuses.lock().unwrap();
            if q.len() > 1 {
                q.pop_front().unwrap()
            } else {
                *q.front().unwrap()
            }
        };
        Ok(Run {
            id: run.clone(),
            status,
            last_error: if status.is_failure() {
                self.last_error.clone()
            } else {
                None
            },
        })
    }

    async fn cancel_run(&self, _thread: &ThreadId, run: &RunId) -> anyhow::Result<()> {
        self.calls.lock().unwrap().cancelled.push(run.clone());
        Ok(())
    }

    async fn list_messages(
        &self,
        _thread: &ThreadId,
        order: MessageOrder,
    ) -> anyhow::Result<Vec<ThreadMessage>> {
        self.calls.lock().unwrap().list_messages.push(order);
        let mut out = self.messages.clone();
        if order == MessageOrder::OldestFirst {
            out.reverse();
        }
        Ok(out)
    }
}

fn fast_policy() -> PollPolicy {
    PollPolicy {
        initial_interval: Duration::from_millis(5),
        max_interval: Duration::from_millis(20),
        backoff_milli: 1500,
        max_wait: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn blank_message_is_rejected_without_remote_calls() {
    let backend = Arc::new(ScriptedBackend::new(&[RunStatus::Completed]));
    let orch = RunOrchestrator::new(backend.clone(), fast_policy());

    for msg in ["", "   ", "\n\t"] {
        let err = orch.submit_turn(msg, None).await.unwrap_err();
        assert!(matches!(err, TurnError::EmptyMessage));
        assert!(err.is_client_error());
    }
    assert_eq!(backend.calls.lock().unwrap().total(), 0);
}

#[tokio::test]
async fn polls_until_completed_and_returns_newest_reply() {
    let backend = Arc::new(ScriptedBackend::new(&[
        RunStatus::Queued,
        RunStatus::InProgress,
        RunStatus::InProgress,
        RunStatus::Completed,
    ]));
    let orch = RunOrchestrator::new(backend.clone(), fast_policy());

    let out = orch.submit_turn("hello", None).await.unwrap();
    assert_eq!(out.thread_id, ThreadId::new("thread_new"));
    assert_eq!(out.reply, "Newest reply");

    let calls = backend.calls.lock().unwrap();
    assert_eq!(calls.create_thread, 1);
    assert_eq!(calls.retrieve_thread, 0);
    assert_eq!(
        calls.appended,
        vec![(ThreadId::new("thread_new"), "hello".to_string())]
    );
    assert_eq!(calls.create_run, 1);
    assert_eq!(calls.get_run, 4);
    assert!(calls.cancelled.is_empty());
    assert_eq!(calls.list_messages, vec![MessageOrder::NewestFirst]);
}

#[tokio::test]
async fn existing_thread_is_retrieved_not_created() {
    let backend = Arc::new(ScriptedBackend::new(&[RunStatus::Completed]));
    let orch = RunOrchestrator::new(backend.clone(), fast_policy());

    let t = ThreadId::new("thread_old");
    let out = orch.submit_turn("hi again", Some(&t)).await.unwrap();
    assert_eq!(out.thread_id, t);

    let calls = backend.calls.lock().unwrap();
    assert_eq!(calls.retrieve_thread, 1);
    assert_eq!(calls.create_thread, 0);
}

#[tokio::test]
async fn failed_run_surfaces_error_and_skips_reply() {
    let mut backend = ScriptedBackend::new(&[RunStatus::InProgress, RunStatus::Failed]);
    backend.last_error = Some("X".into());
    let backend = Arc::new(backend);
    let orch = RunOrchestrator::new(backend.clone(), fast_policy());

    let err = orch.submit_turn("hello", None).await.unwrap_err();
    match &err {
        TurnError::RunFailed { status, message } => {
            assert_eq!(*status, RunStatus::Failed);
            assert_eq!(message.as_deref(), Some("X"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains('X'));
    let calls = backend.calls.lock().unwrap();
    assert!(calls.list_messages.is_empty());
    assert!(calls.cancelled.is_empty());
}

#[tokio::test]
async fn expired_run_is_a_failure() {
    let backend = Arc::new(ScriptedBackend::new(&[RunStatus::Expired]));
    let orch = RunOrchestrator::new(backend, fast_policy());

    let err = orch.submit_turn("hello", None).await.unwrap_err();
    assert!(matches!(
        err,
        TurnError::RunFailed {
            status: RunStatus::Expired,
            message: None
        }
    ));
}

#[tokio::test]
async fn never_terminal_run_times_out_within_max_wait() {
    let backend = Arc::new(ScriptedBackend::new(&[RunStatus::InProgress]));
    let policy = PollPolicy {
        max_wait: Duration::from_millis(150),
        ..fast_policy()
    };
    let orch = RunOrchestrator::new(backend.clone(), policy);

    let t0 = Instant::now();
    let err = orch.submit_turn("hello", None).await.unwrap_err();
    assert!(t0.elapsed() < Duration::from_secs(2));
    assert!(matches!(
        err,
        TurnError::RunTimedOut {
            last_status: RunStatus::InProgress,
            ..
        }
    ));
    let calls = backend.calls.lock().unwrap();
    assert!(calls.get_run > 1);
    assert_eq!(calls.cancelled, vec![RunId::new("run_1")]);
    assert!(calls.list_messages.is_empty());
}

#[tokio::test]
async fn hung_status_request_is_cut_off_at_deadline() {
    let mut backend = ScriptedBackend::new(&[RunStatus::InProgress]);
    backend.hang_on_get_run = true;
    let policy = PollPolicy {
        max_wait: Duration::from_millis(100),
        ..fast_policy()
    };
    let backend = Arc::new(backend);
    let orch = RunOrchestrator::new(backend.clone(), policy);

    let t0 = Instant::now();
    let err = orch.submit_turn("hello", None).await.unwrap_err();
    assert!(t0.elapsed() < Duration::from_secs(2));
    assert!(matches!(err, TurnError::RunTimedOut { .. }));
    assert_eq!(
        backend.calls.lock().unwrap().cancelled,
        vec![RunId::new("run_1")]
    );
}

#[tokio::test]
async fn remote_failure_maps_to_upstream_unavailable() {
    let mut backend = ScriptedBackend::new(&[RunStatus::Completed]);
    backend.fail_retrieve_thread = true;
    let backend = Arc::new(backend);
    let orch = RunOrchestrator::new(backend.clone(), fast_policy());

    let err = orch
        .submit_turn("hello", Some(&ThreadId::new("gone")))
        .await
        .unwrap_err();
    match err {
        TurnError::UpstreamUnavailable { step, detail } => {
            assert_eq!(step, "retrieve thread");
            assert!(detail.contains("404"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(backend.calls.lock().unwrap().appended.is_empty());
}

#[tokio::test]
async fn reply_from_another_run_is_not_returned() {
    let mut backend = ScriptedBackend::new(&[RunStatus::Completed]);
    backend.messages = vec![assistant("m9", "Someone else's answer", Some("run_other"))];
    let orch = RunOrchestrator::new(Arc::new(backend), fast_policy());

    let err = orch.submit_turn("hello", None).await.unwrap_err();
    assert!(matches!(err, TurnError::UpstreamUnavailable { .. }));
}

#[tokio::test]
async fn hook_sees_stages_in_order() {
    let backend = Arc::new(ScriptedBackend::new(&[RunStatus::Completed]));
    let orch = RunOrchestrator::new(backend, fast_policy());
    let stages = Arc::new(Mutex::new(Vec::new()));

    let seen = stages.clone();
    orch.submit_turn_with_hook("hello", None, move |stage| {
        let seen = seen.clone();
        async move {
            seen.lock().unwrap().push(stage);
        }
    })
    .await
    .unwrap();

    let stages = stages.lock().unwrap();
    assert_eq!(stages.first(), Some(&STAGE_RESOLVING_THREAD));
    assert_eq!(stages.last(), Some(&STAGE_READING_REPLY));
    assert!(stages.contains(&STAGE_POLLING));
}

#[tokio::test]
async fn history_is_oldest_first() {
    let backend = Arc::new(ScriptedBackend::new(&[RunStatus::Completed]));
    let orch = RunOrchestrator::new(backend.clone(), fast_policy());

    let history = orch.history(&ThreadId::new("t1")).await.unwrap();
    assert_eq!(
        history,
        vec![
            ChatMessage::assistant("Older reply"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("Newest reply"),
        ]
    );
    assert_eq!(
        backend.calls.lock().unwrap().list_messages,
        vec![MessageOrder::OldestFirst]
    );
}
