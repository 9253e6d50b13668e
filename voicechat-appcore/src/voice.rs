use tokio::sync::{Mutex, mpsc};
use voicechat_core::config::RecognitionConfig;
use voicechat_core::types::ChatMessage;
use voicechat_engine::recognition::{
    RecognitionError, RecognitionOutcome, RecognitionSession, RecognitionSessionManager,
};
use voicechat_engine::traits::RecognitionEvent;

use crate::service::ChatService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceUpdate {
    /// Nothing the user needs to see (stale callback, non-wake chatter, restart).
    Quiet,
    WakeDetected,
    Reply {
        command: String,
        reply: ChatMessage,
    },
    Stopped,
    Fault(RecognitionError),
}

/// Glues the recognition session to the chat: commands out of the wake gate become turns.
pub struct VoiceController {
    manager: Mutex<RecognitionSessionManager>,
    chat: ChatService,
}

impl VoiceController {
    pub fn new(manager: RecognitionSessionManager, chat: ChatService) -> Self {
        Self {
            manager: Mutex::new(manager),
            chat,
        }
    }

    pub async fn activate(&self) -> Result<(), RecognitionError> {
        self.manager.lock().await.activate().await
    }

    /// Activates when `auto_start` is set; `None` when it is not.
    pub async fn auto_start(
        &self,
        cfg: &RecognitionConfig,
    ) -> Option<Result<(), RecognitionError>> {
        if !cfg.auto_start {
            return None;
        }
        Some(self.activate().await)
    }

    pub async fn deactivate(&self) {
        self.manager.lock().await.deactivate();
    }

    pub async fn state(&self) -> RecognitionSession {
        self.manager.lock().await.state()
    }

    /// Handles one event inline; a command waits for its turn to finish.
    pub async fn handle_event(&self, event: RecognitionEvent) -> VoiceUpdate {
        match self.step(event).await {
            Step::Command(command) => match self.chat.send_text(&command).await {
                Some(reply) => VoiceUpdate::Reply { command, reply },
                None => VoiceUpdate::Quiet,
            },
            Step::Update(update) => update,
        }
    }

    /// Drains engine events until the sender side closes.
    ///
    /// Commands are queued to a turn worker so restarts and wake detection
    /// keep up while a reply is pending. Replies are reported in command order.
    /// Returns once the last queued turn has been reported.
    pub async fn run<F>(&self, mut events: mpsc::UnboundedReceiver<RecognitionEvent>, mut on_update: F)
    where
        F: FnMut(VoiceUpdate),
    {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<String>();
        let (reply_tx, mut replies) = mpsc::unbounded_channel();
        let chat = self.chat.clone();
        tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                if let Some(reply) = chat.send_text(&command).await {
                    if reply_tx.send(VoiceUpdate::Reply { command, reply }).is_err() {
                        break;
                    }
                }
            }
        });

        let mut commands = Some(command_tx);
        loop {
            tokio::select! {
                event = events.recv(), if commands.is_some() => {
                    let Some(event) = event else {
                        // Closing the queue lets the worker finish and close `replies`.
                        commands = None;
                        continue;
                    };
                    match self.step(event).await {
                        Step::Command(command) => {
                            if let Some(tx) = &commands {
                                let _ = tx.send(command);
                            }
                        }
                        Step::Update(VoiceUpdate::Quiet) => {}
                        Step::Update(update) => on_update(update),
                    }
                }
                reply = replies.recv() => match reply {
                    Some(update) => on_update(update),
                    None => break,
                },
            }
        }
    }

    async fn step(&self, event: RecognitionEvent) -> Step {
        // The manager lock is released before any turn so `deactivate` never waits on the network.
        let outcome = self.manager.lock().await.handle_event(event);

        match outcome {
            Ok(RecognitionOutcome::Command(command)) => {
                log::info!("voice command: {command}");
                Step::Command(command)
            }
            Ok(RecognitionOutcome::WakeDetected) => Step::Update(VoiceUpdate::WakeDetected),
            Ok(RecognitionOutcome::Stopped) => Step::Update(VoiceUpdate::Stopped),
            Ok(
                RecognitionOutcome::Stale
                | RecognitionOutcome::Ignored
                | RecognitionOutcome::Restarted,
            ) => Step::Update(VoiceUpdate::Quiet),
            Err(e) => {
                log::warn!("voice input stopped: {e}");
                Step::Update(VoiceUpdate::Fault(e))
            }
        }
    }
}

enum Step {
    Command(String),
    Update(VoiceUpdate),
}
