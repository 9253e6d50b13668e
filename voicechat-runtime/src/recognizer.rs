use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use voicechat_core::config::RecognitionConfig;
use voicechat_engine::traits::{
    EngineFault, Generation, RecognitionEngine, RecognitionErrorKind, RecognitionEvent,
};

#[derive(Debug, Default)]
struct Shared {
    running: Option<Generation>,
}

/// In-process recognition engine: "speech" arrives as text through a
/// [`LoopbackHandle`] and is delivered like any engine's callbacks.
pub struct LoopbackRecognizer {
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<RecognitionEvent>,
    config: RecognitionConfig,
}

/// Drives a [`LoopbackRecognizer`] from outside the session manager.
#[derive(Clone)]
pub struct LoopbackHandle {
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<RecognitionEvent>,
    continuous: bool,
}

impl LoopbackRecognizer {
    pub fn new(
        config: &RecognitionConfig,
    ) -> (Self, LoopbackHandle, mpsc::UnboundedReceiver<RecognitionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(Shared::default()));
        let handle = LoopbackHandle {
            shared: shared.clone(),
            events: tx.clone(),
            continuous: config.continuous,
        };
        let recognizer = Self {
            shared,
            events: tx,
            config: config.clone(),
        };
        (recognizer, handle, rx)
    }
}

impl RecognitionEngine for LoopbackRecognizer {
    fn start(&mut self, generation: Generation) -> Result<(), EngineFault> {
        let mut shared = lock(&self.shared);
        if shared.running.is_some() {
            return Err(EngineFault::AlreadyActive);
        }
        if self.events.is_closed() {
            return Err(EngineFault::Unavailable("event receiver dropped".into()));
        }
        shared.running = Some(generation);
        log::debug!(
            "loopback recognizer started (gen {}, lang {}, continuous {}, interim {})",
            generation.0,
            self.config.language,
            self.config.continuous,
            self.config.interim_results
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineFault> {
        let generation = lock(&self.shared)
            .running
            .take()
            .ok_or(EngineFault::NotActive)?;
        let _ = self.events.send(RecognitionEvent::ended(generation));
        Ok(())
    }
}

impl LoopbackHandle {
    /// Delivers one final transcript. Returns false when no engine instance is listening.
    pub fn inject(&self, text: &str) -> bool {
        let mut shared = lock(&self.shared);
        let Some(generation) = shared.running else {
            return false;
        };
        let _ = self
            .events
            .send(RecognitionEvent::transcript(generation, text));

        // Single-utterance mode ends after each result.
        if !self.continuous {
            shared.running = None;
            let _ = self.events.send(RecognitionEvent::ended(generation));
        }
        true
    }

    /// The platform ended recognition on its own (silence, timeout).
    pub fn end(&self) -> bool {
        let Some(generation) = lock(&self.shared).running.take() else {
            return false;
        };
        let _ = self.events.send(RecognitionEvent::ended(generation));
        true
    }

    /// Reports an engine error followed by the end of the instance.
    pub fn fail(&self, kind: RecognitionErrorKind) -> bool {
        let Some(generation) = lock(&self.shared).running.take() else {
            return false;
        };
        let _ = self.events.send(RecognitionEvent::error(generation, kind));
        let _ = self.events.send(RecognitionEvent::ended(generation));
        true
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.shared).running.is_some()
    }
}

fn lock(shared: &Mutex<Shared>) -> std::sync::MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}
