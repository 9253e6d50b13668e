pub mod orchestrator;
pub mod polling;
pub mod recognition;
pub mod traits;

// Keep the public surface small and intentional.
pub use orchestrator::{RunOrchestrator, TurnError, TurnReply};
pub use polling::PollPolicy;
pub use recognition::{
    EngineState, RecognitionError, RecognitionOutcome, RecognitionSession,
    RecognitionSessionManager,
};
pub use traits::*;
