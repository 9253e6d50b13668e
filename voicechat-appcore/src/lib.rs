pub mod service;
pub mod voice;

pub use service::{APOLOGY_MESSAGE, ChatService};
pub use voice::{VoiceController, VoiceUpdate};
