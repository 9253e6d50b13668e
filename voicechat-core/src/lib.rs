pub mod config;
pub mod text;
pub mod types;
pub mod wake;

// Keep the public surface small and intentional.
pub use config::*;
pub use text::*;
pub use types::*;
pub use wake::*;
