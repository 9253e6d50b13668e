pub mod assistants;
pub mod parse;
pub mod request;
pub mod runtime;
