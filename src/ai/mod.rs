pub mod client;
pub mod fallback;
mod prompts;

pub use client::{ChatBackend, TonyAI};
pub use fallback::CompletionOutcome;
