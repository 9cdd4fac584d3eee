//! OpenAI-compatible chat completions.
//!
//! The same client serves any endpoint speaking the `/chat/completions`
//! dialect; Groq is wired up by pointing it at [`GROQ_BASE_URL`].

mod client;
mod messages;

pub use client::OpenAIChat;

/// Default OpenAI API base URL
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Groq OpenAI-compatible base URL
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
