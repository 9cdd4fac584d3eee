//! Deepgram transcription: prerecorded (`POST /v1/listen`) and live
//! (`wss://…/v1/listen`) modes.

mod client;
mod live;
mod messages;

pub use client::DeepgramSTT;
pub use live::{DeepgramLive, UtteranceAssembler};
pub use messages::DeepgramMessage;

/// Deepgram REST base URL
pub const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com";

/// Deepgram WebSocket base URL
pub const DEEPGRAM_WS_URL: &str = "wss://api.deepgram.com";

const DEFAULT_MODEL: &str = "nova-2";
