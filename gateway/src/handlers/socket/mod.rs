//! Conversation WebSocket transport
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **user-message** `{text}`: a typed user turn
//! - **user-audio** `{data}`: a complete spoken turn, base64 encoded
//! - **user-audio-stream-start**: open a streaming transcription channel
//! - **user-audio-stream-chunk** `{data}`: streamed audio, base64 encoded
//! - **user-audio-stream-end**: close the streaming channel
//! - **end-session**: end the conversation
//! - **Binary frames**: streamed audio while a stream is open
//!
//! ## Server → Client
//!
//! - **connected** `{sessionId}`
//! - **assistant-message** `{text, audio, transcription?}`
//! - **interim-transcript** `{text, confidence?}`
//! - **audio-stream-ready** / **audio-stream-closed**
//! - **error** `{message}`
//! - **session-ended**

mod handler;
pub mod messages;

pub use handler::{SocketParams, socket_handler};
