//! OpenAI Whisper file transcription (`POST /v1/audio/transcriptions`).

mod client;
mod messages;

pub use client::OpenAISTT;
