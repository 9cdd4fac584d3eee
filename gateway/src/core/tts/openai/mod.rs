//! OpenAI speech synthesis (`POST /v1/audio/speech`).

mod config;
mod provider;

pub use config::{AudioOutputFormat, OpenAITTSModel};
pub use provider::{OPENAI_TTS_URL, OpenAITTS};
