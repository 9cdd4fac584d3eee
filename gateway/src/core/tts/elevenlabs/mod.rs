//! ElevenLabs speech synthesis (`POST /v1/text-to-speech/{voice_id}`).

mod provider;

pub use provider::{ELEVENLABS_BASE_URL, ElevenLabsTTS};
