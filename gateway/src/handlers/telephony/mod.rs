//! Telephony bridge
//!
//! Maps the provider's webhook chain (call start, speech results, status,
//! recordings, voicemail) onto the conversation orchestrator.

mod audio;
pub mod forms;
mod handlers;

pub use audio::{Utterance, audio_clip};
pub use handlers::{
    SPEECH_RESULT_PATH, VOICEMAIL_PATH, VOICEMAIL_TRANSCRIPTION_PATH, call_start, call_status,
    conference_status, recording, speech_result, transcription, voicemail,
    voicemail_transcription, wait_music,
};
