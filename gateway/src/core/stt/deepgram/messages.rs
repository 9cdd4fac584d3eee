//! Deepgram response types for prerecorded and live transcription.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Alternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

/// Prerecorded transcription response.
#[derive(Debug, Clone, Deserialize)]
pub struct PrerecordedResponse {
    pub results: PrerecordedResults,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrerecordedResults {
    #[serde(default)]
    pub channels: Vec<Channel>,
}

impl PrerecordedResponse {
    /// Best transcript of the first channel, if any.
    pub fn best_transcript(&self) -> Option<&str> {
        self.results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.as_str())
    }
}

/// Message received on the live socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum DeepgramMessage {
    Results {
        channel: Channel,
        #[serde(default)]
        is_final: bool,
        #[serde(default)]
        speech_final: bool,
    },
    UtteranceEnd {},
    SpeechStarted {},
    Metadata {},
    #[serde(other)]
    Unknown,
}

/// Control message sent on the live socket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    CloseStream,
    KeepAlive,
}
