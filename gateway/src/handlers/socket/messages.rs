//! Socket protocol message types
//!
//! One WebSocket text frame carries one JSON object tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::core::conversation::{SessionEvent, TurnOutput};
use crate::utils::audio::encode_audio;

/// Maximum allowed size for a text message (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum IncomingMessage {
    UserMessage {
        #[serde(default)]
        text: String,
    },

    /// A complete utterance, base64 encoded
    UserAudio {
        #[serde(default)]
        data: String,
    },

    UserAudioStreamStart,

    UserAudioStreamChunk {
        #[serde(default)]
        data: String,
    },

    UserAudioStreamEnd,

    EndSession,
}

impl IncomingMessage {
    /// Reject missing or oversized fields before any provider is involved.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::UserMessage { text } => {
                if text.trim().is_empty() {
                    return Err("text is required".to_string());
                }
                if text.len() > MAX_TEXT_SIZE {
                    return Err(format!(
                        "text too large: {} bytes (max {} bytes)",
                        text.len(),
                        MAX_TEXT_SIZE
                    ));
                }
                Ok(())
            }
            Self::UserAudio { data } | Self::UserAudioStreamChunk { data } => {
                if data.trim().is_empty() {
                    Err("audio data is required".to_string())
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutgoingMessage {
    Connected {
        #[serde(rename = "sessionId")]
        session_id: String,
    },

    AssistantMessage {
        text: String,
        /// Base64 encoded synthesized audio
        audio: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcription: Option<String>,
    },

    InterimTranscript {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
    },

    AudioStreamReady,

    AudioStreamClosed,

    Error {
        message: String,
    },

    SessionEnded,
}

impl OutgoingMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

impl From<TurnOutput> for OutgoingMessage {
    fn from(output: TurnOutput) -> Self {
        Self::AssistantMessage {
            audio: encode_audio(&output.audio),
            text: output.text,
            transcription: output.transcription,
        }
    }
}

impl From<SessionEvent> for OutgoingMessage {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::Interim { text, confidence } => {
                Self::InterimTranscript { text, confidence }
            }
            SessionEvent::Reply(output) => output.into(),
            SessionEvent::TurnFailed(e) => Self::error(e.to_string()),
        }
    }
}

/// Routes for the sender task.
#[derive(Debug)]
pub enum MessageRoute {
    Outgoing(OutgoingMessage),
    Close,
}
