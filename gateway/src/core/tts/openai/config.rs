//! Model and output format selection for OpenAI speech synthesis.

/// Supported OpenAI TTS models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenAITTSModel {
    /// Standard quality, lower latency
    #[default]
    Tts1,
    /// High definition quality, higher latency
    Tts1Hd,
    Gpt4oMiniTts,
}

impl OpenAITTSModel {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tts1 => "tts-1",
            Self::Tts1Hd => "tts-1-hd",
            Self::Gpt4oMiniTts => "gpt-4o-mini-tts",
        }
    }

    /// Parse from an assistant setting, falling back to `tts-1`.
    pub fn from_setting(s: Option<&str>) -> Self {
        match s.map(|s| s.to_lowercase()).as_deref() {
            Some("tts-1-hd") | Some("tts1-hd") => Self::Tts1Hd,
            Some("gpt-4o-mini-tts") => Self::Gpt4oMiniTts,
            _ => Self::default(),
        }
    }
}

/// Audio container requested from the API.
///
/// MP3 is the default since it is playable by browsers and telephony
/// providers alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioOutputFormat {
    #[default]
    Mp3,
    Opus,
    Wav,
    /// Raw 24kHz 16-bit mono little-endian PCM
    Pcm,
}

impl AudioOutputFormat {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Wav => "wav",
            Self::Pcm => "pcm",
        }
    }

    pub fn from_setting(s: Option<&str>) -> Self {
        match s.map(|s| s.to_lowercase()).as_deref() {
            Some("opus") => Self::Opus,
            Some("wav") => Self::Wav,
            Some("pcm") => Self::Pcm,
            _ => Self::default(),
        }
    }
}
