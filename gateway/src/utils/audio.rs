//! Audio payload helpers shared by the transports and transcription adapters.

use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;

/// Encode audio bytes for a JSON transport field.
pub fn encode_audio(audio: &[u8]) -> String {
    STANDARD.encode(audio)
}

/// Decode a base64 audio field back into raw bytes.
pub fn decode_audio(data: &str) -> Result<Bytes, base64::DecodeError> {
    STANDARD.decode(data.trim()).map(Bytes::from)
}

/// Container detected from the leading bytes of an audio payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContainer {
    Wav,
    WebM,
    Ogg,
    Mp3,
    /// Headerless 16-bit little-endian PCM
    RawPcm,
}

impl AudioContainer {
    /// Sniff the container from magic bytes.
    pub fn detect(audio: &[u8]) -> Self {
        match audio {
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Self::Wav,
            [0x1A, 0x45, 0xDF, 0xA3, ..] => Self::WebM,
            [b'O', b'g', b'g', b'S', ..] => Self::Ogg,
            [b'I', b'D', b'3', ..] | [0xFF, 0xFB, ..] | [0xFF, 0xF3, ..] => Self::Mp3,
            _ => Self::RawPcm,
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Wav | Self::RawPcm => "audio.wav",
            Self::WebM => "audio.webm",
            Self::Ogg => "audio.ogg",
            Self::Mp3 => "audio.mp3",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav | Self::RawPcm => "audio/wav",
            Self::WebM => "audio/webm",
            Self::Ogg => "audio/ogg",
            Self::Mp3 => "audio/mpeg",
        }
    }
}

/// Wrap mono 16-bit little-endian PCM in a WAV container.
pub fn pcm16_to_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for chunk in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Prepare an audio payload for a file-upload transcription API.
///
/// Recognized containers pass through untouched; raw PCM is wrapped in WAV.
pub fn prepare_upload(audio: Bytes, sample_rate: u32) -> Result<(Bytes, AudioContainer), hound::Error> {
    let container = AudioContainer::detect(&audio);
    match container {
        AudioContainer::RawPcm => Ok((Bytes::from(pcm16_to_wav(&audio, sample_rate)?), container)),
        _ => Ok((audio, container)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_round_trip_is_byte_identical() {
        let original: Vec<u8> = (0u8..=255).cycle().take(4099).collect();
        let encoded = encode_audio(&original);
        let decoded = decode_audio(&encoded).unwrap();
        assert_eq!(decoded.as_ref(), original.as_slice());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_audio("not base64!!").is_err());
    }

    #[test]
    fn test_detect_containers() {
        let wav = pcm16_to_wav(&[0, 0, 1, 0], 16000).unwrap();
        assert_eq!(AudioContainer::detect(&wav), AudioContainer::Wav);
        assert_eq!(
            AudioContainer::detect(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]),
            AudioContainer::WebM
        );
        assert_eq!(AudioContainer::detect(b"OggS\0\0"), AudioContainer::Ogg);
        assert_eq!(AudioContainer::detect(&[1, 2, 3, 4]), AudioContainer::RawPcm);
    }

    #[test]
    fn test_pcm_is_wrapped_for_upload() {
        let pcm = Bytes::from(vec![0u8; 320]);
        let (upload, container) = prepare_upload(pcm, 16000).unwrap();
        assert_eq!(container, AudioContainer::RawPcm);
        assert_eq!(&upload[0..4], b"RIFF");
        assert_eq!(upload.len(), 320 + 44);
    }
}
