//! Form payloads posted by the telephony provider.
//!
//! Every webhook shares the same call fields; the event-specific ones are
//! optional so a single struct deserializes all of them.

use serde::Deserialize;

use crate::store::{CallDirection, CallStatus, RecordingRef};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WebhookForm {
    pub call_sid: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub direction: Option<String>,
    pub call_status: Option<String>,
    pub call_duration: Option<String>,
    pub answered_by: Option<String>,

    pub speech_result: Option<String>,
    pub confidence: Option<String>,

    pub recording_url: Option<String>,
    pub recording_sid: Option<String>,
    pub recording_duration: Option<String>,

    pub transcription_text: Option<String>,
    pub transcription_status: Option<String>,

    pub conference_sid: Option<String>,
    pub status_callback_event: Option<String>,
}

/// Query parameters accepted on the call-start webhook.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallStartQuery {
    pub assistant_id: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl WebhookForm {
    pub fn call_sid(&self) -> Option<&str> {
        Some(self.call_sid.trim()).filter(|sid| !sid.is_empty())
    }

    /// Recognized speech; a provider-side gather timeout omits it.
    pub fn speech(&self) -> Option<&str> {
        non_blank(&self.speech_result)
    }

    pub fn confidence(&self) -> Option<f32> {
        non_blank(&self.confidence)?.parse().ok()
    }

    pub fn direction(&self) -> CallDirection {
        non_blank(&self.direction)
            .and_then(|d| d.parse().ok())
            .unwrap_or(CallDirection::Inbound)
    }

    pub fn status(&self) -> Option<CallStatus> {
        non_blank(&self.call_status)?.parse().ok()
    }

    pub fn duration_secs(&self) -> Option<u32> {
        non_blank(&self.call_duration)?.parse().ok()
    }

    pub fn answered_by(&self) -> Option<String> {
        non_blank(&self.answered_by).map(str::to_string)
    }

    pub fn recording(&self) -> Option<RecordingRef> {
        let url = non_blank(&self.recording_url)?;
        Some(RecordingRef {
            url: url.to_string(),
            sid: non_blank(&self.recording_sid).map(str::to_string),
            duration_secs: non_blank(&self.recording_duration).and_then(|d| d.parse().ok()),
        })
    }

    pub fn transcription(&self) -> Option<&str> {
        non_blank(&self.transcription_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> WebhookForm {
        serde_urlencoded::from_str(body).unwrap()
    }

    #[test]
    fn test_provider_field_names() {
        let form = parse(
            "CallSid=CA1&From=%2B15550001111&To=%2B15550002222&Direction=outbound-api\
             &CallStatus=in-progress&SpeechResult=hello+there&Confidence=0.92",
        );
        assert_eq!(form.call_sid(), Some("CA1"));
        assert_eq!(form.from.as_deref(), Some("+15550001111"));
        assert_eq!(form.direction(), CallDirection::Outbound);
        assert_eq!(form.status(), Some(CallStatus::InProgress));
        assert_eq!(form.speech(), Some("hello there"));
        assert_eq!(form.confidence(), Some(0.92));
    }

    #[test]
    fn test_blank_speech_is_no_speech() {
        assert_eq!(parse("CallSid=CA1&SpeechResult=++").speech(), None);
        assert_eq!(parse("CallSid=CA1").speech(), None);
    }

    #[test]
    fn test_recording_requires_url() {
        assert!(parse("CallSid=CA1&RecordingSid=RE1").recording().is_none());

        let recording = parse("CallSid=CA1&RecordingUrl=https%3A%2F%2Fr%2F1&RecordingDuration=42")
            .recording()
            .unwrap();
        assert_eq!(recording.url, "https://r/1");
        assert_eq!(recording.duration_secs, Some(42));
    }

    #[test]
    fn test_unparseable_numbers_are_ignored() {
        let form = parse("CallSid=CA1&CallDuration=&CallStatus=exploded");
        assert_eq!(form.duration_secs(), None);
        assert_eq!(form.status(), None);
        assert!(parse("").call_sid().is_none());
    }
}
