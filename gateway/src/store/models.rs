//! Persisted records: sessions, calls and voicemails.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::assistant::AssistantConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Socket,
    Phone,
}

/// Session status. Moves `Active → Ended` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub org_id: String,
    /// Assistant configuration captured when the session started
    pub assistant: Arc<AssistantConfig>,
    pub transport: TransportKind,
    pub status: SessionStatus,
    pub started_at: OffsetDateTime,
    pub ended_at: Option<OffsetDateTime>,
    pub metadata: HashMap<String, String>,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        assistant: Arc<AssistantConfig>,
        transport: TransportKind,
    ) -> Self {
        Self {
            id: id.into(),
            org_id: assistant.org_id.clone(),
            assistant,
            transport,
            status: SessionStatus::Active,
            started_at: OffsetDateTime::now_utc(),
            ended_at: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Mark the session ended. Returns false if it already was.
    pub fn end(&mut self) -> bool {
        if self.status == SessionStatus::Ended {
            return false;
        }
        self.status = SessionStatus::Ended;
        self.ended_at = Some(OffsetDateTime::now_utc());
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

impl FromStr for CallDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Providers report e.g. "inbound", "outbound-api", "outbound-dial"
        let lower = s.to_lowercase();
        if lower.starts_with("outbound") {
            Ok(Self::Outbound)
        } else if lower.starts_with("inbound") {
            Ok(Self::Inbound)
        } else {
            Err(format!("Unknown call direction: {s}"))
        }
    }
}

/// Telephony call lifecycle.
///
/// `initiated → ringing → answered → in-progress → terminal`; stages may be
/// skipped but never revisited, and terminal statuses accept no transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Initiated,
    Ringing,
    Answered,
    InProgress,
    Completed,
    Failed,
    Busy,
    NoAnswer,
    Canceled,
}

impl CallStatus {
    fn rank(&self) -> u8 {
        match self {
            Self::Initiated => 0,
            Self::Ringing => 1,
            Self::Answered => 2,
            Self::InProgress => 3,
            Self::Completed | Self::Failed | Self::Busy | Self::NoAnswer | Self::Canceled => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 4
    }

    /// Whether moving from `self` to `next` is a forward transition.
    pub fn can_advance_to(&self, next: CallStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Ringing => "ringing",
            Self::Answered => "answered",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Busy => "busy",
            Self::NoAnswer => "no-answer",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "queued" | "initiated" => Ok(Self::Initiated),
            "ringing" => Ok(Self::Ringing),
            "answered" => Ok(Self::Answered),
            "in-progress" | "inprogress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "busy" => Ok(Self::Busy),
            "no-answer" | "noanswer" => Ok(Self::NoAnswer),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            _ => Err(format!("Unknown call status: {s}")),
        }
    }
}

/// Outcome of applying a provider-reported status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Applied { from: CallStatus, to: CallStatus },
    /// Same status re-reported
    Unchanged,
    /// Backward or post-terminal report, dropped
    Ignored { current: CallStatus },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingRef {
    pub url: String,
    pub sid: Option<String>,
    pub duration_secs: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub id: String,
    /// Provider call identifier used to correlate webhooks
    pub call_sid: String,
    pub direction: CallDirection,
    pub from: String,
    pub to: String,
    pub status: CallStatus,
    pub answered_by: Option<String>,
    pub assistant_id: Option<String>,
    pub session_id: Option<String>,
    pub created_at: OffsetDateTime,
    pub answered_at: Option<OffsetDateTime>,
    pub ended_at: Option<OffsetDateTime>,
    pub duration_secs: Option<u32>,
    pub recording: Option<RecordingRef>,
    pub transcription: Option<String>,
    pub cost: Option<f64>,
}

impl Call {
    pub fn new(
        call_sid: impl Into<String>,
        direction: CallDirection,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            call_sid: call_sid.into(),
            direction,
            from: from.into(),
            to: to.into(),
            status: CallStatus::Initiated,
            answered_by: None,
            assistant_id: None,
            session_id: None,
            created_at: OffsetDateTime::now_utc(),
            answered_at: None,
            ended_at: None,
            duration_secs: None,
            recording: None,
            transcription: None,
            cost: None,
        }
    }

    /// Apply a reported status, stamping timing fields on forward moves.
    pub fn apply_status(&mut self, next: CallStatus, duration_secs: Option<u32>) -> StatusChange {
        if next == self.status {
            return StatusChange::Unchanged;
        }
        if !self.status.can_advance_to(next) {
            return StatusChange::Ignored {
                current: self.status,
            };
        }

        let from = self.status;
        let now = OffsetDateTime::now_utc();
        self.status = next;
        if matches!(next, CallStatus::Answered | CallStatus::InProgress) && self.answered_at.is_none()
        {
            self.answered_at = Some(now);
        }
        if next.is_terminal() {
            self.ended_at = Some(now);
            self.duration_secs = duration_secs.or(self.duration_secs);
        }
        StatusChange::Applied { from, to: next }
    }
}

#[derive(Debug, Clone)]
pub struct Voicemail {
    pub id: String,
    pub call_sid: String,
    pub from: String,
    pub recording_url: String,
    pub duration_secs: Option<u32>,
    pub transcription: Option<String>,
    pub created_at: OffsetDateTime,
}

impl Voicemail {
    pub fn new(
        call_sid: impl Into<String>,
        from: impl Into<String>,
        recording_url: impl Into<String>,
        duration_secs: Option<u32>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            call_sid: call_sid.into(),
            from: from.into(),
            recording_url: recording_url.into(),
            duration_secs,
            transcription: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}
