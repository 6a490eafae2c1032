//! Inbound wire events and their validation.
//!
//! The event source delivers loosely-typed payloads: required fields may be
//! absent or empty. Each raw mirror type validates into the typed form the
//! core works with; a malformed event is dropped with a debug log and never
//! aborts the merge or the session.

use crate::roster::Participant;
use crate::transcript::{ChatMessage, TranscriptionFragment};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Everything the inbound subscription can deliver.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A finalized chat message (possibly an edit re-delivery).
    Chat(RawChatMessage),
    /// A streaming transcription fragment.
    Transcription(RawTranscriptionFragment),
    /// An announcement payload (JSON, `cloud-message` topic).
    Announcement(String),
    /// A remote participant joined or updated.
    ParticipantJoined(Participant),
    /// A remote participant left.
    ParticipantLeft(String),
}

/// A chat message as it arrives off the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawChatMessage {
    /// Unique message identifier.
    pub id: Option<String>,
    /// Producer-clock timestamp in milliseconds.
    pub timestamp_ms: Option<i64>,
    /// Sender identity.
    pub sender_id: Option<String>,
    /// Message text.
    pub text: Option<String>,
    /// Present when this delivery is an edit of an earlier message.
    pub edited_timestamp_ms: Option<i64>,
}

impl RawChatMessage {
    /// Validate into a typed message, or `None` when required fields are
    /// missing. `local_identity` decides the `is_local` marker.
    #[must_use]
    pub fn validate(self, local_identity: &str) -> Option<ChatMessage> {
        let (Some(timestamp_ms), Some(text)) = (self.timestamp_ms, self.text) else {
            debug!("dropping chat message with missing fields");
            return None;
        };
        if text.is_empty() || timestamp_ms <= 0 {
            debug!("dropping chat message with empty text or bad timestamp");
            return None;
        }
        // A message without an id can still render; it just can never be
        // edited, so a generated id is safe.
        let id = self
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let sender_id = self.sender_id.unwrap_or_default();
        Some(ChatMessage {
            is_local: sender_id == local_identity,
            id,
            timestamp_ms,
            sender_id,
            text,
            edited_timestamp_ms: self.edited_timestamp_ms,
        })
    }
}

/// A transcription fragment as it arrives off the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTranscriptionFragment {
    /// Unique per-utterance stream identifier.
    pub stream_id: Option<String>,
    /// Producer-clock timestamp in milliseconds.
    pub timestamp_ms: Option<i64>,
    /// Sender identity.
    pub sender_id: Option<String>,
    /// Utterance text so far.
    pub text: Option<String>,
}

impl RawTranscriptionFragment {
    /// Validate into a typed fragment, or `None` when required fields are
    /// missing.
    #[must_use]
    pub fn validate(self) -> Option<TranscriptionFragment> {
        let (Some(stream_id), Some(timestamp_ms), Some(text)) =
            (self.stream_id, self.timestamp_ms, self.text)
        else {
            debug!("dropping transcription fragment with missing fields");
            return None;
        };
        if text.is_empty() || timestamp_ms <= 0 {
            debug!(%stream_id, "dropping fragment with empty text or bad timestamp");
            return None;
        }
        Some(TranscriptionFragment {
            stream_id,
            timestamp_ms,
            sender_id: self.sender_id.unwrap_or_default(),
            text,
        })
    }
}

/// An announcement shown in the session overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Announcement {
    /// Headline, shown above the body.
    pub headline: Option<String>,
    /// Body text.
    pub text: Option<String>,
    /// Optional link target.
    pub link: Option<String>,
    /// Label for the link.
    pub link_text: Option<String>,
}

impl Announcement {
    /// Parse an announcement payload. Returns `None` when the JSON is
    /// invalid or carries neither a headline nor body text.
    #[must_use]
    pub fn parse(payload: &str) -> Option<Self> {
        let announcement: Announcement = match serde_json::from_str(payload) {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "unparseable announcement payload");
                return None;
            }
        };
        let has_content = announcement
            .headline
            .as_deref()
            .is_some_and(|s| !s.is_empty())
            || announcement.text.as_deref().is_some_and(|s| !s.is_empty());
        if !has_content {
            debug!("dropping empty announcement");
            return None;
        }
        Some(announcement)
    }
}
