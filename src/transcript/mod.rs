//! Transcript types and the stream merge.
//!
//! Two independently-timestamped event sequences feed the transcript:
//! finalized chat messages and streaming transcription fragments. The merge
//! ([`merge_transcript`]) folds both into one time-ordered view.

mod merge;

pub use merge::merge_transcript;

use serde::{Deserialize, Serialize};

/// A finalized chat message.
///
/// Immutable once observed, except that an edit re-delivers the same `id`
/// with updated `text` and a set `edited_timestamp_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message identifier.
    pub id: String,
    /// Producer-clock timestamp in milliseconds.
    pub timestamp_ms: i64,
    /// Sender identity.
    pub sender_id: String,
    /// Whether the local participant authored this message.
    pub is_local: bool,
    /// Message text.
    pub text: String,
    /// Set when the message has been edited after first delivery.
    pub edited_timestamp_ms: Option<i64>,
}

/// One participant's in-progress or finalized utterance.
///
/// Successive fragments with the same `stream_id` replace the utterance
/// text in place as the speech recognizer refines it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionFragment {
    /// Unique per-utterance stream identifier.
    pub stream_id: String,
    /// Producer-clock timestamp in milliseconds.
    pub timestamp_ms: i64,
    /// Sender identity.
    pub sender_id: String,
    /// Utterance text so far.
    pub text: String,
}

/// Which source sequence a merged entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryOrigin {
    /// Derived from a streaming transcription fragment.
    Transcription,
    /// Derived from a finalized chat message.
    Chat,
}

/// Normalized union of both sources, as rendered in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEntry {
    /// Source identifier (message id or stream id).
    pub id: String,
    /// Producer-clock timestamp in milliseconds.
    pub timestamp_ms: i64,
    /// Sender identity (opaque label when unresolved).
    pub sender_id: String,
    /// Whether the local participant authored this entry.
    pub is_local: bool,
    /// Entry text.
    pub text: String,
    /// Whether the underlying message has been edited.
    pub edited: bool,
    /// Which source sequence produced this entry.
    pub origin: EntryOrigin,
}
