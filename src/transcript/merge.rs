//! The transcript merge: two source sequences in, one ordered view out.

use crate::roster::{Roster, SenderKind};
use crate::transcript::{ChatMessage, EntryOrigin, MergedEntry, TranscriptionFragment};
use std::collections::HashMap;
use tracing::debug;

/// Merge finalized chat messages and transcription fragments into a single
/// time-ordered transcript.
///
/// Pure recomputation: the output is a fresh sequence on every call and the
/// caller replaces its view wholesale. Ordering is ascending by
/// `timestamp_ms` with a **stable** sort, so entries with equal timestamps
/// keep their input order across re-merges. At equal timestamps,
/// transcription-derived entries sort before chat-derived entries — the
/// fragments list is normalized first and stability preserves that.
///
/// Finalized messages are de-duplicated by `id` before merging (last write
/// wins, first occurrence's position kept), so an edited message is a
/// positional update rather than a duplicate insertion. Entries with empty
/// text are dropped; a single bad event never aborts the merge.
#[must_use]
pub fn merge_transcript(
    finalized: &[ChatMessage],
    fragments: &[TranscriptionFragment],
    roster: &Roster,
) -> Vec<MergedEntry> {
    let mut entries: Vec<MergedEntry> = Vec::with_capacity(finalized.len() + fragments.len());

    for fragment in fragments {
        if fragment.text.is_empty() {
            debug!(stream_id = %fragment.stream_id, "dropping empty transcription fragment");
            continue;
        }
        entries.push(MergedEntry {
            id: fragment.stream_id.clone(),
            timestamp_ms: fragment.timestamp_ms,
            sender_id: fragment.sender_id.clone(),
            is_local: roster.resolve(&fragment.sender_id) == SenderKind::Local,
            text: fragment.text.clone(),
            edited: false,
            origin: EntryOrigin::Transcription,
        });
    }

    for message in dedup_by_id(finalized) {
        if message.text.is_empty() {
            debug!(id = %message.id, "dropping empty chat message");
            continue;
        }
        entries.push(MergedEntry {
            id: message.id.clone(),
            timestamp_ms: message.timestamp_ms,
            sender_id: message.sender_id.clone(),
            is_local: message.is_local
                || roster.resolve(&message.sender_id) == SenderKind::Local,
            text: message.text.clone(),
            edited: message.edited_timestamp_ms.is_some(),
            origin: EntryOrigin::Chat,
        });
    }

    // Vec::sort_by_key is stable, which the tie-break contract relies on.
    entries.sort_by_key(|e| e.timestamp_ms);
    entries
}

/// Collapse repeated message ids, keeping the first occurrence's position
/// and the last occurrence's content.
fn dedup_by_id(finalized: &[ChatMessage]) -> Vec<&ChatMessage> {
    let mut by_id: HashMap<&str, usize> = HashMap::with_capacity(finalized.len());
    let mut deduped: Vec<&ChatMessage> = Vec::with_capacity(finalized.len());

    for message in finalized {
        match by_id.get(message.id.as_str()) {
            Some(&index) => deduped[index] = message,
            None => {
                by_id.insert(message.id.as_str(), deduped.len());
                deduped.push(message);
            }
        }
    }

    deduped
}
