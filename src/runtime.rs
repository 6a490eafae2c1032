//! Runtime events emitted by the session core for UI and observability.
//!
//! Intentionally lightweight: the coordinator and controller emit these
//! best-effort over a broadcast channel and never block on a slow consumer.

use crate::presence::AgentState;
use crate::session::events::Announcement;
use crate::transcript::MergedEntry;

/// Events that describe what the session is doing "right now".
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The full merged transcript after a source change.
    ///
    /// Consumers replace their view wholesale; this is never a delta.
    Transcript(Vec<MergedEntry>),
    /// The displayed agent presence changed.
    Presence {
        /// The state being shown (the target while transitioning).
        state: AgentState,
        /// Whether a transition clip is currently playing.
        transitioning: bool,
    },
    /// Whether an agent participant is present in the session.
    AgentAvailable { available: bool },
    /// A new announcement replaced whatever was visible.
    Announcement(Announcement),
    /// The visible announcement was hidden (auto-hide or dismissal).
    AnnouncementCleared,
    /// The event source produced no sign of life within the configured
    /// deadline; the session is shutting down.
    ConnectionTimeout,
}
