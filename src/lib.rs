//! Parley: live conversation session core.
//!
//! Merges two independently-arriving event streams — finalized chat
//! messages and streaming speech transcriptions — into one time-ordered
//! transcript, and drives an agent-presence avatar from a coarse activity
//! signal.
//!
//! # Architecture
//!
//! Two components share a session but no state:
//! - **Transcript merge**: a pure recomputation
//!   ([`transcript::merge_transcript`]) over the two source sequences the
//!   [`session::SessionCoordinator`] maintains; every source change
//!   broadcasts a full replacement view.
//! - **Presence playback**: [`presence::PresenceController`] watches the
//!   normalized agent-state signal and drives a media player through short
//!   accelerated transition clips into looping steady clips, with an
//!   inactivity fallback and generation-token race handling.
//!
//! Collaborators (event source, outbound send, media player) are trait
//! seams so hosts and tests supply their own.

pub mod config;
pub mod error;
pub mod presence;
pub mod roster;
pub mod runtime;
pub mod session;
pub mod transcript;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use presence::{AgentState, MediaPlayer, PresenceController};
pub use runtime::SessionEvent;
pub use session::{EventSource, Outbound, SessionCoordinator, SessionHandle};
pub use transcript::{MergedEntry, merge_transcript};
