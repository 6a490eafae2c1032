//! Participant roster for sender resolution.
//!
//! Tracks the local participant's identity plus the currently-known remote
//! participants. The transcript merge resolves each event's sender against
//! this roster; a sender that matches nothing stays an opaque label so the
//! entry still renders.

use std::collections::HashMap;

/// A remote participant known to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Stable participant identity.
    pub identity: String,
    /// Display name, if the source provided one.
    pub name: Option<String>,
    /// Whether this participant is the conversational agent.
    pub is_agent: bool,
}

/// How a sender identity resolved against the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderKind {
    /// The local participant.
    Local,
    /// A known remote participant.
    Remote,
    /// Nobody in the roster — rendered with the opaque identity.
    Unknown,
}

/// Participant roster: the local identity plus known remotes.
#[derive(Debug, Clone)]
pub struct Roster {
    local_identity: String,
    remotes: HashMap<String, Participant>,
}

impl Roster {
    /// Create a roster with the given local identity and no remotes.
    #[must_use]
    pub fn new(local_identity: impl Into<String>) -> Self {
        Self {
            local_identity: local_identity.into(),
            remotes: HashMap::new(),
        }
    }

    /// The local participant's identity.
    #[must_use]
    pub fn local_identity(&self) -> &str {
        &self.local_identity
    }

    /// Add or update a remote participant.
    pub fn upsert(&mut self, participant: Participant) {
        self.remotes
            .insert(participant.identity.clone(), participant);
    }

    /// Remove a remote participant by identity.
    pub fn remove(&mut self, identity: &str) {
        self.remotes.remove(identity);
    }

    /// Resolve a sender identity against the roster.
    #[must_use]
    pub fn resolve(&self, sender_id: &str) -> SenderKind {
        if sender_id == self.local_identity {
            SenderKind::Local
        } else if self.remotes.contains_key(sender_id) {
            SenderKind::Remote
        } else {
            SenderKind::Unknown
        }
    }

    /// Whether any known remote participant is the agent.
    #[must_use]
    pub fn agent_available(&self) -> bool {
        self.remotes.values().any(|p| p.is_agent)
    }

    /// Number of known remote participants.
    #[must_use]
    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }
}
