//! Agent presence: the avatar playback state machine and its runner.
//!
//! An external signal reports what the agent is doing (idle, listening,
//! thinking, speaking). This module turns that coarse signal into media
//! playback: a short accelerated transition clip on every state change,
//! then a looping steady clip, with an inactivity fallback while listening.

pub mod controller;
pub mod machine;
pub mod player;

pub use controller::{MediaPlayer, PlaybackError, PresenceController};
pub use machine::{PlaybackCommand, PlaybackSession};
pub use player::NullPlayer;

use crate::config::AssetConfig;
use serde::{Deserialize, Serialize};

/// Coarse agent activity states.
///
/// Externally owned; raw signal values fold to [`AgentState::Idle`] when
/// unrecognized or absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// No activity.
    #[default]
    Idle,
    /// The agent is hearing the user.
    Listening,
    /// The agent is working on a response.
    Thinking,
    /// The agent is talking.
    Speaking,
}

impl AgentState {
    /// All states, in a fixed order. Used for preloading and stop-all sweeps.
    pub const ALL: [AgentState; 4] = [
        AgentState::Idle,
        AgentState::Listening,
        AgentState::Thinking,
        AgentState::Speaking,
    ];

    /// Normalize a raw signal label. Unrecognized or empty values fold to idle.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "listening" => AgentState::Listening,
            "thinking" => AgentState::Thinking,
            "speaking" => AgentState::Speaking,
            _ => AgentState::Idle,
        }
    }

    /// Stable lowercase label, matching the raw signal vocabulary.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::Listening => "listening",
            AgentState::Thinking => "thinking",
            AgentState::Speaking => "speaking",
        }
    }
}

/// Typed mapping from agent state to media asset name.
///
/// Resolved once from config at controller construction; there is no way to
/// look up a key that doesn't exist, so an unrecognized state can never
/// silently load nothing.
#[derive(Debug, Clone)]
pub struct AssetMap {
    idle: String,
    listening: String,
    thinking: String,
    speaking: String,
}

impl AssetMap {
    /// Build the map from configuration.
    #[must_use]
    pub fn from_config(config: &AssetConfig) -> Self {
        Self {
            idle: config.idle.clone(),
            listening: config.listening.clone(),
            thinking: config.thinking.clone(),
            speaking: config.speaking.clone(),
        }
    }

    /// Asset name for a state.
    #[must_use]
    pub fn get(&self, state: AgentState) -> &str {
        match state {
            AgentState::Idle => &self.idle,
            AgentState::Listening => &self.listening,
            AgentState::Thinking => &self.thinking,
            AgentState::Speaking => &self.speaking,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn unrecognized_raw_values_fold_to_idle() {
        assert_eq!(AgentState::from_raw("speaking"), AgentState::Speaking);
        assert_eq!(AgentState::from_raw("connecting"), AgentState::Idle);
        assert_eq!(AgentState::from_raw(""), AgentState::Idle);
        assert_eq!(AgentState::from_raw("SPEAKING"), AgentState::Idle);
    }

    #[test]
    fn labels_round_trip() {
        for state in AgentState::ALL {
            assert_eq!(AgentState::from_raw(state.label()), state);
        }
    }

    #[test]
    fn asset_map_covers_every_state() {
        let map = AssetMap::from_config(&AssetConfig::default());
        for state in AgentState::ALL {
            assert!(!map.get(state).is_empty());
        }
        assert_eq!(map.get(AgentState::Speaking), "speaking1.mp4");
    }
}
