//! Configuration types for the live-session core.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for a live session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Transcript merge settings (local identity).
    pub transcript: TranscriptConfig,
    /// Agent presence playback settings.
    pub presence: PresenceConfig,
    /// Announcement overlay settings.
    pub announce: AnnounceConfig,
    /// Session connection watchdog settings.
    pub connection: ConnectionConfig,
}

/// Transcript merge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Identity of the local participant. Events from this sender render
    /// as locally-authored entries.
    pub local_identity: String,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            local_identity: "local".to_owned(),
        }
    }
}

/// Agent presence playback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Fixed duration of the transition window in ms.
    ///
    /// The transition clip is cut off after this deadline regardless of the
    /// asset's natural length; the quick-cut feel is a style choice, not
    /// asset-dependent.
    pub transition_ms: u64,
    /// Playback rate for the non-looping transition clip.
    pub transition_rate: f32,
    /// Playback rate for steady looping playback.
    pub steady_rate: f32,
    /// Inactivity fallback in ms: how long the agent may stay in the
    /// listening state with no newer signal before reverting to idle.
    pub listening_idle_ms: u64,
    /// Media asset name per agent state.
    pub assets: AssetConfig,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            transition_ms: 500,
            transition_rate: 5.0,
            steady_rate: 1.0,
            listening_idle_ms: 10_000,
            assets: AssetConfig::default(),
        }
    }
}

/// Per-state media asset names.
///
/// Swapping asset files is a configuration concern; the core only ever
/// addresses assets through these fixed logical slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Asset played while idle.
    pub idle: String,
    /// Asset played while listening.
    pub listening: String,
    /// Asset played while thinking.
    pub thinking: String,
    /// Asset played while speaking.
    pub speaking: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            idle: "idle1.mp4".to_owned(),
            listening: "listening1.mp4".to_owned(),
            thinking: "thinking1.mp4".to_owned(),
            speaking: "speaking1.mp4".to_owned(),
        }
    }
}

/// Announcement overlay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnounceConfig {
    /// Auto-hide delay in ms for a visible announcement.
    pub auto_hide_ms: u64,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self { auto_hide_ms: 6_000 }
    }
}

/// Session connection watchdog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// How long to wait for the first sign of life from the event source
    /// before declaring the session dead, in ms. Zero disables the watchdog.
    pub timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 200_000,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::SessionError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SessionError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/parley/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("parley").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("parley")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/parley-config/config.toml")
        }
    }
}
