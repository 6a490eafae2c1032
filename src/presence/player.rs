//! A no-op media player for demos and smoke tests.

use crate::presence::controller::{MediaPlayer, PlaybackError};
use crate::presence::{AgentState, AssetMap};
use async_trait::async_trait;
use tracing::info;

/// [`MediaPlayer`] that performs no real playback; every operation succeeds
/// and logs what a real player would have done.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlayer;

#[async_trait]
impl MediaPlayer for NullPlayer {
    async fn preload(&self, assets: &AssetMap) -> Result<(), PlaybackError> {
        for state in AgentState::ALL {
            info!(state = state.label(), asset = assets.get(state), "preload");
        }
        Ok(())
    }

    fn stop(&self, _state: AgentState) {}

    async fn begin(
        &self,
        state: AgentState,
        rate: f32,
        looping: bool,
    ) -> Result<(), PlaybackError> {
        info!(state = state.label(), rate, looping, "play");
        Ok(())
    }
}
