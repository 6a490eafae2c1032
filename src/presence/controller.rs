//! Async runner for the presence state machine.
//!
//! [`PresenceController`] watches the normalized agent-state signal, arms
//! real timers for the machine's deadlines, and executes its commands
//! against a [`MediaPlayer`]. Play-start completions come back tagged with
//! their generation token; the machine discards any that are stale.
//!
//! The controller runs until its [`CancellationToken`] fires or the signal
//! sender goes away. Either way it applies the machine's teardown commands
//! before returning, so no timer or pending play operation outlives it.

use crate::error::{Result, SessionError};
use crate::presence::machine::{PlayOutcome, PlaybackCommand, PlaybackSession};
use crate::presence::{AgentState, AssetMap};
use crate::runtime::SessionEvent;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a play-start operation did not start playback.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// Superseded by a newer pause/play before resolving. Expected during
    /// rapid retargeting.
    #[error("play-start interrupted by a newer operation")]
    Interrupted,

    /// The playback environment refused to start the asset (e.g. a policy
    /// restriction).
    #[error("playback denied: {0}")]
    Denied(String),
}

/// Media playback seam. One asset per [`AgentState`], all preloaded once.
///
/// The controller owns its player's assets exclusively; no external code
/// may start or stop them directly.
#[async_trait]
pub trait MediaPlayer: Send + Sync + 'static {
    /// Load every asset once. Called before any playback.
    async fn preload(&self, assets: &AssetMap) -> std::result::Result<(), PlaybackError>;

    /// Pause the state's asset and disable its loop flag. Synchronous and
    /// infallible: pausing something already paused is a no-op.
    fn stop(&self, state: AgentState);

    /// Start the state's asset from the beginning at the given rate.
    ///
    /// Starting is asynchronous and may be interrupted by a later `stop` or
    /// `begin` before it resolves, in which case the implementation returns
    /// [`PlaybackError::Interrupted`].
    async fn begin(
        &self,
        state: AgentState,
        rate: f32,
        looping: bool,
    ) -> std::result::Result<(), PlaybackError>;
}

type PlayCompletion = (u64, std::result::Result<(), PlaybackError>);

/// Drives avatar playback from the agent-state signal.
pub struct PresenceController<P: MediaPlayer> {
    machine: PlaybackSession,
    player: Arc<P>,
    assets: AssetMap,
    signal: watch::Receiver<AgentState>,
    events: Option<broadcast::Sender<SessionEvent>>,
    cancel: CancellationToken,
}

/// What woke the controller loop.
enum Wake {
    Cancelled,
    Target(AgentState),
    SignalClosed,
    TransitionDue,
    InactivityDue,
    PlayDone(PlayCompletion),
}

/// Executes playback commands: the player, the armed deadlines, and the one
/// outstanding play-start future.
struct Executor<P: MediaPlayer> {
    player: Arc<P>,
    pending_play: Option<BoxFuture<'static, PlayCompletion>>,
    transition_deadline: Option<Instant>,
    inactivity_deadline: Option<Instant>,
}

impl<P: MediaPlayer> Executor<P> {
    fn apply(&mut self, commands: Vec<PlaybackCommand>) {
        for command in commands {
            match command {
                PlaybackCommand::StopAllExcept(keep) => {
                    for state in AgentState::ALL {
                        if state != keep {
                            self.player.stop(state);
                        }
                    }
                }
                PlaybackCommand::StopAll => {
                    for state in AgentState::ALL {
                        self.player.stop(state);
                    }
                }
                PlaybackCommand::Play {
                    state,
                    rate,
                    looping,
                    token,
                } => {
                    debug!(state = state.label(), rate, looping, token, "starting playback");
                    let player = Arc::clone(&self.player);
                    // Replacing the previous future drops it: its completion
                    // would be stale by definition.
                    self.pending_play = Some(Box::pin(async move {
                        (token, player.begin(state, rate, looping).await)
                    }));
                }
                PlaybackCommand::ArmTransition(after) => {
                    self.transition_deadline = Some(Instant::now() + after);
                }
                PlaybackCommand::CancelTransition => self.transition_deadline = None,
                PlaybackCommand::ArmInactivity(after) => {
                    self.inactivity_deadline = Some(Instant::now() + after);
                }
                PlaybackCommand::CancelInactivity => self.inactivity_deadline = None,
            }
        }
    }
}

/// Resolves when the deadline elapses; pends forever when none is armed.
async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Awaits the outstanding play-start, or pends forever when there is none.
async fn next_play(pending: &mut Option<BoxFuture<'static, PlayCompletion>>) -> PlayCompletion {
    match pending.as_mut() {
        Some(fut) => {
            let completion = fut.as_mut().await;
            *pending = None;
            completion
        }
        None => std::future::pending().await,
    }
}

impl<P: MediaPlayer> PresenceController<P> {
    /// Create a controller reading the given normalized signal.
    pub fn new(
        config: &crate::config::PresenceConfig,
        player: Arc<P>,
        signal: watch::Receiver<AgentState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            machine: PlaybackSession::new(config),
            assets: AssetMap::from_config(&config.assets),
            player,
            signal,
            events: None,
            cancel,
        }
    }

    /// Attach a runtime event broadcaster for UI/observability.
    #[must_use]
    pub fn with_runtime_events(mut self, tx: broadcast::Sender<SessionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Run the controller until cancelled or the signal sender is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error only when asset preloading fails; everything after
    /// that is locally absorbed.
    pub async fn run(self) -> Result<()> {
        let Self {
            mut machine,
            player,
            assets,
            mut signal,
            events,
            cancel,
        } = self;

        player
            .preload(&assets)
            .await
            .map_err(|e| SessionError::Playback(e.to_string()))?;
        info!("presence assets preloaded");

        let mut executor = Executor {
            player,
            pending_play: None,
            transition_deadline: None,
            inactivity_deadline: None,
        };
        let mut last_reported: Option<(AgentState, bool)> = None;

        executor.apply(machine.start());
        // The signal may already hold a non-idle value at mount.
        let initial = *signal.borrow_and_update();
        executor.apply(machine.on_target(initial));
        report(&events, &machine, &mut last_reported);

        loop {
            let wake = tokio::select! {
                () = cancel.cancelled() => Wake::Cancelled,
                changed = signal.changed() => match changed {
                    Ok(()) => Wake::Target(*signal.borrow_and_update()),
                    Err(_) => Wake::SignalClosed,
                },
                () = wait_deadline(executor.transition_deadline) => Wake::TransitionDue,
                () = wait_deadline(executor.inactivity_deadline) => Wake::InactivityDue,
                completion = next_play(&mut executor.pending_play) => Wake::PlayDone(completion),
            };

            match wake {
                Wake::Cancelled => {
                    debug!("presence controller cancelled");
                    break;
                }
                Wake::SignalClosed => {
                    debug!("agent-state signal closed, tearing presence down");
                    break;
                }
                Wake::Target(target) => {
                    executor.apply(machine.on_target(target));
                }
                Wake::TransitionDue => {
                    executor.transition_deadline = None;
                    executor.apply(machine.on_transition_deadline());
                }
                Wake::InactivityDue => {
                    executor.inactivity_deadline = None;
                    info!("listening inactivity fallback: reverting to idle");
                    executor.apply(machine.on_inactivity_deadline());
                }
                Wake::PlayDone((token, result)) => {
                    let outcome = match result {
                        Ok(()) => PlayOutcome::Started,
                        Err(PlaybackError::Interrupted) => {
                            debug!(token, "play-start interrupted (expected)");
                            PlayOutcome::Interrupted
                        }
                        Err(PlaybackError::Denied(reason)) => {
                            warn!(token, %reason, "playback denied, falling back");
                            PlayOutcome::Denied
                        }
                    };
                    executor.apply(machine.on_play_outcome(token, &outcome));
                }
            }
            report(&events, &machine, &mut last_reported);
        }

        executor.apply(machine.on_teardown());
        Ok(())
    }
}

/// Broadcast the displayed presence when it changed since the last report.
fn report(
    events: &Option<broadcast::Sender<SessionEvent>>,
    machine: &PlaybackSession,
    last: &mut Option<(AgentState, bool)>,
) {
    let state = machine.pending_target().unwrap_or(machine.steady_state());
    let transitioning = machine.is_transitioning();
    if *last == Some((state, transitioning)) {
        return;
    }
    *last = Some((state, transitioning));
    if let Some(tx) = events {
        let _ = tx.send(SessionEvent::Presence {
            state,
            transitioning,
        });
    }
}
