//! The presence playback state machine.
//!
//! [`PlaybackSession`] owns the steady/transitioning bookkeeping and the
//! play-operation generation token, but no timers and no I/O: every entry
//! point returns the [`PlaybackCommand`]s the caller must execute. The async
//! runner in [`super::controller`] arms real timers and drives a real
//! player; tests drive the machine directly.
//!
//! Transition protocol, on every observed change of the normalized target
//! state relative to the displayed steady state:
//!
//! 1. Target equals the steady state while in steady mode: no-op.
//! 2. Otherwise enter transitioning: stop every asset except the target's,
//!    play the target once, non-looping, at the accelerated transition rate.
//! 3. After the fixed transition deadline (not the clip's natural end) the
//!    target becomes the steady state and loops at normal rate.
//! 4. A listening steady state arms the inactivity fallback; firing forces
//!    a transition to idle. Any newer target change disarms it.

use crate::config::PresenceConfig;
use crate::presence::AgentState;
use std::time::Duration;

/// Playback mode: showing a steady loop, or inside a transition window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    /// The steady asset is looping.
    Steady,
    /// A non-looping transition clip is playing toward a pending target.
    Transitioning,
}

/// Outcome of an asynchronous play-start operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Playback started.
    Started,
    /// The play-start was superseded by a newer pause/play before resolving.
    /// Expected during rapid retargeting, never an error.
    Interrupted,
    /// The playback environment refused to start the asset.
    Denied,
}

/// An instruction for the playback executor.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCommand {
    /// Pause and un-loop every asset except the given state's.
    StopAllExcept(AgentState),
    /// Pause and un-loop every asset.
    StopAll,
    /// Start the given state's asset from the beginning.
    ///
    /// The token identifies this play operation; its completion must be
    /// reported back via [`PlaybackSession::on_play_outcome`] and is
    /// discarded there if a newer operation has been issued since.
    Play {
        /// Which state's asset to play.
        state: AgentState,
        /// Playback rate multiplier.
        rate: f32,
        /// Whether the asset loops.
        looping: bool,
        /// Generation token for stale-completion detection.
        token: u64,
    },
    /// Arm (or re-arm) the transition deadline.
    ArmTransition(Duration),
    /// Disarm the transition deadline.
    CancelTransition,
    /// Arm (or re-arm) the listening inactivity fallback.
    ArmInactivity(Duration),
    /// Disarm the inactivity fallback.
    CancelInactivity,
}

/// Presence playback state: one per controller lifetime.
///
/// Created when the controller mounts, destroyed by [`on_teardown`]
/// (`PlaybackSession::on_teardown`); nothing in here may be acted on after
/// teardown.
#[derive(Debug)]
pub struct PlaybackSession {
    transition: Duration,
    transition_rate: f32,
    steady_rate: f32,
    inactivity: Duration,

    steady: AgentState,
    pending: Option<AgentState>,
    mode: PlaybackMode,
    /// Most recently issued play-operation token. Completions carrying an
    /// older token are stale and must be ignored.
    play_token: u64,
    torn_down: bool,
}

impl PlaybackSession {
    /// Create a session in the initial state: idle, steady mode.
    #[must_use]
    pub fn new(config: &PresenceConfig) -> Self {
        Self {
            transition: Duration::from_millis(config.transition_ms),
            transition_rate: config.transition_rate,
            steady_rate: config.steady_rate,
            inactivity: Duration::from_millis(config.listening_idle_ms),
            steady: AgentState::Idle,
            pending: None,
            mode: PlaybackMode::Steady,
            play_token: 0,
            torn_down: false,
        }
    }

    /// The currently displayed steady state.
    #[must_use]
    pub fn steady_state(&self) -> AgentState {
        self.steady
    }

    /// The transition target, while one is in flight.
    #[must_use]
    pub fn pending_target(&self) -> Option<AgentState> {
        self.pending
    }

    /// Whether a transition window is open.
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        self.mode == PlaybackMode::Transitioning
    }

    /// The most recently issued play token.
    #[must_use]
    pub fn current_token(&self) -> u64 {
        self.play_token
    }

    /// Begin steady playback of the initial state. Call exactly once after
    /// assets are preloaded.
    #[must_use]
    pub fn start(&mut self) -> Vec<PlaybackCommand> {
        if self.torn_down {
            return Vec::new();
        }
        let token = self.next_token();
        vec![
            PlaybackCommand::StopAllExcept(self.steady),
            PlaybackCommand::Play {
                state: self.steady,
                rate: self.steady_rate,
                looping: true,
                token,
            },
        ]
    }

    /// React to a new normalized target state from the signal.
    #[must_use]
    pub fn on_target(&mut self, target: AgentState) -> Vec<PlaybackCommand> {
        if self.torn_down {
            return Vec::new();
        }
        // Idempotent: already displaying (or already heading to) the target.
        if self.mode == PlaybackMode::Steady && target == self.steady {
            return Vec::new();
        }
        if self.mode == PlaybackMode::Transitioning && self.pending == Some(target) {
            return Vec::new();
        }

        // A fresh request preempts any in-flight transition and disarms the
        // inactivity fallback; the transition deadline restarts, it never
        // queues.
        self.mode = PlaybackMode::Transitioning;
        self.pending = Some(target);
        let token = self.next_token();
        vec![
            PlaybackCommand::CancelInactivity,
            PlaybackCommand::CancelTransition,
            PlaybackCommand::StopAllExcept(target),
            PlaybackCommand::Play {
                state: target,
                rate: self.transition_rate,
                looping: false,
                token,
            },
            PlaybackCommand::ArmTransition(self.transition),
        ]
    }

    /// The transition deadline elapsed: the pending target becomes the
    /// displayed steady state and begins looping playback.
    #[must_use]
    pub fn on_transition_deadline(&mut self) -> Vec<PlaybackCommand> {
        if self.torn_down || self.mode != PlaybackMode::Transitioning {
            return Vec::new();
        }
        self.steady = self.pending.take().unwrap_or(self.steady);
        self.mode = PlaybackMode::Steady;
        let token = self.next_token();
        let mut commands = vec![
            PlaybackCommand::StopAllExcept(self.steady),
            PlaybackCommand::Play {
                state: self.steady,
                rate: self.steady_rate,
                looping: true,
                token,
            },
        ];
        if self.steady == AgentState::Listening {
            commands.push(PlaybackCommand::ArmInactivity(self.inactivity));
        }
        commands
    }

    /// The listening inactivity fallback fired: force a transition to idle.
    #[must_use]
    pub fn on_inactivity_deadline(&mut self) -> Vec<PlaybackCommand> {
        if self.torn_down
            || self.mode != PlaybackMode::Steady
            || self.steady != AgentState::Listening
        {
            return Vec::new();
        }
        self.on_target(AgentState::Idle)
    }

    /// A play operation completed (successfully or not).
    ///
    /// Applied only when `token` is still the most recent one issued; stale
    /// completions are discarded. A denied start during a transition falls
    /// back to the previous steady state rather than leaving no asset
    /// visible; a denied steady loop keeps the state without retrying.
    #[must_use]
    pub fn on_play_outcome(&mut self, token: u64, outcome: &PlayOutcome) -> Vec<PlaybackCommand> {
        if self.torn_down || token != self.play_token {
            return Vec::new();
        }
        match outcome {
            PlayOutcome::Started | PlayOutcome::Interrupted => Vec::new(),
            PlayOutcome::Denied => {
                if self.mode != PlaybackMode::Transitioning {
                    return Vec::new();
                }
                self.pending = None;
                self.mode = PlaybackMode::Steady;
                let token = self.next_token();
                vec![
                    PlaybackCommand::CancelTransition,
                    PlaybackCommand::StopAllExcept(self.steady),
                    PlaybackCommand::Play {
                        state: self.steady,
                        rate: self.steady_rate,
                        looping: true,
                        token,
                    },
                ]
            }
        }
    }

    /// Tear the session down: disarm both timers, stop every asset, and
    /// invalidate the outstanding play token. All later entry points no-op.
    #[must_use]
    pub fn on_teardown(&mut self) -> Vec<PlaybackCommand> {
        if self.torn_down {
            return Vec::new();
        }
        self.torn_down = true;
        self.pending = None;
        // Invalidate any in-flight completion.
        self.play_token = self.play_token.wrapping_add(1);
        vec![
            PlaybackCommand::CancelTransition,
            PlaybackCommand::CancelInactivity,
            PlaybackCommand::StopAll,
        ]
    }

    fn next_token(&mut self) -> u64 {
        self.play_token = self.play_token.wrapping_add(1);
        self.play_token
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn session() -> PlaybackSession {
        PlaybackSession::new(&PresenceConfig::default())
    }

    fn play_of(commands: &[PlaybackCommand]) -> (AgentState, f32, bool, u64) {
        commands
            .iter()
            .find_map(|c| match c {
                PlaybackCommand::Play {
                    state,
                    rate,
                    looping,
                    token,
                } => Some((*state, *rate, *looping, *token)),
                _ => None,
            })
            .expect("commands should contain a Play")
    }

    #[test]
    fn start_loops_idle_at_normal_rate() {
        let mut session = session();
        let commands = session.start();

        assert_eq!(commands[0], PlaybackCommand::StopAllExcept(AgentState::Idle));
        let (state, rate, looping, _) = play_of(&commands);
        assert_eq!(state, AgentState::Idle);
        assert!((rate - 1.0).abs() < f32::EPSILON);
        assert!(looping);
        assert!(!session.is_transitioning());
    }

    #[test]
    fn same_target_in_steady_mode_is_a_no_op() {
        let mut session = session();
        let _ = session.start();
        assert!(session.on_target(AgentState::Idle).is_empty());
    }

    #[test]
    fn target_change_opens_transition_window() {
        let mut session = session();
        let _ = session.start();

        let commands = session.on_target(AgentState::Speaking);
        assert!(session.is_transitioning());
        assert_eq!(session.pending_target(), Some(AgentState::Speaking));
        // Steady state is unchanged until the deadline elapses.
        assert_eq!(session.steady_state(), AgentState::Idle);

        let (state, rate, looping, _) = play_of(&commands);
        assert_eq!(state, AgentState::Speaking);
        assert!((rate - 5.0).abs() < f32::EPSILON);
        assert!(!looping);
        assert!(
            commands.contains(&PlaybackCommand::ArmTransition(Duration::from_millis(500)))
        );
        assert!(commands.contains(&PlaybackCommand::StopAllExcept(AgentState::Speaking)));
    }

    #[test]
    fn deadline_settles_into_steady_loop() {
        let mut session = session();
        let _ = session.start();
        let _ = session.on_target(AgentState::Speaking);

        let commands = session.on_transition_deadline();
        assert!(!session.is_transitioning());
        assert_eq!(session.steady_state(), AgentState::Speaking);

        let (state, rate, looping, _) = play_of(&commands);
        assert_eq!(state, AgentState::Speaking);
        assert!((rate - 1.0).abs() < f32::EPSILON);
        assert!(looping);
        // Speaking does not arm the inactivity fallback.
        assert!(
            !commands
                .iter()
                .any(|c| matches!(c, PlaybackCommand::ArmInactivity(_)))
        );
    }

    #[test]
    fn rapid_retarget_restarts_transition_without_intermediate_steady() {
        let mut session = session();
        let _ = session.start();

        let _ = session.on_target(AgentState::Listening);
        let commands = session.on_target(AgentState::Speaking);

        // The listening transition never settled; the new request restarts
        // the window toward speaking.
        assert!(commands.contains(&PlaybackCommand::CancelTransition));
        assert_eq!(session.pending_target(), Some(AgentState::Speaking));
        assert_eq!(session.steady_state(), AgentState::Idle);

        let _ = session.on_transition_deadline();
        assert_eq!(session.steady_state(), AgentState::Speaking);
    }

    #[test]
    fn repeated_target_while_transitioning_is_a_no_op() {
        let mut session = session();
        let _ = session.start();
        let _ = session.on_target(AgentState::Speaking);
        let token_before = session.current_token();

        assert!(session.on_target(AgentState::Speaking).is_empty());
        assert_eq!(session.current_token(), token_before);
    }

    #[test]
    fn listening_arms_inactivity_and_fallback_forces_idle() {
        let mut session = session();
        let _ = session.start();
        let _ = session.on_target(AgentState::Listening);

        let commands = session.on_transition_deadline();
        assert!(commands.contains(&PlaybackCommand::ArmInactivity(Duration::from_millis(
            10_000
        ))));

        let commands = session.on_inactivity_deadline();
        assert!(session.is_transitioning());
        assert_eq!(session.pending_target(), Some(AgentState::Idle));
        let (state, _, looping, _) = play_of(&commands);
        assert_eq!(state, AgentState::Idle);
        assert!(!looping);
    }

    #[test]
    fn new_target_disarms_inactivity() {
        let mut session = session();
        let _ = session.start();
        let _ = session.on_target(AgentState::Listening);
        let _ = session.on_transition_deadline();

        let commands = session.on_target(AgentState::Thinking);
        assert!(commands.contains(&PlaybackCommand::CancelInactivity));

        // A late inactivity fire (runner raced the disarm) is ignored.
        let _ = session.on_transition_deadline();
        assert!(session.on_inactivity_deadline().is_empty());
    }

    #[test]
    fn stale_play_outcomes_are_discarded() {
        let mut session = session();
        let _ = session.start();
        let stale = session.current_token();
        let _ = session.on_target(AgentState::Speaking);

        assert!(session.on_play_outcome(stale, &PlayOutcome::Denied).is_empty());
        assert!(session.is_transitioning());
    }

    #[test]
    fn interrupted_play_is_expected_and_changes_nothing() {
        let mut session = session();
        let _ = session.start();
        let _ = session.on_target(AgentState::Thinking);
        let token = session.current_token();

        assert!(
            session
                .on_play_outcome(token, &PlayOutcome::Interrupted)
                .is_empty()
        );
        assert!(session.is_transitioning());
    }

    #[test]
    fn denied_transition_reverts_to_previous_steady_state() {
        let mut session = session();
        let _ = session.start();
        let _ = session.on_target(AgentState::Speaking);
        let token = session.current_token();

        let commands = session.on_play_outcome(token, &PlayOutcome::Denied);
        assert!(!session.is_transitioning());
        assert_eq!(session.steady_state(), AgentState::Idle);

        let (state, _, looping, _) = play_of(&commands);
        assert_eq!(state, AgentState::Idle);
        assert!(looping);
    }

    #[test]
    fn denied_steady_loop_keeps_state_without_retry() {
        let mut session = session();
        let _ = session.start();
        let token = session.current_token();

        assert!(session.on_play_outcome(token, &PlayOutcome::Denied).is_empty());
        assert_eq!(session.steady_state(), AgentState::Idle);
    }

    #[test]
    fn teardown_cancels_everything_and_invalidates_tokens() {
        let mut session = session();
        let _ = session.start();
        let _ = session.on_target(AgentState::Speaking);
        let in_flight = session.current_token();

        let commands = session.on_teardown();
        assert!(commands.contains(&PlaybackCommand::CancelTransition));
        assert!(commands.contains(&PlaybackCommand::CancelInactivity));
        assert!(commands.contains(&PlaybackCommand::StopAll));

        // Everything after teardown is inert.
        assert!(
            session
                .on_play_outcome(in_flight, &PlayOutcome::Started)
                .is_empty()
        );
        assert!(session.on_target(AgentState::Thinking).is_empty());
        assert!(session.on_transition_deadline().is_empty());
        assert!(session.on_teardown().is_empty());
    }
}
