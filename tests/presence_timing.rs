//! Presence controller timing scenarios under paused tokio time.
//!
//! The clock auto-advances while every task is idle, so the 500 ms
//! transition window and the 10 s inactivity fallback elapse instantly and
//! deterministically.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use parley::config::PresenceConfig;
use parley::presence::controller::{MediaPlayer, PlaybackError};
use parley::presence::{AgentState, AssetMap, PresenceController};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// What one asset slot is currently doing.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SlotState {
    playing: bool,
    looping: bool,
    rate: f32,
}

/// Records every call and models per-asset playback state.
#[derive(Default)]
struct RecordingPlayer {
    slots: Mutex<HashMap<AgentState, SlotState>>,
    call_count: Mutex<usize>,
}

impl RecordingPlayer {
    fn slot(&self, state: AgentState) -> Option<SlotState> {
        self.slots.lock().unwrap().get(&state).copied()
    }

    fn actively_looping(&self) -> Vec<AgentState> {
        let slots = self.slots.lock().unwrap();
        AgentState::ALL
            .into_iter()
            .filter(|s| slots.get(s).is_some_and(|slot| slot.playing && slot.looping))
            .collect()
    }

    fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl MediaPlayer for RecordingPlayer {
    async fn preload(&self, _assets: &AssetMap) -> Result<(), PlaybackError> {
        *self.call_count.lock().unwrap() += 1;
        Ok(())
    }

    fn stop(&self, state: AgentState) {
        *self.call_count.lock().unwrap() += 1;
        let mut slots = self.slots.lock().unwrap();
        let slot = slots.entry(state).or_insert(SlotState {
            playing: false,
            looping: false,
            rate: 0.0,
        });
        slot.playing = false;
        slot.looping = false;
    }

    async fn begin(
        &self,
        state: AgentState,
        rate: f32,
        looping: bool,
    ) -> Result<(), PlaybackError> {
        *self.call_count.lock().unwrap() += 1;
        self.slots.lock().unwrap().insert(
            state,
            SlotState {
                playing: true,
                looping,
                rate,
            },
        );
        Ok(())
    }
}

struct Fixture {
    player: Arc<RecordingPlayer>,
    signal: watch::Sender<AgentState>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<parley::Result<()>>,
}

fn spawn_controller() -> Fixture {
    let player = Arc::new(RecordingPlayer::default());
    let (signal, signal_rx) = watch::channel(AgentState::Idle);
    let cancel = CancellationToken::new();
    let controller = PresenceController::new(
        &PresenceConfig::default(),
        Arc::clone(&player),
        signal_rx,
        cancel.clone(),
    );
    let task = tokio::spawn(controller.run());
    Fixture {
        player,
        signal,
        cancel,
        task,
    }
}

#[tokio::test(start_paused = true)]
async fn initial_state_loops_idle() {
    let fixture = spawn_controller();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(fixture.player.actively_looping(), vec![AgentState::Idle]);
    let idle = fixture.player.slot(AgentState::Idle).unwrap();
    assert!((idle.rate - 1.0).abs() < f32::EPSILON);

    fixture.cancel.cancel();
    fixture.task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn speaking_settles_after_transition_deadline() {
    let fixture = spawn_controller();
    tokio::time::sleep(Duration::from_millis(50)).await;

    fixture.signal.send(AgentState::Speaking).unwrap();

    // Mid-window: the transition clip runs accelerated and non-looping.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let speaking = fixture.player.slot(AgentState::Speaking).unwrap();
    assert!(speaking.playing);
    assert!(!speaking.looping);
    assert!((speaking.rate - 5.0).abs() < f32::EPSILON);

    // Past the 500 ms deadline: exactly the speaking asset loops.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        fixture.player.actively_looping(),
        vec![AgentState::Speaking]
    );
    let speaking = fixture.player.slot(AgentState::Speaking).unwrap();
    assert!((speaking.rate - 1.0).abs() < f32::EPSILON);
    for state in [AgentState::Idle, AgentState::Listening, AgentState::Thinking] {
        assert!(!fixture.player.slot(state).unwrap().playing);
    }

    fixture.cancel.cancel();
    fixture.task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn listening_reverts_to_idle_after_inactivity() {
    let fixture = spawn_controller();
    tokio::time::sleep(Duration::from_millis(50)).await;

    fixture.signal.send(AgentState::Listening).unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        fixture.player.actively_looping(),
        vec![AgentState::Listening]
    );

    // No further signal for 10 s: the controller falls back autonomously.
    tokio::time::sleep(Duration::from_millis(10_100)).await;
    assert_eq!(fixture.player.actively_looping(), vec![AgentState::Idle]);
    assert!(!fixture.player.slot(AgentState::Listening).unwrap().playing);

    fixture.cancel.cancel();
    fixture.task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn rapid_changes_never_enter_intermediate_steady_state() {
    let fixture = spawn_controller();
    tokio::time::sleep(Duration::from_millis(50)).await;

    fixture.signal.send(AgentState::Listening).unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    fixture.signal.send(AgentState::Speaking).unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;

    // The listening clip only ever ran as a transition, never as a loop.
    if let Some(listening) = fixture.player.slot(AgentState::Listening) {
        assert!(!listening.looping);
    }

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        fixture.player.actively_looping(),
        vec![AgentState::Speaking]
    );

    fixture.cancel.cancel();
    fixture.task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn teardown_mid_transition_stops_all_activity() {
    let fixture = spawn_controller();
    tokio::time::sleep(Duration::from_millis(50)).await;

    fixture.signal.send(AgentState::Speaking).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Cancel inside the transition window.
    fixture.cancel.cancel();
    fixture.task.await.unwrap().unwrap();

    assert!(fixture.player.actively_looping().is_empty());
    for state in AgentState::ALL {
        assert!(!fixture.player.slot(state).unwrap().playing);
    }

    // The pending transition deadline and inactivity timer are gone: the
    // player sees no further calls no matter how long we wait.
    let calls_after_teardown = fixture.player.calls();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(fixture.player.calls(), calls_after_teardown);
}

#[tokio::test(start_paused = true)]
async fn signal_close_tears_down() {
    let fixture = spawn_controller();
    tokio::time::sleep(Duration::from_millis(50)).await;

    drop(fixture.signal);
    fixture.task.await.unwrap().unwrap();
    assert!(fixture.player.actively_looping().is_empty());
}
