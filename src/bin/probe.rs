//! Scripted session harness.
//!
//! Runs the full session wiring — coordinator, presence controller,
//! transcript merge — against a scripted event source and a no-op media
//! player, logging everything that would reach a host UI. Useful for
//! eyeballing ordering and presence behavior without a frontend.

use async_trait::async_trait;
use parley::presence::NullPlayer;
use parley::session::events::{InboundEvent, RawChatMessage, RawTranscriptionFragment};
use parley::{
    EventSource, Outbound, PresenceController, SessionConfig, SessionCoordinator, SessionEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Feeds a fixed script of inbound events with small delays between them.
struct ScriptedSource;

#[async_trait]
impl EventSource for ScriptedSource {
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<InboundEvent>> {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for (delay_ms, event) in script() {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }

    async fn unsubscribe(&self) {
        info!("scripted source unsubscribed");
    }
}

struct LogOutbound;

#[async_trait]
impl Outbound for LogOutbound {
    async fn send_text(&self, text: &str) -> anyhow::Result<()> {
        info!(%text, "outbound send accepted");
        Ok(())
    }
}

fn chat(id: &str, ts: i64, sender: &str, text: &str) -> InboundEvent {
    InboundEvent::Chat(RawChatMessage {
        id: Some(id.to_owned()),
        timestamp_ms: Some(ts),
        sender_id: Some(sender.to_owned()),
        text: Some(text.to_owned()),
        edited_timestamp_ms: None,
    })
}

fn fragment(stream: &str, ts: i64, text: &str) -> InboundEvent {
    InboundEvent::Transcription(RawTranscriptionFragment {
        stream_id: Some(stream.to_owned()),
        timestamp_ms: Some(ts),
        sender_id: Some("agent".to_owned()),
        text: Some(text.to_owned()),
    })
}

fn script() -> Vec<(u64, InboundEvent)> {
    vec![
        (50, chat("m1", 1_000, "student", "When is the maths exam?")),
        (100, fragment("u1", 1_200, "Let me check")),
        (100, fragment("u1", 1_200, "Let me check the timetable for you.")),
        // Arrives late but timestamped earlier than the fragment.
        (50, chat("m2", 1_100, "student", "Thanks!")),
        (
            200,
            InboundEvent::Announcement(
                r#"{"headline":"Exam update","text":"Hall B, 9am sharp."}"#.to_owned(),
            ),
        ),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("parley-probe starting");

    let config = SessionConfig::default();
    let (signal_tx, signal_rx) = watch::channel("idle".to_owned());

    let coordinator = SessionCoordinator::new(config.clone(), Arc::new(ScriptedSource))
        .with_outbound(Arc::new(LogOutbound))
        .with_agent_signal(signal_rx);

    let events = coordinator.subscribe_events();
    let handle = coordinator.handle();
    let cancel: CancellationToken = coordinator.cancel_token();

    let controller = PresenceController::new(
        &config.presence,
        Arc::new(NullPlayer),
        coordinator.presence_signal(),
        cancel.child_token(),
    )
    .with_runtime_events(coordinator.events_sender());

    let coordinator_task = tokio::spawn(coordinator.run());
    let controller_task = tokio::spawn(controller.run());

    // Walk the agent through a listen/think/speak cycle while the script plays.
    let driver = tokio::spawn(async move {
        for (delay_ms, state) in [(200, "listening"), (600, "thinking"), (600, "speaking")] {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let _ = signal_tx.send(state.to_owned());
        }
    });

    handle.send_text("What room is the physics exam in?").await?;

    let observe = tokio::spawn(async move {
        let mut events = BroadcastStream::new(events);
        // Lagged gaps are fine here; the probe only narrates.
        while let Some(Ok(event)) = events.next().await {
            match event {
                SessionEvent::Transcript(entries) => {
                    info!(entries = entries.len(), "transcript replaced");
                    for entry in &entries {
                        info!(ts = entry.timestamp_ms, sender = %entry.sender_id, text = %entry.text, "  entry");
                    }
                }
                SessionEvent::Presence {
                    state,
                    transitioning,
                } => info!(state = state.label(), transitioning, "presence"),
                SessionEvent::Announcement(a) => {
                    info!(headline = a.headline.as_deref().unwrap_or(""), "announcement");
                }
                SessionEvent::AnnouncementCleared => info!("announcement cleared"),
                SessionEvent::AgentAvailable { available } => info!(available, "agent"),
                SessionEvent::ConnectionTimeout => info!("connection timeout"),
            }
        }
    });

    tokio::time::sleep(Duration::from_secs(3)).await;
    handle.shutdown();

    let _ = driver.await;
    let _ = coordinator_task.await;
    let _ = controller_task.await;
    drop(observe);

    info!("parley-probe shut down cleanly");
    Ok(())
}
