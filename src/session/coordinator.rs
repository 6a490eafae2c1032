//! The live-session composition the host UI mounts.
//!
//! [`SessionCoordinator`] registers one subscription with the inbound
//! [`EventSource`], keeps the authoritative source sequences (finalized
//! messages and transcription fragments), recomputes and broadcasts the
//! merged transcript on every accepted event, normalizes the raw
//! agent-state signal for the presence controller, and runs the
//! announcement auto-hide and connection watchdog deadlines. Teardown
//! unregisters the subscription and stops every deadline.

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::presence::AgentState;
use crate::roster::{Participant, Roster};
use crate::runtime::SessionEvent;
use crate::session::announce::AnnouncementBoard;
use crate::session::events::{Announcement, InboundEvent};
use crate::transcript::{ChatMessage, TranscriptionFragment, merge_transcript};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Broadcast buffer for runtime events.
const EVENT_CHANNEL_SIZE: usize = 64;

/// Inbound event source seam.
///
/// The coordinator registers exactly one subscription for its lifetime and
/// calls [`unsubscribe`](EventSource::unsubscribe) on teardown.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Register a subscription and return its delivery channel.
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<InboundEvent>>;

    /// Release the subscription registered by [`subscribe`](Self::subscribe).
    async fn unsubscribe(&self);
}

/// Outbound send seam: an asynchronous "send text" the host UI invokes.
/// Success/failure surfaces to the caller as accept/reject only.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Send a text message into the session.
    async fn send_text(&self, text: &str) -> anyhow::Result<()>;
}

/// Commands the host UI sends into a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Hide the visible announcement immediately.
    DismissAnnouncement,
}

/// Cloneable handle for interacting with a running session.
#[derive(Clone)]
pub struct SessionHandle {
    outbound: Option<Arc<dyn Outbound>>,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Send a text message via the outbound collaborator.
    ///
    /// # Errors
    ///
    /// Returns an error when no outbound sender is configured or the
    /// collaborator rejects the send. The message itself re-enters the
    /// transcript through the inbound subscription, not through here.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let Some(outbound) = &self.outbound else {
            return Err(SessionError::Send("no outbound sender configured".into()));
        };
        outbound
            .send_text(text)
            .await
            .map_err(|e| SessionError::Send(e.to_string()))
    }

    /// Dismiss the visible announcement.
    pub fn dismiss_announcement(&self) {
        let _ = self.command_tx.send(SessionCommand::DismissAnnouncement);
    }

    /// Request graceful shutdown of the session.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Orchestrates one live session.
pub struct SessionCoordinator {
    config: SessionConfig,
    source: Arc<dyn EventSource>,
    outbound: Option<Arc<dyn Outbound>>,
    raw_signal: Option<watch::Receiver<String>>,
    cancel: CancellationToken,
    events_tx: broadcast::Sender<SessionEvent>,
    signal_tx: watch::Sender<AgentState>,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
}

/// What woke the coordinator loop.
enum Wake {
    Cancelled,
    Inbound(Option<InboundEvent>),
    RawSignal(Option<String>),
    AnnounceDue,
    WatchdogDue,
    Command(Option<SessionCommand>),
}

impl SessionCoordinator {
    /// Create a coordinator over the given event source.
    #[must_use]
    pub fn new(config: SessionConfig, source: Arc<dyn EventSource>) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (signal_tx, _) = watch::channel(AgentState::Idle);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        Self {
            config,
            source,
            outbound: None,
            raw_signal: None,
            cancel: CancellationToken::new(),
            events_tx,
            signal_tx,
            command_tx,
            command_rx,
        }
    }

    /// Attach the outbound send collaborator.
    #[must_use]
    pub fn with_outbound(mut self, outbound: Arc<dyn Outbound>) -> Self {
        self.outbound = Some(outbound);
        self
    }

    /// Attach the raw agent-state signal. Values are normalized
    /// (unrecognized labels fold to idle) before reaching the presence
    /// controller.
    #[must_use]
    pub fn with_agent_signal(mut self, raw: watch::Receiver<String>) -> Self {
        self.raw_signal = Some(raw);
        self
    }

    /// Subscribe to runtime events (transcript replaces, presence changes,
    /// announcements).
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// The runtime event sender, for wiring into the presence controller.
    #[must_use]
    pub fn events_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events_tx.clone()
    }

    /// The normalized agent-state signal the presence controller consumes.
    #[must_use]
    pub fn presence_signal(&self) -> watch::Receiver<AgentState> {
        self.signal_tx.subscribe()
    }

    /// Handle for sending, dismissing, and shutdown. Valid before and
    /// during [`run`](Self::run).
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            outbound: self.outbound.clone(),
            command_tx: self.command_tx.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Cancellation token covering this session.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the session until cancelled, the source closes, or the
    /// connection watchdog fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the event source refuses the subscription.
    pub async fn run(mut self) -> Result<()> {
        let mut inbound = self
            .source
            .subscribe()
            .await
            .map_err(|e| SessionError::Source(e.to_string()))?;
        info!("session subscribed to event source");

        let local_identity = self.config.transcript.local_identity.clone();
        let mut roster = Roster::new(local_identity.clone());
        let mut finalized: Vec<ChatMessage> = Vec::new();
        let mut finalized_index: HashMap<String, usize> = HashMap::new();
        let mut fragments: Vec<TranscriptionFragment> = Vec::new();
        let mut fragment_index: HashMap<String, usize> = HashMap::new();
        let mut board = AnnouncementBoard::new(&self.config.announce);
        let mut announce_deadline: Option<Instant> = None;
        let mut agent_available = false;

        // Watchdog: armed until the first sign of life from the source.
        let mut watchdog: Option<Instant> = match self.config.connection.timeout_ms {
            0 => None,
            ms => Some(Instant::now() + std::time::Duration::from_millis(ms)),
        };

        loop {
            let wake = tokio::select! {
                () = self.cancel.cancelled() => Wake::Cancelled,
                event = inbound.recv() => Wake::Inbound(event),
                raw = raw_changed(&mut self.raw_signal) => Wake::RawSignal(raw),
                () = wait_deadline(announce_deadline) => Wake::AnnounceDue,
                () = wait_deadline(watchdog) => Wake::WatchdogDue,
                command = self.command_rx.recv() => Wake::Command(command),
            };

            match wake {
                Wake::Cancelled => {
                    info!("session cancelled");
                    break;
                }
                Wake::Inbound(None) => {
                    info!("event source closed, session ending");
                    break;
                }
                Wake::Inbound(Some(event)) => {
                    watchdog = None;
                    match event {
                        InboundEvent::Chat(raw) => {
                            let Some(message) = raw.validate(&local_identity) else {
                                continue;
                            };
                            upsert_message(&mut finalized, &mut finalized_index, message);
                            self.broadcast_transcript(&finalized, &fragments, &roster);
                        }
                        InboundEvent::Transcription(raw) => {
                            let Some(fragment) = raw.validate() else {
                                continue;
                            };
                            upsert_fragment(&mut fragments, &mut fragment_index, fragment);
                            self.broadcast_transcript(&finalized, &fragments, &roster);
                        }
                        InboundEvent::Announcement(payload) => {
                            let Some(announcement) = Announcement::parse(&payload) else {
                                continue;
                            };
                            let delay = board.show(announcement.clone());
                            announce_deadline = Some(Instant::now() + delay);
                            let _ = self
                                .events_tx
                                .send(SessionEvent::Announcement(announcement));
                        }
                        InboundEvent::ParticipantJoined(participant) => {
                            debug!(identity = %participant.identity, "participant joined");
                            roster.upsert(participant);
                            self.report_agent(&roster, &mut agent_available);
                        }
                        InboundEvent::ParticipantLeft(identity) => {
                            debug!(%identity, "participant left");
                            roster.remove(&identity);
                            self.report_agent(&roster, &mut agent_available);
                        }
                    }
                }
                Wake::RawSignal(Some(raw)) => {
                    let state = AgentState::from_raw(&raw);
                    self.signal_tx.send_if_modified(|current| {
                        if *current == state {
                            false
                        } else {
                            *current = state;
                            true
                        }
                    });
                }
                Wake::RawSignal(None) => {
                    debug!("agent-state signal closed");
                    self.raw_signal = None;
                }
                Wake::AnnounceDue => {
                    announce_deadline = None;
                    if board.hide() {
                        let _ = self.events_tx.send(SessionEvent::AnnouncementCleared);
                    }
                }
                Wake::WatchdogDue => {
                    warn!(
                        timeout_ms = self.config.connection.timeout_ms,
                        "no sign of life from event source, ending session"
                    );
                    let _ = self.events_tx.send(SessionEvent::ConnectionTimeout);
                    break;
                }
                Wake::Command(None) => break,
                Wake::Command(Some(SessionCommand::DismissAnnouncement)) => {
                    announce_deadline = None;
                    if board.hide() {
                        let _ = self.events_tx.send(SessionEvent::AnnouncementCleared);
                    }
                }
            }
        }

        drop(inbound);
        self.source.unsubscribe().await;
        info!("session unsubscribed and shut down");
        Ok(())
    }

    fn broadcast_transcript(
        &self,
        finalized: &[ChatMessage],
        fragments: &[TranscriptionFragment],
        roster: &Roster,
    ) {
        let merged = merge_transcript(finalized, fragments, roster);
        let _ = self.events_tx.send(SessionEvent::Transcript(merged));
    }

    fn report_agent(&self, roster: &Roster, last: &mut bool) {
        let available = roster.agent_available();
        if available != *last {
            *last = available;
            let _ = self
                .events_tx
                .send(SessionEvent::AgentAvailable { available });
        }
    }
}

/// Replace a message with the same id in place (edits are positional
/// updates, never duplicate insertions), or append a new one.
fn upsert_message(
    messages: &mut Vec<ChatMessage>,
    index: &mut HashMap<String, usize>,
    message: ChatMessage,
) {
    match index.get(&message.id) {
        Some(&i) => messages[i] = message,
        None => {
            index.insert(message.id.clone(), messages.len());
            messages.push(message);
        }
    }
}

/// Update a growing utterance in place. The utterance keeps its first-seen
/// timestamp so refinements never reorder it in the merged view.
fn upsert_fragment(
    fragments: &mut Vec<TranscriptionFragment>,
    index: &mut HashMap<String, usize>,
    fragment: TranscriptionFragment,
) {
    match index.get(&fragment.stream_id) {
        Some(&i) => {
            fragments[i].text = fragment.text;
            fragments[i].sender_id = fragment.sender_id;
        }
        None => {
            index.insert(fragment.stream_id.clone(), fragments.len());
            fragments.push(fragment);
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

/// Awaits the next raw signal value; pends forever when no signal is
/// attached. `None` means the signal sender went away.
async fn raw_changed(raw: &mut Option<watch::Receiver<String>>) -> Option<String> {
    match raw.as_mut() {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(rx.borrow_and_update().clone()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn message(id: &str, ts: i64, text: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_owned(),
            timestamp_ms: ts,
            sender_id: "agent-1".to_owned(),
            is_local: false,
            text: text.to_owned(),
            edited_timestamp_ms: None,
        }
    }

    #[test]
    fn upsert_message_replaces_in_place() {
        let mut messages = Vec::new();
        let mut index = HashMap::new();

        upsert_message(&mut messages, &mut index, message("m1", 100, "one"));
        upsert_message(&mut messages, &mut index, message("m2", 200, "two"));
        upsert_message(&mut messages, &mut index, message("m1", 100, "edited"));

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "edited");
        assert_eq!(messages[1].text, "two");
    }

    #[test]
    fn upsert_fragment_keeps_first_timestamp() {
        let mut fragments = Vec::new();
        let mut index = HashMap::new();

        upsert_fragment(
            &mut fragments,
            &mut index,
            TranscriptionFragment {
                stream_id: "s1".to_owned(),
                timestamp_ms: 100,
                sender_id: "agent-1".to_owned(),
                text: "hel".to_owned(),
            },
        );
        upsert_fragment(
            &mut fragments,
            &mut index,
            TranscriptionFragment {
                stream_id: "s1".to_owned(),
                timestamp_ms: 140,
                sender_id: "agent-1".to_owned(),
                text: "hello there".to_owned(),
            },
        );

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].timestamp_ms, 100);
        assert_eq!(fragments[0].text, "hello there");
    }
}
