//! # Session Event Bus
//!
//! The fixture has no real media session to publish into, so every state
//! change a client would normally observe through the platform session API is
//! broadcast here instead, using `tokio::sync::broadcast`. Test drivers
//! subscribe and assert on the exact sequence of [`SessionEvent`]s.
//!
//! ## Usage
//!
//! ```rust
//! use mockmedia_runtime::events::{SessionBus, SessionEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = SessionBus::new(100);
//! let mut sub = bus.subscribe();
//!
//! bus.emit(SessionEvent::Notice { message: "hello".into() }).ok();
//! assert!(matches!(sub.recv().await, Ok(SessionEvent::Notice { .. })));
//! # }
//! ```
//!
//! Events are cloned per subscriber; slow subscribers receive
//! `RecvError::Lagged` and can keep reading newer events.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the session bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Playback State Types
// ============================================================================

/// Target playback state published by the player.
///
/// Mirrors the state set a real media session exposes; the fixture script
/// drives transitions between these without any audio underneath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackState {
    None,
    Stopped,
    Paused,
    Playing,
    Buffering,
    Connecting,
    FastForwarding,
    Rewinding,
    Error,
}

/// Error codes attached to `PlaybackState::Error` snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateErrorCode {
    UnknownError,
    /// Generic application failure (e.g. playback attempted with no active
    /// item or an item with no scripted events).
    AppError,
    AuthenticationExpired,
    PremiumAccountRequired,
    NotAvailableInRegion,
    SkipLimitReached,
    ActionAborted,
    EndOfQueue,
}

/// Hint telling the client how a published error can be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionHint {
    /// Label for the resolution affordance (e.g. "Select account").
    pub label: String,
    /// Where the affordance should lead.
    pub kind: ResolutionKind,
}

/// Resolution targets for error states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// Open the fixture settings surface (account selection and friends).
    OpenSettings,
}

/// Transport verbs the session currently advertises as available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    Play,
    Pause,
    PlayFromId,
    Prepare,
    SeekTo,
    SkipToNext,
    SkipToPrevious,
    SkipToQueueItem,
}

/// One custom action attached to the active item, as shown to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomActionDescriptor {
    pub id: String,
    pub label: String,
    pub icon: String,
}

/// Full playback state as published to the session, one snapshot per change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    /// Accumulated playback position in milliseconds.
    pub position_ms: u64,
    /// Nominal playback speed; media time runs this factor of wall time.
    pub speed: f64,
    /// Present when the snapshot carries an error state or message.
    pub error: Option<PlaybackError>,
    /// Present when the error can be resolved through a client affordance.
    pub resolution: Option<ResolutionHint>,
    /// Verbs currently accepted by the player.
    pub actions: Vec<SessionAction>,
    /// Queue position of the active item, when one is active.
    pub active_queue_id: Option<usize>,
    /// Custom actions of the active item.
    pub custom_actions: Vec<CustomActionDescriptor>,
}

/// Error payload carried inside a [`PlaybackSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackError {
    pub code: StateErrorCode,
    pub message: String,
}

/// One entry of the published queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItemSnapshot {
    /// Stable position handle used by skip-to-queue-item.
    pub queue_id: usize,
    /// Full identity path of the item.
    pub media_id: String,
    pub title: String,
}

/// The whole play queue, republished wholesale on every queue mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub items: Vec<QueueItemSnapshot>,
}

// ============================================================================
// Session Events
// ============================================================================

/// Everything the fixture publishes towards the client under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum SessionEvent {
    /// Playback state changed (includes scripted error states, which are
    /// delivered exactly like successes).
    PlaybackState(PlaybackSnapshot),
    /// The play queue was rebuilt or edited.
    QueueChanged(QueueSnapshot),
    /// Metadata of the active item was (re)published.
    MetadataChanged {
        media_id: String,
        title: String,
        duration_ms: Option<u64>,
    },
    /// The children of `parent` changed; the client should re-browse it.
    ChildrenChanged { parent: String },
    /// Lightweight operator feedback (heart counters and the like).
    Notice { message: String },
}

impl SessionEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            SessionEvent::PlaybackState(s) if s.state == PlaybackState::Error => {
                "Playback error published"
            }
            SessionEvent::PlaybackState(_) => "Playback state published",
            SessionEvent::QueueChanged(_) => "Queue republished",
            SessionEvent::MetadataChanged { .. } => "Metadata published",
            SessionEvent::ChildrenChanged { .. } => "Children invalidated",
            SessionEvent::Notice { .. } => "Notice",
        }
    }
}

// ============================================================================
// Session Bus
// ============================================================================

/// Broadcast channel for [`SessionEvent`]s.
///
/// Multiple producers (clone the bus), multiple independent consumers (each
/// `subscribe()` gets its own receiver). Emitting with no subscribers returns
/// an error, which callers routinely ignore with `.ok()` — a fixture run
/// without an attached observer is legal.
#[derive(Clone)]
pub struct SessionBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers, returning the subscriber count.
    pub fn emit(&self, event: SessionEvent) -> Result<usize, SendError<SessionEvent>> {
        self.sender.send(event)
    }

    /// Creates a new independent subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for SessionBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
