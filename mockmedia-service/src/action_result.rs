//! Delayed, coalescible delivery of browse-action results.
//!
//! Custom-action handlers never answer a request inline. They build an
//! [`ActionResultSender`]: accumulate a result payload, pick the reply kind,
//! optionally attach a completion closure that edits the library, pick a
//! delay and a coalescing token, then `send()`. Sending arms one entry on the
//! owning actor's reply timeline; when it expires the completion runs first
//! and the payload is delivered second, as one unit.
//!
//! Coalescing: at most one pending outcome exists per token. Re-arming a
//! token before its delay elapses replaces the earlier delivery *and* its
//! completion — the client observes exactly one reply, reflecting the later
//! scheduling. The default token is fresh and unique, so independent results
//! never coalesce by accident; handlers that want supersede-on-repeat
//! semantics share a [`ActionToken::Kind`] token.
//!
//! Even a zero delay is delivered through the timeline, never synchronously,
//! so a result always arrives asynchronously from the request.

use mockmedia_library::{BrowseAction, Library};
use mockmedia_runtime::{Timeline, TimelineToken};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Completion hook run against the library just before delivery.
pub type CompletionFn = Box<dyn FnOnce(&mut Library) + Send>;

/// Coalescing key of a pending action result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionToken {
    /// Shared per action kind: a newer result of the same kind supersedes a
    /// pending one (the download chain relies on this).
    Kind(BrowseAction),
    /// Never coalesces with anything else.
    Unique(TimelineToken),
}

/// How the client should interpret a delivered payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Final outcome of the action.
    Result,
    /// Intermediate update; a final result is still coming.
    Progress,
    /// The action failed; the payload carries the message.
    Error,
}

/// Result payload accumulated by the builder. Field writers follow
/// write-and-remove semantics: setting a field again overwrites it, and
/// `show_playback_view(false)` clears the flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionPayload {
    /// Item the client should re-fetch after this result.
    pub refresh_media_id: Option<String>,
    /// Human-readable outcome message.
    pub message: Option<String>,
    /// Node the client should navigate to.
    pub browse_node: Option<String>,
    /// Whether the client should open its playback view.
    pub show_playback_view: bool,
}

/// One delivered action reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReply {
    pub kind: ReplyKind,
    pub payload: ActionPayload,
}

/// An armed outcome waiting on the reply timeline.
pub struct PendingReply {
    reply: ActionReply,
    reply_to: UnboundedSender<ActionReply>,
    on_complete: Option<CompletionFn>,
}

impl PendingReply {
    /// Runs the completion against the library, then delivers the payload.
    /// A gone receiver only loses the delivery, never the completion.
    pub fn fire(self, library: &mut Library) {
        if let Some(complete) = self.on_complete {
            complete(library);
        }
        self.reply_to.send(self.reply).ok();
    }
}

impl std::fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply")
            .field("reply", &self.reply)
            .field("has_completion", &self.on_complete.is_some())
            .finish()
    }
}

/// Builder for one delayed action result.
pub struct ActionResultSender {
    payload: ActionPayload,
    kind: ReplyKind,
    reply_to: UnboundedSender<ActionReply>,
    on_complete: Option<CompletionFn>,
    delay: Duration,
    token: ActionToken,
}

impl ActionResultSender {
    pub fn new(reply_to: UnboundedSender<ActionReply>) -> Self {
        Self {
            payload: ActionPayload::default(),
            kind: ReplyKind::Result,
            reply_to,
            on_complete: None,
            delay: Duration::ZERO,
            token: ActionToken::Unique(TimelineToken::fresh()),
        }
    }

    pub fn set_refresh_media_id(mut self, media_id: impl Into<String>) -> Self {
        self.payload.refresh_media_id = Some(media_id.into());
        self
    }

    pub fn set_message(mut self, message: impl Into<String>) -> Self {
        self.payload.message = Some(message.into());
        self
    }

    pub fn set_browse_node(mut self, media_id: impl Into<String>) -> Self {
        self.payload.browse_node = Some(media_id.into());
        self
    }

    pub fn set_show_playback_view(mut self, show: bool) -> Self {
        self.payload.show_playback_view = show;
        self
    }

    /// Immediate delivery under a fresh token.
    pub fn send_to(mut self, kind: ReplyKind) -> Self {
        self.kind = kind;
        self
    }

    /// Immediate delivery under a shared token.
    pub fn send_to_keyed(mut self, token: ActionToken, kind: ReplyKind) -> Self {
        self.token = token;
        self.kind = kind;
        self
    }

    /// Delayed delivery under a shared token.
    pub fn send_to_delayed(mut self, token: ActionToken, delay: Duration, kind: ReplyKind) -> Self {
        self.token = token;
        self.delay = delay;
        self.kind = kind;
        self
    }

    /// Attaches a completion hook, run against the library when the entry
    /// expires and before the payload is delivered.
    pub fn on_complete(mut self, complete: impl FnOnce(&mut Library) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(complete));
        self
    }

    /// Arms the outcome. Any pending outcome sharing this token is replaced,
    /// delivery and completion both.
    pub fn send(self, timeline: &mut Timeline<ActionToken, PendingReply>) {
        let pending = PendingReply {
            reply: ActionReply {
                kind: self.kind,
                payload: self.payload,
            },
            reply_to: self.reply_to,
            on_complete: self.on_complete,
        };
        timeline.schedule(self.token, self.delay, pending);
    }
}

// ============================================================================
// Tests
// ============================================================================
