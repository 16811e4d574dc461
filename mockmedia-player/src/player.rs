//! The playback state machine.

use mockmedia_library::model::{parent_path, EventAction, EventResolution, ScriptedEvent};
use mockmedia_library::{Library, NodeFilter, NodeId, PlaybackAction};
use mockmedia_runtime::config::AccountType;
use mockmedia_runtime::events::{
    PlaybackError, PlaybackSnapshot, PlaybackState, QueueItemSnapshot, QueueSnapshot,
    ResolutionHint, ResolutionKind, SessionAction, SessionEvent, StateErrorCode,
};
use mockmedia_runtime::{SessionBus, Timeline};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// The player's two timers. One entry per kind is armed at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerTimer {
    /// Fires the next scripted event of the active item.
    ScriptTick,
    /// Auto-stops the active item when its declared duration elapses.
    TrackEnd,
}

/// Scripted playback state machine.
///
/// Holds no reference to the library; every verb that needs the content tree
/// takes it as a parameter, so the single owner of both decides when either
/// is touched.
pub struct Player {
    bus: SessionBus,
    account: AccountType,
    timers: Timeline<PlayerTimer, ()>,

    /// Only updated when the state changes; while a segment is playing the
    /// live position is `position_ms` plus the scaled segment elapsed time.
    position_ms: u64,
    speed: f64,
    /// Start of the current playing segment, set when a `Playing` event of a
    /// timed item fires.
    segment_start: Option<Instant>,
    playing: bool,
    queue: Vec<NodeId>,
    /// Unclamped: skip verbs may move it out of range, which surfaces as
    /// "no active item" until corrected.
    active_index: i64,
    next_event_index: usize,
    resume_on_focus_gain: bool,
}

impl Player {
    pub fn new(bus: SessionBus, account: AccountType) -> Self {
        Self {
            bus,
            account,
            timers: Timeline::new(),
            position_ms: 0,
            speed: 1.0,
            segment_start: None,
            playing: false,
            queue: Vec::new(),
            active_index: -1,
            next_event_index: 0,
            resume_on_focus_gain: false,
        }
    }

    pub fn set_account(&mut self, account: AccountType) {
        self.account = account;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    pub fn queue(&self) -> &[NodeId] {
        &self.queue
    }

    /// The player's timers; the owner awaits `expired()` on this and routes
    /// each expiration into [`Player::handle_timer`].
    pub fn timers_mut(&mut self) -> &mut Timeline<PlayerTimer, ()> {
        &mut self.timers
    }

    fn active_item(&self) -> Option<NodeId> {
        if self.active_index >= 0 {
            self.queue.get(self.active_index as usize).copied()
        } else {
            None
        }
    }

    // ------------------------------------------------------------------
    // Transport verbs
    // ------------------------------------------------------------------

    /// Rebuilds the queue from the target's parent, activates the target and
    /// starts scripted playback.
    pub fn play_from_id(&mut self, library: &mut Library, media_id: &str) {
        self.build_queue(library, &parent_path(media_id));
        self.set_active_item(library, Some(media_id));
        self.play_active_queue_item(library);
    }

    /// Like [`Player::play_from_id`] but publishes a paused placeholder
    /// instead of starting the script.
    pub fn prepare_from_id(&mut self, library: &mut Library, media_id: &str) {
        self.build_queue(library, &parent_path(media_id));
        self.set_active_item(library, Some(media_id));
        self.prepare_active_item(library);
    }

    pub fn play(&mut self, library: &mut Library) {
        if self.playing {
            self.stop_playback();
        }
        self.start_playback(library);
    }

    /// Freezes the position, cancels both timers and publishes a paused
    /// state. Queue and event cursor stay intact.
    pub fn pause(&mut self, library: &Library) {
        if let Some(start) = self.segment_start.take() {
            self.position_ms += (start.elapsed().as_millis() as f64 * self.speed) as u64;
        }
        self.timers.cancel(&PlayerTimer::TrackEnd);
        self.timers.cancel(&PlayerTimer::ScriptTick);
        self.playing = false;
        let snapshot = self.snapshot(library, PlaybackState::Paused, None, None, SessionAction::Play);
        self.publish_state(snapshot);
    }

    /// Resets the position, cancels both timers and publishes a stopped
    /// state. Queue and active index are kept.
    pub fn stop(&mut self, library: &Library) {
        self.stop_playback();
        let snapshot =
            self.snapshot(library, PlaybackState::Stopped, None, None, SessionAction::Play);
        self.publish_state(snapshot);
    }

    /// Rebases the position and restarts scripted emission from the top of
    /// the active item's event list.
    pub fn seek_to(&mut self, library: &mut Library, position_ms: u64) {
        if self.playing {
            self.timers.cancel(&PlayerTimer::TrackEnd);
        }
        self.segment_start = None;
        self.position_ms = position_ms;
        self.start_playback(library);
    }

    pub fn skip_to_next(&mut self, library: &mut Library) {
        self.active_index += 1;
        self.play_active_queue_item(library);
    }

    pub fn skip_to_previous(&mut self, library: &mut Library) {
        self.active_index -= 1;
        self.play_active_queue_item(library);
    }

    /// Accepts any index; an out-of-range one leaves the player without an
    /// active item until a later verb corrects it.
    pub fn skip_to_queue_item(&mut self, library: &mut Library, index: i64) {
        self.active_index = index;
        self.play_active_queue_item(library);
    }

    // ------------------------------------------------------------------
    // Queue management
    // ------------------------------------------------------------------

    /// Rebuilds the queue from the playable children of `parent_path` (an
    /// identity path or a bare source path) and republishes it.
    pub fn build_queue(&mut self, library: &mut Library, parent_path: &str) {
        self.queue = match library.resolve(parent_path) {
            Some(parent) => library.children_of(parent, NodeFilter::Playable),
            None => Vec::new(),
        };
        self.publish_queue(library);
    }

    /// Makes the given item active if it is in the queue, the first item
    /// otherwise. `None` also activates the first item.
    pub fn set_active_item(&mut self, library: &mut Library, media_id: Option<&str>) {
        self.active_index = media_id
            .and_then(|id| library.resolve(id))
            .and_then(|node| self.queue.iter().position(|queued| *queued == node))
            .map(|index| index as i64)
            .unwrap_or(0);
    }

    /// Appends a playable item to the queue and republishes it. Non-playable
    /// or unresolvable ids are ignored.
    pub fn add_to_queue(&mut self, library: &mut Library, media_id: &str) {
        let Some(node) = library.resolve(media_id) else {
            return;
        };
        if !library.node(node).playable {
            return;
        }
        self.queue.push(node);
        self.publish_queue(library);
    }

    /// Removes an item from the queue, preserving the order of the rest, and
    /// republishes. An id that is not queued is a strict no-op: nothing is
    /// republished.
    pub fn remove_from_queue(&mut self, library: &mut Library, media_id: &str) {
        let Some(node) = library.resolve(media_id) else {
            return;
        };
        if !library.node(node).playable || !self.queue.contains(&node) {
            return;
        }
        self.queue.retain(|queued| *queued != node);
        if self.active_index >= self.queue.len() as i64 {
            debug!(index = self.active_index, "active index now out of range");
        }
        self.publish_queue(library);
    }

    /// Publishes the paused placeholder for the active item, without
    /// touching the event cursor.
    pub fn prepare_active_item(&mut self, library: &mut Library) {
        let Some(active) = self.active_item() else {
            return;
        };
        if self.playing {
            self.stop_playback();
        }
        self.publish_metadata(library, active);
        let snapshot =
            self.snapshot(library, PlaybackState::Paused, None, None, SessionAction::Play);
        self.publish_state(snapshot);
    }

    // ------------------------------------------------------------------
    // Play-time custom actions
    // ------------------------------------------------------------------

    pub fn custom_action(&mut self, library: &mut Library, action_id: &str) {
        let Some(active) = self.active_item() else {
            return;
        };
        match PlaybackAction::from_id(action_id) {
            Some(PlaybackAction::HeartPlusPlus) => {
                let hearts = library.adjust_hearts(active, 1);
                self.notice(format!("Hearts: {hearts}"));
            }
            Some(PlaybackAction::HeartLessLess) => {
                let hearts = library.adjust_hearts(active, -1);
                self.notice(format!("Hearts: {hearts}"));
            }
            Some(PlaybackAction::RequestLocation) => {
                self.notice("Location requested".to_string());
            }
            None => warn!(action_id, "unknown play-time action"),
        }
    }

    // ------------------------------------------------------------------
    // Audio focus (external signals)
    // ------------------------------------------------------------------

    /// Transient loss pauses and remembers to auto-resume; permanent loss
    /// pauses and forgets.
    pub fn audio_focus_loss(&mut self, library: &Library, transient: bool) {
        self.resume_on_focus_gain = transient && self.playing;
        self.pause(library);
    }

    pub fn audio_focus_gain(&mut self, library: &mut Library) {
        if self.resume_on_focus_gain {
            self.resume_on_focus_gain = false;
            self.start_playback(library);
        }
    }

    // ------------------------------------------------------------------
    // Timers and scripted emission
    // ------------------------------------------------------------------

    pub fn handle_timer(&mut self, library: &mut Library, timer: PlayerTimer) {
        match timer {
            PlayerTimer::ScriptTick => self.process_media_event(library),
            PlayerTimer::TrackEnd => self.stop(library),
        }
    }

    fn play_active_queue_item(&mut self, library: &mut Library) {
        if self.active_item().is_none() {
            return;
        }
        if self.playing {
            self.stop_playback();
        }
        self.start_playback(library);
    }

    fn start_playback(&mut self, library: &mut Library) {
        let active = self.active_item();
        let has_events = active
            .map(|node| !library.node(node).events.is_empty())
            .unwrap_or(false);
        let Some(active) = active.filter(|_| has_events) else {
            self.publish_start_failure(library);
            return;
        };

        self.publish_metadata(library, active);

        self.timers.cancel(&PlayerTimer::ScriptTick);
        self.next_event_index = 0;
        let delay = library.node(active).events[0].post_delay_ms;
        self.timers
            .schedule(PlayerTimer::ScriptTick, Duration::from_millis(delay), ());
    }

    /// Starting with no active item or an empty script fails the attempt but
    /// not the player: an error state is published and the machine stays
    /// stopped.
    fn publish_start_failure(&mut self, library: &Library) {
        self.playing = false;
        let error = PlaybackError {
            code: StateErrorCode::AppError,
            message: "no active item or empty scripted events".to_string(),
        };
        let snapshot = self.snapshot(
            library,
            PlaybackState::Error,
            Some(error),
            None,
            SessionAction::Play,
        );
        self.publish_state(snapshot);
    }

    fn process_media_event(&mut self, library: &mut Library) {
        let Some(active) = self.active_item() else {
            return;
        };
        let Some(event) = library.node(active).events.get(self.next_event_index).cloned() else {
            return;
        };
        info!(state = ?event.state, index = self.next_event_index, "scripted event");

        // A premium-gated event fires only for non-free accounts. Under a
        // free account the script stalls here: the cursor stays put and
        // nothing further is scheduled until the account changes and
        // playback is restarted. Intentional; this is how upgrade flows are
        // exercised.
        if event.requires_paid_account && self.account == AccountType::Free {
            debug!("script stalled on premium-gated event");
            return;
        }

        if let Some(sibling) = &event.toggle_sibling {
            self.toggle_sibling(library, sibling);
        }

        match event.action {
            EventAction::ResetMetadata => self.publish_metadata(library, active),
            EventAction::None => self.publish_event_state(library, &event),
        }

        if event.state == PlaybackState::Playing {
            if let Some(duration) = library.node(active).duration_ms {
                self.segment_start = Some(Instant::now());
                let remaining_ms = duration.saturating_sub(self.position_ms);
                let wall_ms = (remaining_ms as f64 / self.speed) as u64;
                self.timers
                    .schedule(PlayerTimer::TrackEnd, Duration::from_millis(wall_ms), ());
            }
            self.playing = true;
        } else if self.playing {
            self.stop_playback();
        }

        self.next_event_index += 1;
        if let Some(next) = library.node(active).events.get(self.next_event_index) {
            self.timers.schedule(
                PlayerTimer::ScriptTick,
                Duration::from_millis(next.post_delay_ms),
                (),
            );
        }
    }

    fn toggle_sibling(&mut self, library: &mut Library, media_id: &str) {
        match library.resolve(media_id) {
            Some(node) => {
                library.toggle_hidden(node);
                self.bus
                    .emit(SessionEvent::ChildrenChanged {
                        parent: parent_path(media_id),
                    })
                    .ok();
            }
            None => warn!(media_id, "toggle target not found"),
        }
    }

    /// Doesn't publish a state; callers follow up as needed.
    fn stop_playback(&mut self) {
        self.position_ms = 0;
        self.segment_start = None;
        self.timers.cancel(&PlayerTimer::TrackEnd);
        self.timers.cancel(&PlayerTimer::ScriptTick);
        self.playing = false;
    }

    // ------------------------------------------------------------------
    // Publishing
    // ------------------------------------------------------------------

    /// Publishes the state described by a scripted event (including error
    /// states, which are delivered exactly like successes).
    pub fn publish_event_state(&mut self, library: &Library, event: &ScriptedEvent) {
        let error = event.error_code.map(|code| PlaybackError {
            code,
            message: event.message.clone().unwrap_or_default(),
        });
        let resolution = match event.resolution {
            EventResolution::OpenSettings => Some(ResolutionHint {
                label: event
                    .action_label
                    .clone()
                    .unwrap_or_else(|| "Open settings".to_string()),
                kind: ResolutionKind::OpenSettings,
            }),
            EventResolution::None => None,
        };
        let snapshot = self.snapshot(library, event.state, error, resolution, SessionAction::Pause);
        self.publish_state(snapshot);
    }

    fn publish_metadata(&mut self, library: &Library, node: NodeId) {
        let item = library.node(node);
        self.bus
            .emit(SessionEvent::MetadataChanged {
                media_id: library.media_id_of(node),
                title: item.title.clone(),
                duration_ms: item.duration_ms,
            })
            .ok();
    }

    fn publish_queue(&mut self, library: &Library) {
        let items = self
            .queue
            .iter()
            .enumerate()
            .map(|(index, node)| QueueItemSnapshot {
                queue_id: index,
                media_id: library.media_id_of(*node),
                title: library.node(*node).title.clone(),
            })
            .collect();
        self.bus.emit(SessionEvent::QueueChanged(QueueSnapshot { items })).ok();
    }

    fn publish_state(&mut self, snapshot: PlaybackSnapshot) {
        self.bus.emit(SessionEvent::PlaybackState(snapshot)).ok();
    }

    fn notice(&self, message: String) {
        self.bus.emit(SessionEvent::Notice { message }).ok();
    }

    fn snapshot(
        &self,
        library: &Library,
        state: PlaybackState,
        error: Option<PlaybackError>,
        resolution: Option<ResolutionHint>,
        verb: SessionAction,
    ) -> PlaybackSnapshot {
        let active = self.active_item();
        let custom_actions = active
            .map(|node| {
                library
                    .node(node)
                    .custom_actions
                    .iter()
                    .map(|action| action.descriptor())
                    .collect()
            })
            .unwrap_or_default();

        PlaybackSnapshot {
            state,
            position_ms: self.position_ms,
            speed: self.speed,
            error,
            resolution,
            actions: self.available_actions(verb),
            active_queue_id: active.map(|_| self.active_index as usize),
            custom_actions,
        }
    }

    fn available_actions(&self, verb: SessionAction) -> Vec<SessionAction> {
        let mut actions = vec![
            verb,
            SessionAction::PlayFromId,
            SessionAction::SeekTo,
            SessionAction::Prepare,
        ];
        if !self.queue.is_empty() {
            actions.push(SessionAction::SkipToQueueItem);
            if self.active_index < self.queue.len() as i64 {
                actions.push(SessionAction::SkipToNext);
            }
            if self.active_index > 0 {
                actions.push(SessionAction::SkipToPrevious);
            }
        }
        actions
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("playing", &self.playing)
            .field("position_ms", &self.position_ms)
            .field("queue_len", &self.queue.len())
            .field("active_index", &self.active_index)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
