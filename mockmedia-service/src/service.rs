//! # Media Service Actor
//!
//! The browsing façade: one actor task owning the [`Library`], the
//! [`Player`], the service timers and the reply timeline. Clients talk to it
//! through a [`MediaServiceHandle`]; every verb arrives as a command on an
//! mpsc channel and every delayed callback lives on a timeline polled by the
//! same loop, so a client verb and an in-flight timer never interleave
//! mid-mutation. The single timeline *is* the lock.
//!
//! ```text
//! MediaServiceHandle ──commands──▶ ┌──────────────────────────┐
//!                                  │       MediaService       │
//!        service timers ─────────▶ │  Library + Player +      │──▶ SessionBus
//!        reply timeline ─────────▶ │  FixtureConfig           │──▶ ActionReply
//!        player timers  ─────────▶ └──────────────────────────┘
//! ```
//!
//! Browse replies honor the configured [`ReplyDelay`]: with the zero tier the
//! lookup runs as soon as the command is handled, any other tier detaches the
//! request and re-runs it from the timer. Self-updating nodes answer with a
//! partial child list and schedule a children-changed notification that
//! reveals one more child on the next browse.

use crate::action_result::{
    ActionReply, ActionResultSender, ActionToken, PendingReply, ReplyKind,
};
use crate::error::{Result, ServiceError};
use mockmedia_library::model::{EventResolution, ScriptedEvent};
use mockmedia_library::{
    parent_path, BrowseAction, ContentStyle, Library, NodeFilter, NodeId, SourceLoader, ROOT_PATH,
};
use mockmedia_player::Player;
use mockmedia_runtime::config::{
    AccountType, FixtureConfig, LoginEventOrder, ReplyDelay, RootKind,
};
use mockmedia_runtime::events::{
    PlaybackSnapshot, PlaybackState, SessionAction, SessionEvent, StateErrorCode,
};
use mockmedia_runtime::{SessionBus, Timeline, TimelineToken};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// How many hops below the root a search descends.
const MAX_SEARCH_DEPTH: usize = 4;
/// Delay before the playback-state half of a browse-tree-first sign-in.
const LOGIN_STATE_DELAY: Duration = Duration::from_millis(3000);
/// Simulated download duration.
const DOWNLOAD_COMPLETE_DELAY: Duration = Duration::from_millis(5000);

// ============================================================================
// Client-facing DTOs
// ============================================================================

/// One browsable/playable item as handed to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSnapshot {
    /// Full identity path; feed it back into lookups and transport verbs.
    pub media_id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub playable: bool,
    pub browsable: bool,
    pub duration_ms: Option<u64>,
    pub playable_style: ContentStyle,
    pub browsable_style: ContentStyle,
    pub single_item_style: ContentStyle,
    pub browse_actions: Vec<String>,
    pub completion_percent: Option<f64>,
}

fn item_snapshot(library: &Library, id: NodeId) -> ItemSnapshot {
    let node = library.node(id);
    ItemSnapshot {
        media_id: library.media_id_of(id),
        title: node.title.clone(),
        subtitle: node.subtitle.clone(),
        playable: node.playable,
        browsable: node.browsable,
        duration_ms: node.duration_ms,
        playable_style: node.playable_style,
        browsable_style: node.browsable_style,
        single_item_style: node.single_item_style,
        browse_actions: node.browse_actions.clone(),
        completion_percent: node.completion_percent,
    }
}

// ============================================================================
// Commands and timers
// ============================================================================

type BrowseReply = oneshot::Sender<Option<Vec<ItemSnapshot>>>;
type ItemReply = oneshot::Sender<Option<ItemSnapshot>>;

enum Command {
    Children { parent: String, reply: BrowseReply },
    Search { query: String, reply: BrowseReply },
    Item { media_id: String, reply: ItemReply },
    CustomAction {
        action_id: String,
        media_id: String,
        reply_to: mpsc::UnboundedSender<ActionReply>,
    },
    PlaybackAction { action_id: String },
    Play,
    Pause,
    Stop,
    PlayFromId(String),
    PrepareFromId(String),
    SeekTo(u64),
    SkipToNext,
    SkipToPrevious,
    SkipToQueueItem(i64),
    AudioFocusLoss { transient: bool },
    AudioFocusGain,
    SetAccount(AccountType),
    SetRootKind(RootKind),
    SetReplyDelay(ReplyDelay),
    SetLoginOrder(LoginEventOrder),
    ToggleItem(String),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TimerKey {
    /// Detached browse/search/lookup reply; never coalesced.
    Reply(TimelineToken),
    /// Self-update notification, coalesced per parent path.
    NodeUpdate(String),
    /// The delayed half of a browse-tree-first sign-in.
    LoginState,
}

enum TimerTask {
    Children { parent: String, reply: BrowseReply },
    Search { query: String, reply: BrowseReply },
    Item { media_id: String, reply: ItemReply },
    NodeUpdate { parent: String },
    LoginState(AccountType),
}

// ============================================================================
// Handle
// ============================================================================

/// Cheap cloneable front for the service actor.
#[derive(Debug, Clone)]
pub struct MediaServiceHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl MediaServiceHandle {
    fn post(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| ServiceError::Closed)
    }

    /// Identity path clients browse from.
    pub fn root_path(&self) -> &'static str {
        ROOT_PATH
    }

    /// Children of a node. `None` means the parent does not resolve (or
    /// nobody is signed in); an empty vec means it resolved with nothing to
    /// show.
    pub async fn children(&self, parent: impl Into<String>) -> Result<Option<Vec<ItemSnapshot>>> {
        let (reply, rx) = oneshot::channel();
        self.post(Command::Children {
            parent: parent.into(),
            reply,
        })?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    /// Bounded-depth title search below the root.
    pub async fn search(&self, query: impl Into<String>) -> Result<Option<Vec<ItemSnapshot>>> {
        let (reply, rx) = oneshot::channel();
        self.post(Command::Search {
            query: query.into(),
            reply,
        })?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    /// Single-item lookup by identity path.
    pub async fn item(&self, media_id: impl Into<String>) -> Result<Option<ItemSnapshot>> {
        let (reply, rx) = oneshot::channel();
        self.post(Command::Item {
            media_id: media_id.into(),
            reply,
        })?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    /// Dispatches a browse custom action against an item. Replies (progress,
    /// result or error) arrive on the returned channel, always
    /// asynchronously.
    pub fn custom_action(
        &self,
        action_id: impl Into<String>,
        media_id: impl Into<String>,
    ) -> Result<mpsc::UnboundedReceiver<ActionReply>> {
        let (reply_to, rx) = mpsc::unbounded_channel();
        self.post(Command::CustomAction {
            action_id: action_id.into(),
            media_id: media_id.into(),
            reply_to,
        })?;
        Ok(rx)
    }

    /// Dispatches a play-time custom action against the active item.
    pub fn playback_action(&self, action_id: impl Into<String>) -> Result<()> {
        self.post(Command::PlaybackAction {
            action_id: action_id.into(),
        })
    }

    pub fn play(&self) -> Result<()> {
        self.post(Command::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.post(Command::Pause)
    }

    pub fn stop(&self) -> Result<()> {
        self.post(Command::Stop)
    }

    pub fn play_from_id(&self, media_id: impl Into<String>) -> Result<()> {
        self.post(Command::PlayFromId(media_id.into()))
    }

    pub fn prepare_from_id(&self, media_id: impl Into<String>) -> Result<()> {
        self.post(Command::PrepareFromId(media_id.into()))
    }

    pub fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.post(Command::SeekTo(position_ms))
    }

    pub fn skip_to_next(&self) -> Result<()> {
        self.post(Command::SkipToNext)
    }

    pub fn skip_to_previous(&self) -> Result<()> {
        self.post(Command::SkipToPrevious)
    }

    pub fn skip_to_queue_item(&self, index: i64) -> Result<()> {
        self.post(Command::SkipToQueueItem(index))
    }

    pub fn audio_focus_loss(&self, transient: bool) -> Result<()> {
        self.post(Command::AudioFocusLoss { transient })
    }

    pub fn audio_focus_gain(&self) -> Result<()> {
        self.post(Command::AudioFocusGain)
    }

    /// Stand-ins for the preference listeners of a real deployment.
    pub fn set_account(&self, account: AccountType) -> Result<()> {
        self.post(Command::SetAccount(account))
    }

    pub fn set_root_kind(&self, kind: RootKind) -> Result<()> {
        self.post(Command::SetRootKind(kind))
    }

    pub fn set_reply_delay(&self, delay: ReplyDelay) -> Result<()> {
        self.post(Command::SetReplyDelay(delay))
    }

    pub fn set_login_order(&self, order: LoginEventOrder) -> Result<()> {
        self.post(Command::SetLoginOrder(order))
    }

    /// Flips an item's visibility and invalidates its parent.
    pub fn toggle_item(&self, media_id: impl Into<String>) -> Result<()> {
        self.post(Command::ToggleItem(media_id.into()))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.post(Command::Shutdown)
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct MediaService {
    library: Library,
    player: Player,
    bus: SessionBus,
    config: FixtureConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    timers: Timeline<TimerKey, TimerTask>,
    replies: Timeline<ActionToken, PendingReply>,
}

impl MediaService {
    /// Builds the actor and its handle. Call [`MediaService::run`] on a task
    /// to bring it to life.
    pub fn new(
        loader: Box<dyn SourceLoader>,
        config: FixtureConfig,
        bus: SessionBus,
    ) -> (Self, MediaServiceHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut library = Library::new(loader);
        library.set_browse_root(config.root_kind);
        let player = Player::new(bus.clone(), config.account);
        let service = Self {
            library,
            player,
            bus,
            config,
            commands: rx,
            timers: Timeline::new(),
            replies: Timeline::new(),
        };
        (service, MediaServiceHandle { commands: tx })
    }

    /// The actor loop. Returns when the handle side is dropped or a shutdown
    /// command arrives.
    pub async fn run(mut self) {
        info!(config = ?self.config, "media service started");
        self.update_playback_state(self.config.account);

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        None | Some(Command::Shutdown) => break,
                        Some(command) => self.handle_command(command),
                    }
                }
                (_, task) = self.timers.expired() => self.handle_timer(task),
                (_, pending) = self.replies.expired() => pending.fire(&mut self.library),
                (timer, ()) = self.player.timers_mut().expired() => {
                    self.player.handle_timer(&mut self.library, timer);
                }
            }
        }
        info!("media service stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Children { parent, reply } => {
                let bootstrap =
                    self.config.root_kind == RootKind::QueueOnly && parent == ROOT_PATH;
                self.defer(TimerTask::Children { parent, reply });
                // A queue-only root has nothing to browse; the first root
                // browse seeds the play queue instead.
                if bootstrap {
                    if let Some(path) = self.library.asset_path(RootKind::LeafChildren) {
                        self.player.build_queue(&mut self.library, path);
                        self.player.set_active_item(&mut self.library, None);
                        self.player.prepare_active_item(&mut self.library);
                    }
                }
            }
            Command::Search { query, reply } => self.defer(TimerTask::Search { query, reply }),
            Command::Item { media_id, reply } => self.defer(TimerTask::Item { media_id, reply }),
            Command::CustomAction {
                action_id,
                media_id,
                reply_to,
            } => self.handle_custom_action(&action_id, &media_id, reply_to),
            Command::PlaybackAction { action_id } => {
                self.player.custom_action(&mut self.library, &action_id)
            }
            Command::Play => self.player.play(&mut self.library),
            Command::Pause => self.player.pause(&self.library),
            Command::Stop => self.player.stop(&self.library),
            Command::PlayFromId(media_id) => {
                self.player.play_from_id(&mut self.library, &media_id)
            }
            Command::PrepareFromId(media_id) => {
                self.player.prepare_from_id(&mut self.library, &media_id)
            }
            Command::SeekTo(position_ms) => self.player.seek_to(&mut self.library, position_ms),
            Command::SkipToNext => self.player.skip_to_next(&mut self.library),
            Command::SkipToPrevious => self.player.skip_to_previous(&mut self.library),
            Command::SkipToQueueItem(index) => {
                self.player.skip_to_queue_item(&mut self.library, index)
            }
            Command::AudioFocusLoss { transient } => {
                self.player.audio_focus_loss(&self.library, transient)
            }
            Command::AudioFocusGain => self.player.audio_focus_gain(&mut self.library),
            Command::SetAccount(account) => self.set_account(account),
            Command::SetRootKind(kind) => {
                self.invalidate_root();
                self.library.set_browse_root(kind);
                self.config.root_kind = kind;
            }
            Command::SetReplyDelay(delay) => {
                debug!(?delay, "reply delay changed");
                self.config.reply_delay = delay;
                self.invalidate_root();
            }
            Command::SetLoginOrder(order) => self.config.login_order = order,
            Command::ToggleItem(media_id) => self.toggle_item(&media_id),
            Command::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    fn handle_timer(&mut self, task: TimerTask) {
        match task {
            TimerTask::Children { parent, reply } => {
                reply.send(self.children(&parent)).ok();
            }
            TimerTask::Search { query, reply } => {
                reply.send(self.search(&query)).ok();
            }
            TimerTask::Item { media_id, reply } => {
                let snapshot = self
                    .library
                    .resolve(&media_id)
                    .map(|node| item_snapshot(&self.library, node));
                reply.send(snapshot).ok();
            }
            TimerTask::NodeUpdate { parent } => {
                self.bus.emit(SessionEvent::ChildrenChanged { parent }).ok();
            }
            TimerTask::LoginState(account) => self.update_playback_state(account),
        }
    }

    /// Runs a lookup task now, or detaches it behind the configured reply
    /// delay.
    fn defer(&mut self, task: TimerTask) {
        match self.config.reply_delay {
            ReplyDelay::None => self.handle_timer(task),
            tier => {
                self.timers
                    .schedule(TimerKey::Reply(TimelineToken::fresh()), tier.delay(), task);
            }
        }
    }

    // ------------------------------------------------------------------
    // Browsing
    // ------------------------------------------------------------------

    fn children(&mut self, parent: &str) -> Option<Vec<ItemSnapshot>> {
        if !self.config.account.is_signed_in() {
            return None;
        }
        let node = self.library.resolve(parent)?;
        let children = self.library.children_of(node, NodeFilter::Any);
        if children.is_empty() {
            return Some(Vec::new());
        }

        // A self-updating node reveals children progressively: only the
        // first reveal-counter children are shown, and the counter advances
        // after the client has been told to come back.
        let self_update = self.library.node(node).self_update_ms;
        let to_show = match self_update {
            Some(_) => self.library.node(node).reveal_counter,
            None => children.len(),
        };

        let mut items = Vec::with_capacity(to_show);
        for child in children.iter().take(to_show) {
            if self.library.node(*child).hidden {
                continue;
            }
            items.push(item_snapshot(&self.library, *child));
        }

        if let Some(delay_ms) = self_update {
            self.timers.schedule(
                TimerKey::NodeUpdate(parent.to_string()),
                Duration::from_millis(delay_ms),
                TimerTask::NodeUpdate {
                    parent: parent.to_string(),
                },
            );
            self.library.advance_reveal(node, children.len());
        }
        Some(items)
    }

    fn search(&mut self, query: &str) -> Option<Vec<ItemSnapshot>> {
        if !self.config.account.is_signed_in() {
            return None;
        }
        self.library.resolve(ROOT_PATH)?;
        let hits = self.library.search(ROOT_PATH, query, MAX_SEARCH_DEPTH);
        Some(
            hits.into_iter()
                .map(|node| item_snapshot(&self.library, node))
                .collect(),
        )
    }

    fn toggle_item(&mut self, media_id: &str) {
        match self.library.resolve(media_id) {
            Some(node) => {
                self.library.toggle_hidden(node);
                self.bus
                    .emit(SessionEvent::ChildrenChanged {
                        parent: parent_path(media_id),
                    })
                    .ok();
            }
            None => error!(media_id, "toggle target not found"),
        }
    }

    // ------------------------------------------------------------------
    // Account and root state
    // ------------------------------------------------------------------

    fn set_account(&mut self, account: AccountType) {
        info!(?account, "account changed");
        self.config.account = account;
        self.player.set_account(account);
        match self.config.login_order {
            LoginEventOrder::PlaybackStateFirst => self.update_playback_state(account),
            LoginEventOrder::BrowseTreeFirst => {
                self.timers.schedule(
                    TimerKey::LoginState,
                    LOGIN_STATE_DELAY,
                    TimerTask::LoginState(account),
                );
            }
        }
        self.invalidate_root();
    }

    fn update_playback_state(&mut self, account: AccountType) {
        if account == AccountType::None {
            self.player.stop(&self.library);
            let mut event = ScriptedEvent::new(PlaybackState::Error)
                .with_error(StateErrorCode::AuthenticationExpired, "No account");
            event.action_label = Some("Select account".to_string());
            event.resolution = EventResolution::OpenSettings;
            self.player.publish_event_state(&self.library, &event);
        } else {
            // Fresh sign-in: a paused placeholder that only offers prepare.
            self.bus
                .emit(SessionEvent::PlaybackState(PlaybackSnapshot {
                    state: PlaybackState::Paused,
                    position_ms: 0,
                    speed: 0.0,
                    error: None,
                    resolution: None,
                    actions: vec![SessionAction::Prepare],
                    active_queue_id: None,
                    custom_actions: Vec::new(),
                }))
                .ok();
        }
    }

    fn invalidate_root(&mut self) {
        self.bus
            .emit(SessionEvent::ChildrenChanged {
                parent: ROOT_PATH.to_string(),
            })
            .ok();
    }

    // ------------------------------------------------------------------
    // Browse custom actions
    // ------------------------------------------------------------------

    fn handle_custom_action(
        &mut self,
        action_id: &str,
        media_id: &str,
        reply_to: mpsc::UnboundedSender<ActionReply>,
    ) {
        let action = BrowseAction::from_id(action_id);
        let node = self.library.resolve(media_id);
        let (Some(action), Some(node)) = (action, node) else {
            warn!(action_id, media_id, "invalid custom action or target");
            ActionResultSender::new(reply_to)
                .set_message("Invalid action")
                .send_to(ReplyKind::Error)
                .send(&mut self.replies);
            return;
        };
        debug!(?action, media_id, "custom action");

        match action {
            BrowseAction::Download => {
                // Two results under the chain tokens: an immediate progress
                // update flipping the item to "downloading", then the final
                // result flipping it to "downloaded". Cancelling the
                // download before the delay elapses supersedes the final
                // result through the shared token.
                ActionResultSender::new(reply_to.clone())
                    .set_refresh_media_id(media_id)
                    .send_to_keyed(ActionToken::Kind(BrowseAction::Download), ReplyKind::Progress)
                    .on_complete(move |library| {
                        library.replace_browse_action(
                            node,
                            BrowseAction::Download,
                            BrowseAction::Downloading,
                        );
                    })
                    .send(&mut self.replies);
                ActionResultSender::new(reply_to)
                    .set_refresh_media_id(media_id)
                    .set_message("Download complete")
                    .send_to_delayed(
                        ActionToken::Kind(BrowseAction::Downloading),
                        DOWNLOAD_COMPLETE_DELAY,
                        ReplyKind::Result,
                    )
                    .on_complete(move |library| {
                        library.replace_browse_action(
                            node,
                            BrowseAction::Downloading,
                            BrowseAction::Downloaded,
                        );
                    })
                    .send(&mut self.replies);
            }
            BrowseAction::Downloading | BrowseAction::Downloaded => {
                ActionResultSender::new(reply_to)
                    .set_refresh_media_id(media_id)
                    .set_message("Download removed")
                    .send_to_keyed(ActionToken::Kind(BrowseAction::Downloading), ReplyKind::Result)
                    .on_complete(move |library| {
                        library.replace_browse_action(node, action, BrowseAction::Download);
                    })
                    .send(&mut self.replies);
            }
            BrowseAction::Favorite => {
                ActionResultSender::new(reply_to)
                    .set_refresh_media_id(media_id)
                    .set_message("Added to favorites")
                    .send_to(ReplyKind::Result)
                    .on_complete(move |library| {
                        library.replace_browse_action(node, action, BrowseAction::Favorited);
                    })
                    .send(&mut self.replies);
            }
            BrowseAction::Favorited => {
                ActionResultSender::new(reply_to)
                    .set_refresh_media_id(media_id)
                    .set_message("Removed from favorites")
                    .send_to(ReplyKind::Result)
                    .on_complete(move |library| {
                        library.replace_browse_action(node, action, BrowseAction::Favorite);
                    })
                    .send(&mut self.replies);
            }
            BrowseAction::AddToQueue => {
                self.player.add_to_queue(&mut self.library, media_id);
                ActionResultSender::new(reply_to)
                    .set_refresh_media_id(media_id)
                    .set_show_playback_view(true)
                    .send_to(ReplyKind::Result)
                    .on_complete(move |library| {
                        library.replace_browse_action(
                            node,
                            BrowseAction::AddToQueue,
                            BrowseAction::RemoveFromQueue,
                        );
                    })
                    .send(&mut self.replies);
            }
            BrowseAction::RemoveFromQueue => {
                self.player.remove_from_queue(&mut self.library, media_id);
                ActionResultSender::new(reply_to)
                    .set_refresh_media_id(media_id)
                    .set_show_playback_view(true)
                    .send_to(ReplyKind::Result)
                    .on_complete(move |library| {
                        library.replace_browse_action(
                            node,
                            BrowseAction::RemoveFromQueue,
                            BrowseAction::AddToQueue,
                        );
                    })
                    .send(&mut self.replies);
            }
            BrowseAction::ErrorAction => {
                ActionResultSender::new(reply_to)
                    .set_refresh_media_id(media_id)
                    .set_message("Action failed")
                    .send_to(ReplyKind::Error)
                    .send(&mut self.replies);
            }
            BrowseAction::BrowseNode => {
                ActionResultSender::new(reply_to)
                    .set_refresh_media_id(media_id)
                    .set_browse_node(media_id)
                    .send_to(ReplyKind::Result)
                    .send(&mut self.replies);
            }
            BrowseAction::ShowPlaybackView => {
                ActionResultSender::new(reply_to)
                    .set_refresh_media_id(media_id)
                    .set_show_playback_view(true)
                    .send_to(ReplyKind::Result)
                    .send(&mut self.replies);
            }
        }
    }
}

impl std::fmt::Debug for MediaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaService")
            .field("config", &self.config)
            .field("library", &self.library)
            .field("player", &self.player)
            .finish()
    }
}
