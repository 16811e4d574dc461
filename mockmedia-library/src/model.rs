//! Domain models for the simulated content tree.
//!
//! A tree is authored as nested [`NodeDef`] values (deserializable from the
//! fixture JSON), then interned into arena-owned [`Node`]s addressed by
//! [`NodeId`]. Everything a traversal reads is immutable after interning
//! except the small mutable subset the fixture uses to simulate live edits:
//! the hidden flag, the browse-action list, the heart counter, and the reveal
//! counter. Those are only ever written through the `Library` API.

use mockmedia_runtime::events::{CustomActionDescriptor, PlaybackState, StateErrorCode};
use serde::{Deserialize, Serialize};

/// Separator between the segments of an identity path.
///
/// Must not occur in source-file paths, which form the first segment of
/// non-root identity paths and contain `/`.
pub const TREE_PATH_SEPARATOR: char = '|';

/// Short id of the synthetic browse root.
pub const ROOT_MEDIA_ID: &str = "_ROOT_";

/// Identity path of the synthetic browse root, as handed to clients.
pub const ROOT_PATH: &str = "_ROOT_|";

// ============================================================================
// Ids and filters
// ============================================================================

/// Arena index of a node. Only meaningful for the `Library` that minted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Flag filter applied by children queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeFilter {
    #[default]
    Any,
    Playable,
    Browsable,
}

// ============================================================================
// Styles and actions
// ============================================================================

/// Display-style hint attached to a node. The entry names are the values
/// used in the fixture JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentStyle {
    #[default]
    None,
    List,
    Grid,
    ListCategory,
    GridCategory,
}

/// Play-time custom actions attached to the active item.
///
/// A closed set with an exhaustive id/label/icon table; clients dispatch on
/// the id string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackAction {
    HeartPlusPlus,
    HeartLessLess,
    RequestLocation,
}

impl PlaybackAction {
    pub const ALL: [PlaybackAction; 3] = [
        PlaybackAction::HeartPlusPlus,
        PlaybackAction::HeartLessLess,
        PlaybackAction::RequestLocation,
    ];

    pub fn id(self) -> &'static str {
        match self {
            PlaybackAction::HeartPlusPlus => "com.mockmedia.fixture.heart_plus_plus",
            PlaybackAction::HeartLessLess => "com.mockmedia.fixture.heart_less_less",
            PlaybackAction::RequestLocation => "com.mockmedia.fixture.location",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaybackAction::HeartPlusPlus => "Heart ++",
            PlaybackAction::HeartLessLess => "Heart --",
            PlaybackAction::RequestLocation => "Request location",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            PlaybackAction::HeartPlusPlus => "drawable/ic_heart_plus_plus",
            PlaybackAction::HeartLessLess => "drawable/ic_heart_less_less",
            PlaybackAction::RequestLocation => "drawable/ic_location",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.id() == id)
    }

    pub fn descriptor(self) -> CustomActionDescriptor {
        CustomActionDescriptor {
            id: self.id().to_string(),
            label: self.label().to_string(),
            icon: self.icon().to_string(),
        }
    }
}

/// Browse-time custom actions shown on items in the tree.
///
/// The download actions form a three-state chain (download → downloading →
/// downloaded); favorite/favorited and the queue pair toggle in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowseAction {
    Download,
    Downloading,
    Downloaded,
    Favorite,
    Favorited,
    AddToQueue,
    RemoveFromQueue,
    ErrorAction,
    BrowseNode,
    ShowPlaybackView,
}

impl BrowseAction {
    pub const ALL: [BrowseAction; 10] = [
        BrowseAction::Download,
        BrowseAction::Downloading,
        BrowseAction::Downloaded,
        BrowseAction::Favorite,
        BrowseAction::Favorited,
        BrowseAction::AddToQueue,
        BrowseAction::RemoveFromQueue,
        BrowseAction::ErrorAction,
        BrowseAction::BrowseNode,
        BrowseAction::ShowPlaybackView,
    ];

    pub fn id(self) -> &'static str {
        match self {
            BrowseAction::Download => "com.mockmedia.fixture.DOWNLOAD",
            BrowseAction::Downloading => "com.mockmedia.fixture.DOWNLOADING",
            BrowseAction::Downloaded => "com.mockmedia.fixture.DOWNLOAD-COMPLETE",
            BrowseAction::Favorite => "com.mockmedia.fixture.FAVORITE",
            BrowseAction::Favorited => "com.mockmedia.fixture.FAVORITED",
            BrowseAction::AddToQueue => "com.mockmedia.fixture.ADD_TO_QUEUE",
            BrowseAction::RemoveFromQueue => "com.mockmedia.fixture.REMOVE_FROM_QUEUE",
            BrowseAction::ErrorAction => "com.mockmedia.fixture.ERROR_ACTION",
            BrowseAction::BrowseNode => "com.mockmedia.fixture.BROWSE_ACTION",
            BrowseAction::ShowPlaybackView => "com.mockmedia.fixture.PBV_ACTION",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BrowseAction::Download => "Download",
            BrowseAction::Downloading => "Downloading",
            BrowseAction::Downloaded => "Downloaded",
            BrowseAction::Favorite => "Favorite",
            BrowseAction::Favorited => "Favorited",
            BrowseAction::AddToQueue => "Add to queue",
            BrowseAction::RemoveFromQueue => "Remove from queue",
            BrowseAction::ErrorAction => "Error action",
            BrowseAction::BrowseNode => "Browse here",
            BrowseAction::ShowPlaybackView => "Open playback view",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            BrowseAction::Download => "drawable/ic_download_for_offline",
            BrowseAction::Downloading => "drawable/ic_downloading",
            BrowseAction::Downloaded => "drawable/ic_done_outline",
            BrowseAction::Favorite => "drawable/ic_favorite",
            BrowseAction::Favorited => "drawable/ic_favorited",
            BrowseAction::AddToQueue => "drawable/ic_playlist_add_check",
            BrowseAction::RemoveFromQueue => "drawable/ic_playlist_remove",
            BrowseAction::ErrorAction => "drawable/ic_close",
            BrowseAction::BrowseNode => "drawable/ic_subdirectory_arrow_left",
            BrowseAction::ShowPlaybackView => "drawable/ic_queue_music",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.id() == id)
    }
}

// ============================================================================
// Scripted events
// ============================================================================

/// How a published error can be resolved by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventResolution {
    #[default]
    None,
    /// Open the fixture settings surface.
    OpenSettings,
}

/// Side effect an event requests instead of (or before) a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventAction {
    #[default]
    None,
    /// Republish the active item's metadata unchanged.
    ResetMetadata,
}

/// One timed, pre-authored playback-state transition belonging to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedEvent {
    /// Target state this event drives the player into.
    pub state: PlaybackState,
    #[serde(default)]
    pub error_code: Option<StateErrorCode>,
    /// Human-readable message attached to the published state.
    #[serde(default)]
    pub message: Option<String>,
    /// Label for the resolution affordance, when `resolution` is set.
    #[serde(default)]
    pub action_label: Option<String>,
    #[serde(default)]
    pub resolution: EventResolution,
    #[serde(default)]
    pub action: EventAction,
    /// Delay from the previous event (or from playback start for the first).
    #[serde(default)]
    pub post_delay_ms: u64,
    /// Short id of a sibling whose visibility this event toggles.
    #[serde(default)]
    pub toggle_sibling: Option<String>,
    /// Fires only for non-free accounts; under a free account the script
    /// stalls on this event until the account changes.
    #[serde(default)]
    pub requires_paid_account: bool,
}

impl ScriptedEvent {
    pub fn new(state: PlaybackState) -> Self {
        Self {
            state,
            error_code: None,
            message: None,
            action_label: None,
            resolution: EventResolution::None,
            action: EventAction::None,
            post_delay_ms: 0,
            toggle_sibling: None,
            requires_paid_account: false,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.post_delay_ms = delay_ms;
        self
    }

    pub fn with_error(mut self, code: StateErrorCode, message: impl Into<String>) -> Self {
        self.error_code = Some(code);
        self.message = Some(message.into());
        self
    }
}

// ============================================================================
// Source definitions
// ============================================================================

/// One node of a source file, as authored. Recursive; interned into the
/// arena by the `Library`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeDef {
    /// Short id, unique within the source file level it appears at.
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub playable: bool,
    #[serde(default)]
    pub browsable: bool,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub playable_style: ContentStyle,
    #[serde(default)]
    pub browsable_style: ContentStyle,
    #[serde(default)]
    pub single_item_style: ContentStyle,
    /// When set, browsing this node reveals children progressively and
    /// re-notifies the client after this many milliseconds.
    #[serde(default)]
    pub self_update_ms: Option<u64>,
    /// Path of another source file whose top-level children are logically
    /// appended to this node's own.
    #[serde(default)]
    pub include: Option<String>,
    #[serde(default)]
    pub custom_actions: Vec<PlaybackAction>,
    /// Browse-action ids, in display order.
    #[serde(default)]
    pub browse_actions: Vec<String>,
    /// Events triggered when starting playback.
    #[serde(default)]
    pub events: Vec<ScriptedEvent>,
    #[serde(default)]
    pub hidden: bool,
    /// Completion percentage shown on the item, 0.0..=1.0.
    #[serde(default)]
    pub completion_percent: Option<f64>,
    #[serde(default)]
    pub children: Vec<NodeDef>,
}

impl NodeDef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// A browsable branch holding `children`.
    pub fn branch(id: impl Into<String>, children: Vec<NodeDef>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            browsable: true,
            children,
            ..Self::new(id)
        }
    }

    /// A playable leaf.
    pub fn leaf(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            playable: true,
            ..Self::new(id)
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_events(mut self, events: Vec<ScriptedEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_include(mut self, path: impl Into<String>) -> Self {
        self.include = Some(path.into());
        self
    }

    pub fn with_self_update_ms(mut self, delay_ms: u64) -> Self {
        self.self_update_ms = Some(delay_ms);
        self
    }

    pub fn with_browse_actions(mut self, actions: Vec<BrowseAction>) -> Self {
        self.browse_actions = actions.iter().map(|a| a.id().to_string()).collect();
        self
    }

    pub fn with_custom_actions(mut self, actions: Vec<PlaybackAction>) -> Self {
        self.custom_actions = actions;
        self
    }

    pub fn with_single_item_style(mut self, style: ContentStyle) -> Self {
        self.single_item_style = style;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

// ============================================================================
// Arena nodes
// ============================================================================

/// One interned entry of the content tree.
///
/// Obtained by reference from the `Library`; the mutable subset (hidden,
/// browse actions, hearts, reveal counter) is written only through the
/// library's own methods.
#[derive(Debug, Clone)]
pub struct Node {
    /// Short id; one segment of the identity path.
    pub short_id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub playable: bool,
    pub browsable: bool,
    /// `None` when the source declared no (or a non-positive) duration.
    pub duration_ms: Option<u64>,
    pub playable_style: ContentStyle,
    pub browsable_style: ContentStyle,
    pub single_item_style: ContentStyle,
    pub self_update_ms: Option<u64>,
    pub include: Option<String>,
    pub custom_actions: Vec<PlaybackAction>,
    pub browse_actions: Vec<String>,
    pub events: Vec<ScriptedEvent>,
    pub completion_percent: Option<f64>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,

    // Mutable subset, written through the Library only.
    pub hidden: bool,
    pub hearts: i64,
    pub reveal_counter: usize,
}

impl Node {
    pub(crate) fn from_def(def: &NodeDef, parent: Option<NodeId>) -> Self {
        Self {
            short_id: def.id.clone(),
            title: def.title.clone(),
            subtitle: def.subtitle.clone(),
            playable: def.playable,
            browsable: def.browsable,
            duration_ms: def.duration_ms.filter(|d| *d > 0),
            playable_style: def.playable_style,
            browsable_style: def.browsable_style,
            single_item_style: def.single_item_style,
            self_update_ms: def.self_update_ms.filter(|d| *d > 0),
            include: def.include.clone(),
            custom_actions: def.custom_actions.clone(),
            browse_actions: def.browse_actions.clone(),
            events: def.events.clone(),
            completion_percent: def.completion_percent,
            children: Vec::new(),
            parent,
            hidden: def.hidden,
            hearts: 0,
            reveal_counter: 0,
        }
    }

    pub fn matches(&self, filter: NodeFilter) -> bool {
        match filter {
            NodeFilter::Any => true,
            NodeFilter::Playable => self.playable,
            NodeFilter::Browsable => self.browsable,
        }
    }
}

/// Strips the last segment off an identity path, keeping the trailing
/// separator: `"_ROOT_|A|B"` → `"_ROOT_|A|"`. The root path itself and
/// paths of two characters or fewer have no parent and map to `""`.
pub fn parent_path(media_id: &str) -> String {
    let len = media_id.chars().count();
    if len <= 2 {
        return String::new();
    }
    let head: String = media_id.chars().take(len - 1).collect();
    match head.rfind(TREE_PATH_SEPARATOR) {
        Some(idx) => media_id[..idx + TREE_PATH_SEPARATOR.len_utf8()].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTION_ID_PREFIX: &str = "com.mockmedia.fixture.";

    #[test]
    fn browse_action_ids_round_trip() {
        for action in BrowseAction::ALL {
            assert_eq!(BrowseAction::from_id(action.id()), Some(action));
            assert!(action.id().starts_with(ACTION_ID_PREFIX));
        }
        assert_eq!(BrowseAction::from_id("com.mockmedia.fixture.NOPE"), None);
    }

    #[test]
    fn playback_action_ids_round_trip() {
        for action in PlaybackAction::ALL {
            assert_eq!(PlaybackAction::from_id(action.id()), Some(action));
        }
        assert_eq!(PlaybackAction::from_id("heart_plus_plus"), None);
    }

    #[test]
    fn parent_path_strips_one_segment() {
        assert_eq!(parent_path("_ROOT_|A|B"), "_ROOT_|A|");
        assert_eq!(parent_path("_ROOT_|A"), "_ROOT_|");
        assert_eq!(parent_path("_ROOT_|"), "");
        assert_eq!(parent_path("ab"), "");
        assert_eq!(parent_path(""), "");
    }

    #[test]
    fn node_def_parses_from_fixture_json() {
        let json = r#"{
            "id": "track-1",
            "title": "First track",
            "playable": true,
            "duration_ms": 10000,
            "playable_style": "LIST",
            "single_item_style": "GRID",
            "browse_actions": ["com.mockmedia.fixture.DOWNLOAD"],
            "events": [
                { "state": "BUFFERING", "post_delay_ms": 100 },
                { "state": "PLAYING", "post_delay_ms": 500,
                  "requires_paid_account": true }
            ]
        }"#;

        let def: NodeDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.id, "track-1");
        assert!(def.playable && !def.browsable);
        assert_eq!(def.single_item_style, ContentStyle::Grid);
        assert_eq!(def.events.len(), 2);
        assert_eq!(def.events[0].state, PlaybackState::Buffering);
        assert!(def.events[1].requires_paid_account);
        assert_eq!(
            BrowseAction::from_id(&def.browse_actions[0]),
            Some(BrowseAction::Download)
        );
    }

    #[test]
    fn zero_duration_is_treated_as_unknown() {
        let def = NodeDef::leaf("t").with_duration_ms(0);
        let node = Node::from_def(&def, None);
        assert_eq!(node.duration_ms, None);
    }
}
