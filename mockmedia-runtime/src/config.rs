//! # Fixture Configuration
//!
//! Read-only enum knobs an operator flips to select a scenario. The fixture
//! core never persists these; it only switches on them. Each knob mirrors one
//! failure mode or timing profile a client under test must survive.
//!
//! ## Usage
//!
//! ```rust
//! use mockmedia_runtime::config::{AccountType, FixtureConfig, ReplyDelay};
//!
//! let config = FixtureConfig::default()
//!     .with_account(AccountType::Paid)
//!     .with_reply_delay(ReplyDelay::Short);
//! assert_eq!(config.reply_delay.delay().as_millis(), 50);
//! ```
//!
//! `FixtureConfig` is plain data: the service owns one copy and replaces
//! fields when the operator issues an explicit change command.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Simulated sign-in state of the backend account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Nobody signed in; browsing is refused and playback publishes an
    /// authentication error with a settings resolution hint.
    #[default]
    None,
    /// Signed in without a subscription; premium-gated scripted events stall.
    Free,
    /// Fully entitled account; every scripted event fires.
    Paid,
}

impl AccountType {
    pub fn is_signed_in(self) -> bool {
        self != AccountType::None
    }
}

/// Which content tree the browse root resolves to.
///
/// Each kind exercises a different client code path: well-formed trees,
/// degenerate trees, and outright refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RootKind {
    /// Only browsable children under the root.
    #[default]
    NodeChildren,
    /// No root at all; every path query fails to resolve.
    Null,
    /// A root that resolves but has zero children.
    Empty,
    /// No browsable content; a play queue is published at startup instead.
    QueueOnly,
    /// A single browsable tab.
    SingleTab,
    /// Only playable children under the root (working and error cases).
    LeafChildren,
    /// Browsable and playable children mixed at the top level.
    MixedChildren,
    /// Items flagged neither playable nor browsable.
    Untagged,
}

/// Artificial latency applied to browse replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyDelay {
    #[default]
    None,
    Short,
    ShortPlus,
    Medium,
    MediumPlus,
    Long,
    ExtraLong,
}

impl ReplyDelay {
    /// The latency this tier adds before a browse reply is delivered.
    pub fn delay(self) -> Duration {
        let ms = match self {
            ReplyDelay::None => 0,
            ReplyDelay::Short => 50,
            ReplyDelay::ShortPlus => 150,
            ReplyDelay::Medium => 500,
            ReplyDelay::MediumPlus => 2_000,
            ReplyDelay::Long => 5_000,
            ReplyDelay::ExtraLong => 10_000,
        };
        Duration::from_millis(ms)
    }
}

/// Which signal a sign-in publishes first.
///
/// Well-behaved backends update playback state before invalidating the browse
/// tree, but some real ones do the opposite; clients must tolerate both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoginEventOrder {
    #[default]
    PlaybackStateFirst,
    BrowseTreeFirst,
}

/// The full set of scenario knobs, passed to the service at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FixtureConfig {
    pub account: AccountType,
    pub root_kind: RootKind,
    pub reply_delay: ReplyDelay,
    pub login_order: LoginEventOrder,
}

impl FixtureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: AccountType) -> Self {
        self.account = account;
        self
    }

    pub fn with_root_kind(mut self, kind: RootKind) -> Self {
        self.root_kind = kind;
        self
    }

    pub fn with_reply_delay(mut self, delay: ReplyDelay) -> Self {
        self.reply_delay = delay;
        self
    }

    pub fn with_login_order(mut self, order: LoginEventOrder) -> Self {
        self.login_order = order;
        self
    }
}
