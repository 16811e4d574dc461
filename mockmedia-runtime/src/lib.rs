//! Ambient infrastructure for the mock media source fixture.
//!
//! This crate hosts everything the domain crates share but none of them owns:
//!
//! - `events`: the [`events::SessionBus`] broadcast channel through which the
//!   player and the browsing façade publish session state to the client under
//!   test.
//! - `timeline`: token-keyed, cancellable, coalescing timers — the single
//!   cooperative timeline every delayed callback in the fixture runs on.
//! - `config`: the read-only enum knobs (account type, root kind, reply
//!   delay, login event order) an operator uses to select a scenario.
//! - `logging`: tracing-subscriber setup.
//!
//! Nothing in here knows about media items or playback; the dependency arrow
//! points strictly from the domain crates down to this one.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod timeline;

pub use error::{Result, RuntimeError};
pub use events::{SessionBus, SessionEvent};
pub use timeline::{Timeline, TimelineToken};
