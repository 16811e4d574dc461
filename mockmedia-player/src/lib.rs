//! # Scripted Playback State Machine
//!
//! Simulates all media interactions without playing any sound. The
//! [`player::Player`] owns the play queue, the active-item cursor, and the
//! event cursor into the active item's scripted event list; transport verbs
//! drive it exactly like a session callback would drive a real player, and
//! every resulting state change is published on the session bus.
//!
//! Two timers, both on the player's own [`mockmedia_runtime::Timeline`]:
//! the script tick (fires the next scripted event after its authored delay)
//! and the track-end timer (auto-stops a playing item when its declared
//! duration runs out). The owner of the player awaits the timeline and feeds
//! expirations back through [`player::Player::handle_timer`], which keeps the
//! whole machine on one cooperative timeline.

pub mod player;

pub use player::{Player, PlayerTimer};
