//! # Browsing Façade
//!
//! The outward-facing orchestrator of the fixture: a single actor task that
//! owns the content library, the scripted player and every timer, driven
//! through a cloneable handle. Clients browse the tree, search it, look up
//! items, dispatch custom actions and operate the transport; all state the
//! fixture publishes in response flows out on the shared session bus, and
//! action outcomes come back on per-request reply channels.
//!
//! See [`service::MediaService`] for the actor and
//! [`action_result::ActionResultSender`] for the delayed result mechanism.

pub mod action_result;
pub mod error;
pub mod service;

pub use action_result::{ActionPayload, ActionReply, ActionResultSender, ActionToken, ReplyKind};
pub use error::{Result, ServiceError};
pub use service::{ItemSnapshot, MediaService, MediaServiceHandle};
