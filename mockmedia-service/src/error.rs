//! Error types for the service façade.

use thiserror::Error;

/// Failures surfaced by [`crate::service::MediaServiceHandle`].
///
/// Simulated backend failures are not errors here; they come back as ordinary
/// replies and published snapshots. The only thing that can actually fail is
/// talking to the service task itself.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service task has stopped; no further commands can be delivered.
    #[error("media service is no longer running")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ServiceError>;
