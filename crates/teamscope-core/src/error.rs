//! Boundary errors surfaced to query consumers.

use thiserror::Error;

/// Errors a query consumer is expected to map to a client-visible response.
///
/// Store I/O failures travel as `anyhow::Error`; these variants cover the
/// cases that are the caller's fault or a normal "absent" outcome.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The identifier failed the allow-list check and was never looked up
    #[error("invalid team name: {name:?}")]
    InvalidTeamName { name: String },

    /// The team is not present in the store
    #[error("team not found: {name}")]
    TeamNotFound { name: String },
}
