//! Allow-list validation of team identifiers received from clients.
//!
//! Team names address directories directly, so anything outside
//! `[A-Za-z0-9_-]{1,100}` is rejected before touching the filesystem.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::MonitorError;

static TEAM_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,100}$").expect("valid team name regex"));

/// Check a client-supplied team name
pub fn is_valid_team_name(name: &str) -> bool {
    // Traversal sequences are refused explicitly, independent of the pattern
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return false;
    }
    TEAM_NAME_PATTERN.is_match(name)
}

/// Like [`is_valid_team_name`], as a `Result` for `?` chains
pub fn validate_team_name(name: &str) -> Result<(), MonitorError> {
    if is_valid_team_name(name) {
        Ok(())
    } else {
        Err(MonitorError::InvalidTeamName {
            name: name.to_string(),
        })
    }
}
