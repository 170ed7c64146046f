//! Aggregation engine: composes store reads and roster reconciliation into
//! per-team snapshots and summaries.

mod engine;
mod snapshot;

pub use engine::TeamMonitor;
pub use snapshot::{TeamMonitorData, TeamSummary};
