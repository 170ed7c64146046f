//! Core library for teamscope.
//!
//! Reads the on-disk team registry (`~/.claude/teams`, `~/.claude/tasks`),
//! reconciles declared rosters against observed inbox activity, and turns
//! periodic aggregation passes into de-duplicated live channels.
//!
//! ```ignore
//! use teamscope_core::monitor::TeamMonitor;
//! use teamscope_core::teams::StorePaths;
//!
//! let monitor = TeamMonitor::new(StorePaths::resolve(None));
//! let summaries = monitor.get_summaries().await?;
//! ```

pub mod error;
pub mod monitor;
pub mod stream;
pub mod teams;

pub use error::MonitorError;
pub use monitor::{TeamMonitor, TeamMonitorData, TeamSummary};
pub use stream::{open_channel, ChannelEvent, ChannelHandle, PublisherConfig, SnapshotSource};
