//! Live channels: periodic aggregation turned into a de-duplicated push stream.
//!
//! Each open channel owns one spawned task with two timers (data poll and
//! heartbeat) and a cancellation token tied to the client connection.

mod fingerprint;
mod publisher;

pub use fingerprint::Fingerprint;
pub use publisher::{
    open_channel, ChannelEvent, ChannelHandle, ChannelState, PublisherConfig, SnapshotSource,
    StreamMessage, FETCH_ERROR_MESSAGE,
};
