//! Change-detecting publisher for one live channel.
//!
//! ```text
//! STARTING --first poll--> STREAMING --cancel / receiver gone--> CLOSED
//! ```
//!
//! While streaming, the data timer polls the source and forwards an
//! `update` only when the fingerprint of the (filtered) result changes.
//! The heartbeat timer runs on its own phase and is never suppressed.
//! Fetch failures become `error` events; the channel keeps ticking.

use anyhow::Result;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::monitor::{TeamMonitor, TeamMonitorData};

use super::fingerprint::Fingerprint;

/// Client-visible text of an `error` event
pub const FETCH_ERROR_MESSAGE: &str = "Failed to fetch monitor data";

/// Something a channel can poll for the full snapshot list
pub trait SnapshotSource: Send + Sync + 'static {
    /// One aggregation pass over every team
    fn snapshots(&self) -> impl Future<Output = Result<Vec<TeamMonitorData>>> + Send;
}

impl SnapshotSource for TeamMonitor {
    fn snapshots(&self) -> impl Future<Output = Result<Vec<TeamMonitorData>>> + Send {
        self.get_all_snapshots()
    }
}

/// Timer settings of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherConfig {
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3000),
            heartbeat_interval: Duration::from_millis(5000),
        }
    }
}

impl PublisherConfig {
    /// Shortest period either timer may run at
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Raise zero or sub-millisecond intervals to [`Self::MIN_INTERVAL`]
    pub fn clamped(self) -> Self {
        Self {
            poll_interval: self.poll_interval.max(Self::MIN_INTERVAL),
            heartbeat_interval: self.heartbeat_interval.max(Self::MIN_INTERVAL),
        }
    }
}

/// Typed payload of a channel event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamMessage {
    /// New content; `data` is filtered to one team when the channel is scoped
    Update {
        timestamp: i64,
        data: Vec<TeamMonitorData>,
    },
    /// The poll failed; the channel stays open
    Error { timestamp: i64, error: String },
}

/// What a channel pushes to its consumer
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Message(StreamMessage),
    /// Keep-alive with no payload
    Heartbeat,
}

/// Lifecycle of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Starting,
    Streaming,
    Closed,
}

/// Owner of a running channel
///
/// Dropping the handle cancels the channel, so tying it to the connection
/// object ties the timers to the connection's lifetime.
#[derive(Debug)]
pub struct ChannelHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ChannelState>,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    /// Current lifecycle state
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Stop both timers and close the channel; safe to call repeatedly
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Wait until the channel task has finished
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Channel task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Open a channel that streams `source` into `sender`
///
/// `filter` scopes the channel to one team: results are filtered before
/// fingerprinting, so other teams' changes never wake it. `cancel` may be a
/// child of a server-wide token. Must be called within a tokio runtime.
pub fn open_channel<S: SnapshotSource>(
    source: Arc<S>,
    filter: Option<String>,
    config: PublisherConfig,
    sender: mpsc::Sender<ChannelEvent>,
    cancel: CancellationToken,
) -> ChannelHandle {
    let (state_tx, state_rx) = watch::channel(ChannelState::Starting);

    let channel = Channel {
        filter,
        config: config.clamped(),
        sender,
        cancel: cancel.clone(),
        state: state_tx,
        last_fingerprint: None,
    };
    let task = tokio::spawn(channel.run(source));

    ChannelHandle {
        cancel,
        state: state_rx,
        task: Some(task),
    }
}

type PollFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<TeamMonitorData>>> + Send + 'a>>;

/// Resolve the in-flight poll, or never if there is none
async fn next_poll(slot: &mut Option<PollFuture<'_>>) -> Result<Vec<TeamMonitorData>> {
    match slot {
        Some(poll) => poll.await,
        None => std::future::pending().await,
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// State owned by the channel task
struct Channel {
    filter: Option<String>,
    config: PublisherConfig,
    sender: mpsc::Sender<ChannelEvent>,
    cancel: CancellationToken,
    state: watch::Sender<ChannelState>,
    /// `None` until the first successful poll, so that poll always emits
    last_fingerprint: Option<Fingerprint>,
}

impl Channel {
    async fn run<S: SnapshotSource>(mut self, source: Arc<S>) {
        tracing::debug!(team = ?self.filter, "Channel opened");

        let first = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.close();
                return;
            }
            result = source.snapshots() => result,
        };
        if !self.handle_poll(first).await {
            self.close();
            return;
        }

        let start = Instant::now();
        let mut data_timer = interval_at(start + self.config.poll_interval, self.config.poll_interval);
        data_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut heartbeat_timer = interval_at(
            start + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        heartbeat_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.state.send_replace(ChannelState::Streaming);

        // At most one poll in flight; it runs alongside the heartbeat timer
        let mut in_flight: Option<PollFuture<'_>> = None;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = next_poll(&mut in_flight) => {
                    in_flight = None;
                    if !self.handle_poll(result).await {
                        break;
                    }
                }
                _ = data_timer.tick() => {
                    if in_flight.is_none() {
                        in_flight = Some(Box::pin(source.snapshots()));
                    } else {
                        tracing::debug!(team = ?self.filter, "Poll still in flight, skipping tick");
                    }
                }
                _ = heartbeat_timer.tick() => {
                    if !self.emit(ChannelEvent::Heartbeat).await {
                        break;
                    }
                }
            }
        }

        drop(in_flight);
        self.close();
    }

    /// Apply the scope filter, diff and maybe emit; false once the channel is dead
    async fn handle_poll(&mut self, result: Result<Vec<TeamMonitorData>>) -> bool {
        let mut data = match result {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Error fetching monitor data: {:#}", e);
                return self.emit_error().await;
            }
        };

        if let Some(team) = &self.filter {
            data.retain(|snapshot| snapshot.name() == team);
        }

        let fingerprint = match Fingerprint::of(&data) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                tracing::error!("Failed to serialize monitor data: {}", e);
                return self.emit_error().await;
            }
        };

        if self.last_fingerprint.as_ref() == Some(&fingerprint) {
            return true;
        }
        self.last_fingerprint = Some(fingerprint);

        self.emit(ChannelEvent::Message(StreamMessage::Update {
            timestamp: now_millis(),
            data,
        }))
        .await
    }

    async fn emit_error(&mut self) -> bool {
        self.emit(ChannelEvent::Message(StreamMessage::Error {
            timestamp: now_millis(),
            error: FETCH_ERROR_MESSAGE.to_string(),
        }))
        .await
    }

    /// Send to the consumer; a gone receiver marks the channel closed
    async fn emit(&mut self, event: ChannelEvent) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let delivered = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.sender.send(event) => sent.is_ok(),
        };
        if !delivered {
            tracing::debug!(team = ?self.filter, "Channel consumer gone, closing");
            self.cancel.cancel();
        }
        delivered
    }

    fn close(&mut self) {
        self.cancel.cancel();
        self.state.send_replace(ChannelState::Closed);
        tracing::debug!(team = ?self.filter, "Channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teams::{TaskStatus, TeamConfig, TeamTask};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Step = std::result::Result<Vec<TeamMonitorData>, String>;

    /// Source that replays a script; the last step repeats forever
    struct ScriptedSource {
        steps: Mutex<VecDeque<Step>>,
        last: Mutex<Option<Step>>,
        delay: Duration,
        polls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Self::with_delay(steps, Duration::ZERO)
        }

        fn with_delay(steps: Vec<Step>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                last: Mutex::new(None),
                delay,
                polls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }

        fn next_step(&self) -> Step {
            let next = self.steps.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(step) = next {
                *last = Some(step);
            }
            last.clone().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    impl SnapshotSource for ScriptedSource {
        fn snapshots(&self) -> impl Future<Output = Result<Vec<TeamMonitorData>>> + Send {
            async move {
                self.polls.fetch_add(1, Ordering::SeqCst);
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                self.next_step().map_err(anyhow::Error::msg)
            }
        }
    }

    fn team(name: &str, status: TaskStatus) -> TeamMonitorData {
        let config: TeamConfig =
            serde_json::from_value(serde_json::json!({ "name": name })).unwrap();
        let mut task: TeamTask = serde_json::from_value(serde_json::json!({ "id": "1" })).unwrap();
        task.status = status;
        TeamMonitorData::new(config, vec![task])
    }

    fn open(
        source: Arc<ScriptedSource>,
        filter: Option<&str>,
    ) -> (ChannelHandle, mpsc::Receiver<ChannelEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let handle = open_channel(
            source,
            filter.map(str::to_string),
            PublisherConfig::default(),
            tx,
            CancellationToken::new(),
        );
        (handle, rx)
    }

    fn update_data(event: &ChannelEvent) -> &[TeamMonitorData] {
        match event {
            ChannelEvent::Message(StreamMessage::Update { data, .. }) => data,
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_first_poll_emits_immediately() {
        let source = ScriptedSource::new(vec![Ok(vec![team("alpha", TaskStatus::Pending)])]);
        let start = Instant::now();
        let (handle, mut rx) = open(source, None);

        let event = rx.recv().await.unwrap();
        assert_eq!(update_data(&event).len(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);

        let mut state = handle.state.clone();
        state
            .wait_for(|s| *s == ChannelState::Streaming)
            .await
            .unwrap();
        assert_eq!(handle.state(), ChannelState::Streaming);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_unchanged_polls_are_suppressed() {
        let source = ScriptedSource::new(vec![Ok(vec![team("alpha", TaskStatus::Pending)])]);
        let start = Instant::now();
        let (_handle, mut rx) = open(source.clone(), None);

        assert!(matches!(rx.recv().await.unwrap(), ChannelEvent::Message(_)));

        // Polls at 3s and 6s see the same content; only heartbeats follow
        assert_eq!(rx.recv().await.unwrap(), ChannelEvent::Heartbeat);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(rx.recv().await.unwrap(), ChannelEvent::Heartbeat);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert!(source.polls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_status_change_emits_one_update() {
        let source = ScriptedSource::new(vec![
            Ok(vec![team("alpha", TaskStatus::Pending)]),
            Ok(vec![team("alpha", TaskStatus::Pending)]),
            Ok(vec![team("alpha", TaskStatus::Completed)]),
        ]);
        let start = Instant::now();
        let (_handle, mut rx) = open(source, None);

        let first = rx.recv().await.unwrap();
        assert_eq!(update_data(&first)[0].tasks[0].status, TaskStatus::Pending);

        assert_eq!(rx.recv().await.unwrap(), ChannelEvent::Heartbeat);

        let changed = rx.recv().await.unwrap();
        assert_eq!(update_data(&changed)[0].tasks[0].status, TaskStatus::Completed);
        assert_eq!(start.elapsed(), Duration::from_secs(6));

        // Completed repeats from here on: nothing but heartbeats
        assert_eq!(rx.recv().await.unwrap(), ChannelEvent::Heartbeat);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_fetch_error_keeps_channel_open() {
        let source = ScriptedSource::new(vec![
            Err("disk on fire".to_string()),
            Ok(vec![team("alpha", TaskStatus::Pending)]),
        ]);
        let (handle, mut rx) = open(source, None);

        match rx.recv().await.unwrap() {
            ChannelEvent::Message(StreamMessage::Error { error, .. }) => {
                assert_eq!(error, FETCH_ERROR_MESSAGE)
            }
            other => panic!("expected error, got {:?}", other),
        }

        // The error did not touch the fingerprint, so the next success emits
        let event = rx.recv().await.unwrap();
        assert_eq!(update_data(&event).len(), 1);
        assert_eq!(handle.state(), ChannelState::Streaming);
    }

    #[test]
    fn test_message_wire_shape() {
        let error = StreamMessage::Error {
            timestamp: 1_700_000_000_000,
            error: FETCH_ERROR_MESSAGE.to_string(),
        };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            serde_json::json!({
                "type": "error",
                "timestamp": 1_700_000_000_000_i64,
                "error": "Failed to fetch monitor data"
            })
        );

        let update = StreamMessage::Update {
            timestamp: 42,
            data: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "type": "update", "timestamp": 42, "data": [] })
        );
    }

    #[test]
    fn test_config_clamps_zero_intervals() {
        let config = PublisherConfig {
            poll_interval: Duration::ZERO,
            heartbeat_interval: Duration::from_secs(5),
        }
        .clamped();
        assert_eq!(config.poll_interval, PublisherConfig::MIN_INTERVAL);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_zero_intervals_still_stream() {
        let source = ScriptedSource::new(vec![Ok(vec![team("alpha", TaskStatus::Pending)])]);
        let (tx, mut rx) = mpsc::channel(16);
        let handle = open_channel(
            source,
            None,
            PublisherConfig {
                poll_interval: Duration::ZERO,
                heartbeat_interval: Duration::ZERO,
            },
            tx,
            CancellationToken::new(),
        );

        assert_eq!(update_data(&rx.recv().await.unwrap()).len(), 1);
        assert_eq!(rx.recv().await.unwrap(), ChannelEvent::Heartbeat);

        let mut state = handle.state.clone();
        state
            .wait_for(|s| *s == ChannelState::Streaming)
            .await
            .unwrap();
        handle.close();
        handle.join().await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_team_filter_ignores_other_teams() {
        let source = ScriptedSource::new(vec![
            Ok(vec![
                team("alpha", TaskStatus::Pending),
                team("beta", TaskStatus::Pending),
            ]),
            Ok(vec![
                team("alpha", TaskStatus::Pending),
                team("beta", TaskStatus::Completed),
            ]),
        ]);
        let (_handle, mut rx) = open(source, Some("alpha"));

        let first = rx.recv().await.unwrap();
        let data = update_data(&first);
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].name(), "alpha");

        // beta changed at 3s; alpha's channel only hears heartbeats
        assert_eq!(rx.recv().await.unwrap(), ChannelEvent::Heartbeat);
        assert_eq!(rx.recv().await.unwrap(), ChannelEvent::Heartbeat);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_close_is_idempotent() {
        let source = ScriptedSource::new(vec![Ok(Vec::new())]);
        let (handle, mut rx) = open(source, None);

        assert!(matches!(rx.recv().await.unwrap(), ChannelEvent::Message(_)));

        handle.close();
        handle.close();
        let state = handle.state.clone();
        handle.join().await;

        assert_eq!(*state.borrow(), ChannelState::Closed);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_parent_token_cancels_channel() {
        let parent = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(16);
        let handle = open_channel(
            ScriptedSource::new(vec![Ok(Vec::new())]),
            None,
            PublisherConfig::default(),
            tx,
            parent.child_token(),
        );

        assert!(rx.recv().await.is_some());
        parent.cancel();
        handle.join().await;
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_receiver_drop_closes_channel() {
        let source = ScriptedSource::new(vec![Ok(Vec::new())]);
        let (handle, rx) = open(source, None);
        let mut state = handle.state.clone();
        drop(rx);

        // The first emit fails and the task winds down on its own
        state
            .wait_for(|s| *s == ChannelState::Closed)
            .await
            .unwrap();
        handle.join().await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_slow_polls_never_overlap() {
        let source = ScriptedSource::with_delay(
            vec![Ok(vec![team("alpha", TaskStatus::Pending)])],
            Duration::from_secs(7),
        );
        let (handle, mut rx) = open(source.clone(), None);

        // First poll completes at 7s; afterwards ticks arrive every 3s while
        // each poll takes 7s, so skipped ticks are expected
        assert!(matches!(rx.recv().await.unwrap(), ChannelEvent::Message(_)));
        for _ in 0..6 {
            assert_eq!(rx.recv().await.unwrap(), ChannelEvent::Heartbeat);
        }

        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        handle.close();
        handle.join().await;
    }
}
