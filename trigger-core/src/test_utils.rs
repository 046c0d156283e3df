//! Test doubles for the collaborators of a trigger.

use std::collections::VecDeque;
use std::future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{self, Instant};

use crate::Result;
use crate::error::Error;
use crate::event::{Event, OffsetInfo};
use crate::offset::OffsetTracker;
use crate::sinker::{Sink, SinkConnector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MockResponse {
    Ack,
    Reject,
    /// never answers, only a timeout or cancellation ends the attempt.
    Hang,
}

#[derive(Default)]
struct MockSinkState {
    script: VecDeque<MockResponse>,
    attempts: Vec<Instant>,
    acked: Vec<String>,
}

/// Sink which answers from a script and falls back to a default response once the script is
/// used up. Clones share the same state.
#[derive(Clone)]
pub(crate) struct MockSink {
    default: MockResponse,
    state: Arc<Mutex<MockSinkState>>,
}

impl MockSink {
    pub(crate) fn new(default: MockResponse) -> Self {
        Self {
            default,
            state: Arc::new(Mutex::new(MockSinkState::default())),
        }
    }

    pub(crate) fn with_script(self, script: Vec<MockResponse>) -> Self {
        self.state.lock().script = script.into();
        self
    }

    /// When every send attempt started.
    pub(crate) fn attempts(&self) -> Vec<Instant> {
        self.state.lock().attempts.clone()
    }

    pub(crate) fn acks(&self) -> usize {
        self.state.lock().acked.len()
    }

    pub(crate) fn acked_ids(&self) -> Vec<String> {
        self.state.lock().acked.clone()
    }
}

impl Sink for MockSink {
    async fn send(&self, event: &Event) -> Result<()> {
        let response = {
            let mut state = self.state.lock();
            state.attempts.push(Instant::now());
            let response = state.script.pop_front().unwrap_or(self.default);
            if response == MockResponse::Ack {
                state.acked.push(event.id.clone());
            }
            response
        };

        match response {
            MockResponse::Ack => Ok(()),
            MockResponse::Reject => Err(Error::Sink(format!("event {} rejected", event.id))),
            MockResponse::Hang => future::pending().await,
        }
    }
}

/// Hands out clones of the same [MockSink], or fails like an unreachable sink.
pub(crate) struct MockConnector {
    sink: MockSink,
    available: bool,
}

impl MockConnector {
    pub(crate) fn new(sink: MockSink) -> Self {
        Self {
            sink,
            available: true,
        }
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            sink: MockSink::new(MockResponse::Ack),
            available: false,
        }
    }
}

impl SinkConnector for MockConnector {
    type Sink = MockSink;

    fn connect(&self, target: &str) -> Result<Self::Sink> {
        if self.available {
            Ok(self.sink.clone())
        } else {
            Err(Error::SinkUnavailable(format!("{target} is unreachable")))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrackerOp {
    Receive(OffsetInfo),
    Commit(OffsetInfo),
}

/// Offset tracker which remembers every call in order.
#[derive(Debug, Default)]
pub(crate) struct RecordingTracker {
    ops: Mutex<Vec<TrackerOp>>,
}

impl RecordingTracker {
    pub(crate) fn ops(&self) -> Vec<TrackerOp> {
        self.ops.lock().clone()
    }

    pub(crate) fn receives(&self) -> Vec<OffsetInfo> {
        self.ops
            .lock()
            .iter()
            .filter_map(|op| match op {
                TrackerOp::Receive(offset) => Some(*offset),
                TrackerOp::Commit(_) => None,
            })
            .collect()
    }

    pub(crate) fn commits(&self) -> Vec<OffsetInfo> {
        self.ops
            .lock()
            .iter()
            .filter_map(|op| match op {
                TrackerOp::Commit(offset) => Some(*offset),
                TrackerOp::Receive(_) => None,
            })
            .collect()
    }

    /// Waits until at least `count` commits happened, panics if it takes too long.
    pub(crate) async fn wait_for_commits(&self, count: usize) {
        for _ in 0..1000 {
            if self.commits().len() >= count {
                return;
            }
            time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {count} commits, got {}",
            self.commits().len()
        );
    }
}

impl OffsetTracker for RecordingTracker {
    fn event_receive(&self, offset: &OffsetInfo) {
        self.ops.lock().push(TrackerOp::Receive(*offset));
    }

    fn event_commit(&self, offset: &OffsetInfo) {
        self.ops.lock().push(TrackerOp::Commit(*offset));
    }
}
