//! Offset tracking lets a subscription resume from the right position. Every event is
//! registered as received when it enters the trigger and committed once it has been delivered or
//! deliberately dropped. Events complete out of order, so the commit cursor of an event log only
//! moves past offsets whose events are all committed.
//!
//! Persisting the cursor is left to whoever owns the [OffsetTracker].

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;
use tracing::warn;

use crate::event::OffsetInfo;

/// Records the received and committed positions of a subscription. Shared by all the workers of
/// a trigger, hence implementations synchronize internally.
pub trait OffsetTracker: Send + Sync {
    /// The event at `offset` was accepted by the trigger.
    fn event_receive(&self, offset: &OffsetInfo);
    /// The event at `offset` needs no further processing.
    fn event_commit(&self, offset: &OffsetInfo);
}

#[derive(Debug, Default)]
struct EventLogOffset {
    /// received but not yet committed.
    outstanding: BTreeSet<u64>,
    max_received: Option<u64>,
}

impl EventLogOffset {
    /// The first offset which is not committed yet.
    fn commit_cursor(&self) -> Option<u64> {
        self.outstanding
            .first()
            .copied()
            .or_else(|| self.max_received.map(|max| max.saturating_add(1)))
    }
}

/// In-memory [OffsetTracker] of a single subscription.
#[derive(Debug)]
pub struct SubscriptionOffset {
    subscription_id: String,
    event_logs: Mutex<BTreeMap<u64, EventLogOffset>>,
}

impl SubscriptionOffset {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            event_logs: Mutex::new(BTreeMap::new()),
        }
    }

    /// The commit cursor of every event log seen so far, ordered by event log.
    pub fn commit_offsets(&self) -> Vec<OffsetInfo> {
        self.event_logs
            .lock()
            .iter()
            .filter_map(|(eventlog_id, log)| {
                log.commit_cursor()
                    .map(|offset| OffsetInfo::new(*eventlog_id, offset))
            })
            .collect()
    }

    /// Number of events received but not committed.
    pub fn outstanding(&self) -> usize {
        self.event_logs
            .lock()
            .values()
            .map(|log| log.outstanding.len())
            .sum()
    }
}

impl OffsetTracker for SubscriptionOffset {
    fn event_receive(&self, offset: &OffsetInfo) {
        let mut event_logs = self.event_logs.lock();
        let log = event_logs.entry(offset.eventlog_id).or_default();
        log.outstanding.insert(offset.offset);
        log.max_received = log.max_received.max(Some(offset.offset));
    }

    fn event_commit(&self, offset: &OffsetInfo) {
        let removed = self
            .event_logs
            .lock()
            .get_mut(&offset.eventlog_id)
            .is_some_and(|log| log.outstanding.remove(&offset.offset));

        if !removed {
            warn!(
                subscription_id = %self.subscription_id,
                %offset,
                "Commit for an offset which was never received, ignoring"
            );
        }
    }
}
