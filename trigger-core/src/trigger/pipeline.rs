//! The delivery pipeline of a trigger is two pools of workers chained by bounded queues:
//!
//! ```text
//! event_arrived -> [event queue] -> filter workers -> [send queue] -> send workers -> Sink
//!                                        |                                 |
//!                                        +-------> OffsetTracker <---------+
//!                                                  (commit)
//! ```
//!
//! Every accepted event is committed exactly once: by the filter worker if the filter rejects it,
//! or by the send worker once the sink acknowledged it or all the attempts were rejected. Events
//! that are in flight when the trigger is cancelled are not committed and will be redelivered.

use std::sync::Arc;
use std::time::Duration;

use backoff::strategy::fixed;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::TriggerConfig;
use crate::error::Error;
use crate::event::EventRecord;
use crate::filter::{Filter, FilterResult};
use crate::metrics::{subscription_labels, trigger_metrics};
use crate::offset::OffsetTracker;
use crate::sinker::Sink;
use crate::trigger::idle::Activity;

/// A queue receiver shared by all the workers of a pool, each event is taken by one worker.
pub(super) type SharedReceiver = Arc<Mutex<mpsc::Receiver<EventRecord>>>;

/// How a send worker finished with an event.
#[derive(Debug, PartialEq)]
enum SendOutcome {
    Delivered { attempts: usize },
    Exhausted { attempts: usize, error: Error },
    Cancelled { attempts: usize },
}

/// Bounds of the send loop.
#[derive(Debug, Clone, Copy)]
pub(super) struct RetryPolicy {
    max_retry_times: usize,
    retry_period: Duration,
    send_timeout: Duration,
}

impl From<&TriggerConfig> for RetryPolicy {
    fn from(config: &TriggerConfig) -> Self {
        Self {
            max_retry_times: config.max_retry_times,
            retry_period: config.retry_period,
            send_timeout: config.send_timeout,
        }
    }
}

/// Everything the workers share, one per started trigger.
pub(super) struct Pipeline<S> {
    subscription_id: String,
    labels: Vec<(String, String)>,
    filter: Arc<dyn Filter>,
    offset_tracker: Arc<dyn OffsetTracker>,
    sink: S,
    activity: Arc<Activity>,
    retry_policy: RetryPolicy,
}

impl<S> Pipeline<S>
where
    S: Sink + Sync + 'static,
{
    pub(super) fn new(
        subscription_id: String,
        filter: Arc<dyn Filter>,
        offset_tracker: Arc<dyn OffsetTracker>,
        sink: S,
        activity: Arc<Activity>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            labels: subscription_labels(&subscription_id),
            subscription_id,
            filter,
            offset_tracker,
            sink,
            activity,
            retry_policy,
        }
    }

    /// Filter worker, runs till cancellation or till the event queue is closed.
    pub(super) async fn run_event_process(
        self: Arc<Self>,
        events: SharedReceiver,
        send_tx: mpsc::Sender<EventRecord>,
        cln_token: CancellationToken,
    ) {
        while let Some(event) = next_event(&events, &cln_token).await {
            if self.filter.evaluate(&event.event) == FilterResult::Fail {
                debug!(subscription_id = %self.subscription_id, offset = %event.offset_info, "Event filtered out");
                self.offset_tracker.event_commit(&event.offset_info);
                trigger_metrics()
                    .events_filtered
                    .get_or_create(&self.labels)
                    .inc();
                continue;
            }

            // a full send queue holds this worker back, which in turn fills the event queue
            let permit = tokio::select! {
                biased;
                _ = cln_token.cancelled() => None,
                permit = send_tx.reserve() => permit.ok(),
            };
            match permit {
                Some(permit) => permit.send(event),
                None => {
                    self.discard(&event);
                    return;
                }
            }
        }
    }

    /// Send worker, runs till cancellation or till the send queue is closed.
    pub(super) async fn run_event_send(
        self: Arc<Self>,
        events: SharedReceiver,
        cln_token: CancellationToken,
    ) {
        while let Some(event) = next_event(&events, &cln_token).await {
            match self.retry_send_event(&event, &cln_token).await {
                SendOutcome::Delivered { attempts } => {
                    debug!(subscription_id = %self.subscription_id, offset = %event.offset_info, attempts, "Event delivered");
                    trigger_metrics()
                        .events_delivered
                        .get_or_create(&self.labels)
                        .inc();
                    self.activity.touch();
                }
                SendOutcome::Exhausted { attempts, error } => {
                    error!(
                        subscription_id = %self.subscription_id,
                        event_id = %event.event.id,
                        offset = %event.offset_info,
                        attempts,
                        ?error,
                        "Send event to sink failed, dropping the event"
                    );
                    trigger_metrics()
                        .send_failures
                        .get_or_create(&self.labels)
                        .inc();
                }
                SendOutcome::Cancelled { attempts } => {
                    debug!(subscription_id = %self.subscription_id, offset = %event.offset_info, attempts, "Send cancelled");
                    self.discard(&event);
                    return;
                }
            }
            // delivered or given up, either way the event is done with
            self.offset_tracker.event_commit(&event.offset_info);
        }
    }

    /// Sends the event up to `max_retry_times` times. Every attempt is bounded by the send timeout
    /// and aborted on cancellation, the pause between two attempts is not.
    async fn retry_send_event(
        &self,
        event: &EventRecord,
        cln_token: &CancellationToken,
    ) -> SendOutcome {
        let mut pauses = fixed::Interval::new(self.retry_policy.retry_period)
            .attempts(self.retry_policy.max_retry_times);
        let mut attempts = 0;

        loop {
            if cln_token.is_cancelled() {
                return SendOutcome::Cancelled { attempts };
            }
            attempts += 1;
            trigger_metrics()
                .send_attempts
                .get_or_create(&self.labels)
                .inc();

            let start = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cln_token.cancelled() => return SendOutcome::Cancelled { attempts },
                result = time::timeout(self.retry_policy.send_timeout, self.sink.send(&event.event)) => {
                    result.unwrap_or(Err(Error::Timeout))
                }
            };
            trigger_metrics()
                .send_time
                .get_or_create(&self.labels)
                .observe(start.elapsed().as_micros() as f64);

            let error = match result {
                Ok(()) => return SendOutcome::Delivered { attempts },
                Err(error) => error,
            };

            match pauses.next() {
                Some(pause) => {
                    debug!(
                        subscription_id = %self.subscription_id,
                        event_id = %event.event.id,
                        retry_times = attempts,
                        ?error,
                        "Send event failed, retrying"
                    );
                    time::sleep(pause).await;
                }
                None => return SendOutcome::Exhausted { attempts, error },
            }
        }
    }

    /// The event stays received but uncommitted, so it will be delivered again.
    fn discard(&self, event: &EventRecord) {
        debug!(subscription_id = %self.subscription_id, offset = %event.offset_info, "Discarding in-flight event");
        trigger_metrics()
            .events_discarded
            .get_or_create(&self.labels)
            .inc();
    }
}

/// Takes the next event of the queue, `None` once cancelled or closed.
async fn next_event(events: &SharedReceiver, cln_token: &CancellationToken) -> Option<EventRecord> {
    tokio::select! {
        biased;
        _ = cln_token.cancelled() => None,
        event = async { events.lock().await.recv().await } => event,
    }
}
