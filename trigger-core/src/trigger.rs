//! A [Trigger] delivers the events of a single subscription to its sink. Events are handed over
//! with [Trigger::event_arrived], filtered and sent by pools of workers, and reconciled with the
//! [OffsetTracker] so every accepted event is committed exactly once (at-least-once delivery).
//!
//! Lifecycle: a trigger is [TriggerState::Created] by [Trigger::new], [Trigger::start] connects
//! the sink and spawns the workers ([TriggerState::Running]), and [Trigger::stop] cancels the
//! workers, waits for them and closes the queues ([TriggerState::Stopped]). While running, the
//! idle watcher moves it between [TriggerState::Running] and [TriggerState::Sleep].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::Result;
use crate::config::TriggerConfig;
use crate::error::Error;
use crate::event::EventRecord;
use crate::filter::{Filter, build_filter};
use crate::metrics::{subscription_labels, trigger_metrics};
use crate::offset::OffsetTracker;
use crate::sinker::{DefaultConnector, SinkConnector};
use crate::subscription::Subscription;

use idle::Activity;
use pipeline::{Pipeline, RetryPolicy, SharedReceiver};
pub use state::TriggerState;

/// Running <-> Sleep detection.
mod idle;
/// Filter and send workers.
mod pipeline;
mod state;

/// Tasks spawned by [Trigger::start].
struct Workers {
    cln_token: CancellationToken,
    tasks: JoinSet<()>,
}

/// Per-subscription event delivery engine, see the [module docs](self).
pub struct Trigger<C = DefaultConnector> {
    id: String,
    subscription_id: String,
    target: String,
    config: TriggerConfig,
    labels: Vec<(String, String)>,

    state: Arc<RwLock<TriggerState>>,
    activity: Arc<Activity>,

    filter: Arc<dyn Filter>,
    offset_tracker: Arc<dyn OffsetTracker>,
    connector: C,

    event_tx: mpsc::Sender<EventRecord>,
    event_rx: SharedReceiver,
    send_tx: mpsc::Sender<EventRecord>,
    send_rx: SharedReceiver,

    // held across start and stop so lifecycle calls never interleave
    workers: Mutex<Option<Workers>>,
}

impl<C> Trigger<C>
where
    C: SinkConnector,
{
    /// Creates a trigger for the subscription, unset config fields get their defaults.
    pub fn new(
        config: TriggerConfig,
        subscription: &Subscription,
        offset_tracker: Arc<dyn OffsetTracker>,
        connector: C,
    ) -> Self {
        let config = config.with_defaults();
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer_size);
        let (send_tx, send_rx) = mpsc::channel(config.send_buffer_size);

        Self {
            id: Uuid::new_v4().to_string(),
            subscription_id: subscription.id.clone(),
            target: subscription.sink.clone(),
            labels: subscription_labels(&subscription.id),
            state: Arc::new(RwLock::new(TriggerState::Created)),
            activity: Arc::new(Activity::new()),
            filter: build_filter(&subscription.filters),
            offset_tracker,
            connector,
            event_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
            send_tx,
            send_rx: Arc::new(Mutex::new(send_rx)),
            workers: Mutex::new(None),
            config,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Address of the sink the events are delivered to.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn sleep_duration(&self) -> Duration {
        self.config.sleep_duration
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Current lifecycle state, never waits on the pipeline.
    pub fn state(&self) -> TriggerState {
        *self.state.read()
    }

    fn transition(&self, next: TriggerState) -> Result<()> {
        let mut state = self.state.write();
        if !state.can_transition_to(next) {
            return Err(Error::InvalidState(format!(
                "cannot move trigger {} from {} to {next}",
                self.id, *state
            )));
        }
        *state = next;
        Ok(())
    }

    /// Connects the sink and starts the filter workers, the send workers and the idle watcher.
    /// If the sink cannot be connected the trigger stays [TriggerState::Created].
    pub async fn start(&self) -> Result<()> {
        let mut workers = self.workers.lock().await;

        let state = self.state();
        if state != TriggerState::Created {
            return Err(Error::InvalidState(format!(
                "trigger {} can only be started once, it is {state}",
                self.id
            )));
        }

        let sink = self.connector.connect(&self.target).map_err(|e| match e {
            Error::SinkUnavailable(_) => e,
            other => Error::SinkUnavailable(other.to_string()),
        })?;

        let pipeline = Arc::new(Pipeline::new(
            self.subscription_id.clone(),
            Arc::clone(&self.filter),
            Arc::clone(&self.offset_tracker),
            sink,
            Arc::clone(&self.activity),
            RetryPolicy::from(&self.config),
        ));

        self.activity.touch();
        self.transition(TriggerState::Running)?;

        let cln_token = CancellationToken::new();
        let mut tasks = JoinSet::new();
        for _ in 0..self.config.filter_process_size {
            tasks.spawn(Arc::clone(&pipeline).run_event_process(
                Arc::clone(&self.event_rx),
                self.send_tx.clone(),
                cln_token.clone(),
            ));
        }
        for _ in 0..self.config.send_process_size {
            tasks.spawn(
                Arc::clone(&pipeline).run_event_send(Arc::clone(&self.send_rx), cln_token.clone()),
            );
        }
        tasks.spawn(idle::run_sleep_watch(
            self.subscription_id.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.activity),
            self.config.sleep_duration,
            cln_token.clone(),
        ));
        *workers = Some(Workers { cln_token, tasks });

        info!(
            trigger_id = %self.id,
            subscription_id = %self.subscription_id,
            target = %self.target,
            filter_workers = self.config.filter_process_size,
            send_workers = self.config.send_process_size,
            "Trigger started"
        );
        Ok(())
    }

    /// Cancels all the workers, waits for them to exit and closes both queues. Events still
    /// buffered are dropped without commit. Calling stop on a stopped trigger is a no-op.
    ///
    /// [Trigger::event_arrived] must not race with stop, once stopped it fails with [Error::Closed].
    pub async fn stop(&self) {
        let mut workers = self.workers.lock().await;
        let state = self.state();
        if state == TriggerState::Stopped {
            return;
        }
        info!(
            subscription_id = %self.subscription_id,
            %state,
            active = state.is_active(),
            "Trigger stop..."
        );

        if let Some(Workers {
            cln_token,
            mut tasks,
        }) = workers.take()
        {
            cln_token.cancel();
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    error!(subscription_id = %self.subscription_id, ?e, "Trigger worker failed");
                }
            }
        }

        let discarded = close_and_drain(&self.event_rx).await + close_and_drain(&self.send_rx).await;
        if discarded > 0 {
            warn!(
                subscription_id = %self.subscription_id,
                discarded,
                "Discarded buffered events without commit"
            );
            trigger_metrics()
                .events_discarded
                .get_or_create(&self.labels)
                .inc_by(discarded as u64);
        }

        if let Err(e) = self.transition(TriggerState::Stopped) {
            // only reachable from a state which has no way out but Destroyed
            warn!(subscription_id = %self.subscription_id, ?e, "Trigger not marked as stopped");
            return;
        }
        info!(subscription_id = %self.subscription_id, "Trigger stopped");
    }

    /// Hands an event over to the trigger. Waits while the event queue is full, giving up with
    /// [Error::Cancelled] when `cln_token` is cancelled first. The event is registered as received
    /// with the offset tracker before any worker can see it.
    pub async fn event_arrived(
        &self,
        cln_token: &CancellationToken,
        event: EventRecord,
    ) -> Result<()> {
        let permit = tokio::select! {
            biased;
            _ = cln_token.cancelled() => return Err(Error::Cancelled),
            permit = self.event_tx.reserve() => permit.map_err(|_| Error::Closed)?,
        };

        self.offset_tracker.event_receive(&event.offset_info);
        permit.send(event);

        self.activity.touch();
        trigger_metrics()
            .events_received
            .get_or_create(&self.labels)
            .inc();
        Ok(())
    }
}

/// Closes the queue and drops whatever is still in it, returns how many events were dropped.
async fn close_and_drain(events: &SharedReceiver) -> usize {
    let mut events = events.lock().await;
    events.close();
    let mut discarded = 0;
    while events.try_recv().is_ok() {
        discarded += 1;
    }
    discarded
}
