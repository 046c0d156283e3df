use std::sync::OnceLock;

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

use crate::Result;
use crate::error::Error;

// The top-level metric registry is created with the GLOBAL_PREFIX
const TRIGGER_REGISTRY_GLOBAL_PREFIX: &str = "trigger";

// Define the labels for the metrics
const SUBSCRIPTION_ID_LABEL: &str = "subscription_id";

// Define the metric names
const EVENTS_RECEIVED: &str = "events_received";
const EVENTS_FILTERED: &str = "events_filtered";
const EVENTS_DELIVERED: &str = "events_delivered";
const EVENTS_DISCARDED: &str = "events_discarded";
const SEND_ATTEMPTS: &str = "send_attempts";
const SEND_FAILURES: &str = "send_failures";
const SEND_TIME: &str = "send_time";

/// The global register of all metrics.
struct GlobalRegistry {
    // It is okay to use a blocking mutex because we register each metric only one time.
    registry: parking_lot::Mutex<Registry>,
}

impl GlobalRegistry {
    fn new() -> Self {
        GlobalRegistry {
            registry: parking_lot::Mutex::new(Registry::with_prefix(
                TRIGGER_REGISTRY_GLOBAL_PREFIX,
            )),
        }
    }
}

/// GLOBAL_REGISTRY is the static global registry which is initialized only once.
static GLOBAL_REGISTRY: OnceLock<GlobalRegistry> = OnceLock::new();

/// global_registry is a helper function to get the GLOBAL_REGISTRY
fn global_registry() -> &'static GlobalRegistry {
    GLOBAL_REGISTRY.get_or_init(GlobalRegistry::new)
}

/// TriggerMetrics stores the metrics of every trigger in the process, each metric is a family
/// differentiated by the subscription the trigger delivers for.
pub(crate) struct TriggerMetrics {
    pub(crate) events_received: Family<Vec<(String, String)>, Counter>,
    pub(crate) events_filtered: Family<Vec<(String, String)>, Counter>,
    pub(crate) events_delivered: Family<Vec<(String, String)>, Counter>,
    /// buffered events dropped without commit when the trigger stops.
    pub(crate) events_discarded: Family<Vec<(String, String)>, Counter>,
    pub(crate) send_attempts: Family<Vec<(String, String)>, Counter>,
    /// events dropped after exhausting all the send attempts.
    pub(crate) send_failures: Family<Vec<(String, String)>, Counter>,
    /// latency of a single send attempt in microseconds.
    pub(crate) send_time: Family<Vec<(String, String)>, Histogram>,
}

impl TriggerMetrics {
    fn new() -> Self {
        let metrics = Self {
            events_received: Family::<Vec<(String, String)>, Counter>::default(),
            events_filtered: Family::<Vec<(String, String)>, Counter>::default(),
            events_delivered: Family::<Vec<(String, String)>, Counter>::default(),
            events_discarded: Family::<Vec<(String, String)>, Counter>::default(),
            send_attempts: Family::<Vec<(String, String)>, Counter>::default(),
            send_failures: Family::<Vec<(String, String)>, Counter>::default(),
            send_time: Family::<Vec<(String, String)>, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(100.0, 2.0, 18))
            }),
        };

        let mut registry = global_registry().registry.lock();
        registry.register(
            EVENTS_RECEIVED,
            "Total number of events accepted by the trigger",
            metrics.events_received.clone(),
        );
        registry.register(
            EVENTS_FILTERED,
            "Total number of events committed without delivery because the filter rejected them",
            metrics.events_filtered.clone(),
        );
        registry.register(
            EVENTS_DELIVERED,
            "Total number of events acknowledged by the sink",
            metrics.events_delivered.clone(),
        );
        registry.register(
            EVENTS_DISCARDED,
            "Total number of buffered events discarded without commit on shutdown",
            metrics.events_discarded.clone(),
        );
        registry.register(
            SEND_ATTEMPTS,
            "Total number of send attempts to the sink",
            metrics.send_attempts.clone(),
        );
        registry.register(
            SEND_FAILURES,
            "Total number of events dropped after exhausting all send attempts",
            metrics.send_failures.clone(),
        );
        registry.register(
            SEND_TIME,
            "Time taken by a single send attempt in microseconds",
            metrics.send_time.clone(),
        );
        metrics
    }
}

/// TRIGGER_METRICS is the TriggerMetrics object which stores the metrics
static TRIGGER_METRICS: OnceLock<TriggerMetrics> = OnceLock::new();

pub(crate) fn trigger_metrics() -> &'static TriggerMetrics {
    TRIGGER_METRICS.get_or_init(TriggerMetrics::new)
}

/// Labels shared by all the metrics of the trigger of a subscription.
pub(crate) fn subscription_labels(subscription_id: &str) -> Vec<(String, String)> {
    vec![(
        SUBSCRIPTION_ID_LABEL.to_string(),
        subscription_id.to_string(),
    )]
}

/// Renders all the registered metrics in the text exposition format.
pub fn metrics_text() -> Result<String> {
    // make sure the trigger metrics are registered even before the first trigger runs
    trigger_metrics();

    let registry = global_registry().registry.lock();
    let mut buffer = String::new();
    encode(&mut buffer, &registry)
        .map_err(|e| Error::Config(format!("failed to encode metrics: {e:?}")))?;
    Ok(buffer)
}
