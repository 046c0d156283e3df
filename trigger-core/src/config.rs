use std::time::Duration;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde::Deserialize;

use crate::Result;
use crate::error::Error;
use crate::subscription::Subscription;

const DEFAULT_BUFFER_SIZE: usize = 1 << 10;
const DEFAULT_FILTER_PROCESS_SIZE: usize = 2;
const DEFAULT_SEND_PROCESS_SIZE: usize = 2;
const DEFAULT_MAX_RETRY_TIMES: usize = 3;
const DEFAULT_RETRY_PERIOD_MS: u64 = 3_000;
const DEFAULT_SEND_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SLEEP_DURATION_MS: u64 = 30_000;

/// Tuning knobs of a [Trigger](crate::trigger::Trigger). A zero value means "unset" and is
/// replaced by the default when the trigger is created, after which the config is immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerConfig {
    /// capacity of the queue between `event_arrived` and the filter workers.
    pub event_buffer_size: usize,
    /// capacity of the queue between the filter workers and the send workers.
    pub send_buffer_size: usize,
    pub filter_process_size: usize,
    pub send_process_size: usize,
    /// total number of send attempts per event, including the first one.
    pub max_retry_times: usize,
    /// pause between two failed send attempts.
    pub retry_period: Duration,
    /// upper bound of a single send attempt.
    pub send_timeout: Duration,
    /// inactivity after which a running trigger is considered asleep.
    pub sleep_duration: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: DEFAULT_BUFFER_SIZE,
            send_buffer_size: DEFAULT_BUFFER_SIZE,
            filter_process_size: DEFAULT_FILTER_PROCESS_SIZE,
            send_process_size: DEFAULT_SEND_PROCESS_SIZE,
            max_retry_times: DEFAULT_MAX_RETRY_TIMES,
            retry_period: Duration::from_millis(DEFAULT_RETRY_PERIOD_MS),
            send_timeout: Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS),
            sleep_duration: Duration::from_millis(DEFAULT_SLEEP_DURATION_MS),
        }
    }
}

impl TriggerConfig {
    /// Replaces every unset (zero) field with its default.
    pub fn with_defaults(self) -> Self {
        let defaults = Self::default();
        Self {
            event_buffer_size: non_zero(self.event_buffer_size, defaults.event_buffer_size),
            send_buffer_size: non_zero(self.send_buffer_size, defaults.send_buffer_size),
            filter_process_size: non_zero(self.filter_process_size, defaults.filter_process_size),
            send_process_size: non_zero(self.send_process_size, defaults.send_process_size),
            max_retry_times: non_zero(self.max_retry_times, defaults.max_retry_times),
            retry_period: non_zero_duration(self.retry_period, defaults.retry_period),
            send_timeout: non_zero_duration(self.send_timeout, defaults.send_timeout),
            sleep_duration: non_zero_duration(self.sleep_duration, defaults.sleep_duration),
        }
    }
}

fn non_zero(value: usize, default: usize) -> usize {
    if value == 0 { default } else { value }
}

fn non_zero_duration(value: Duration, default: Duration) -> Duration {
    if value.is_zero() { default } else { value }
}

/// Wire form of [TriggerConfig]; every field is optional and durations are in milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTriggerConfig {
    event_buffer_size: Option<usize>,
    send_buffer_size: Option<usize>,
    filter_process_size: Option<usize>,
    send_process_size: Option<usize>,
    max_retry_times: Option<usize>,
    retry_period_ms: Option<u64>,
    send_timeout_ms: Option<u64>,
    sleep_duration_ms: Option<u64>,
}

impl From<RawTriggerConfig> for TriggerConfig {
    fn from(raw: RawTriggerConfig) -> Self {
        let millis = |ms: Option<u64>| ms.map(Duration::from_millis).unwrap_or_default();
        TriggerConfig {
            event_buffer_size: raw.event_buffer_size.unwrap_or_default(),
            send_buffer_size: raw.send_buffer_size.unwrap_or_default(),
            filter_process_size: raw.filter_process_size.unwrap_or_default(),
            send_process_size: raw.send_process_size.unwrap_or_default(),
            max_retry_times: raw.max_retry_times.unwrap_or_default(),
            retry_period: millis(raw.retry_period_ms),
            send_timeout: millis(raw.send_timeout_ms),
            sleep_duration: millis(raw.sleep_duration_ms),
        }
        .with_defaults()
    }
}

impl<'de> Deserialize<'de> for TriggerConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        RawTriggerConfig::deserialize(deserializer).map(Into::into)
    }
}

/// Everything needed to run a trigger for a single subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerSettings {
    pub subscription: Subscription,
    #[serde(default)]
    pub config: TriggerConfig,
}

impl TriggerSettings {
    /// Loads the settings from a base64 encoded JSON document.
    pub fn load(obj: impl AsRef<[u8]>) -> Result<Self> {
        let decoded = BASE64_STANDARD
            .decode(obj)
            .map_err(|e| Error::Config(format!("Failed to decode trigger settings: {e:?}")))?;

        serde_json::from_slice(&decoded)
            .map_err(|e| Error::Config(format!("Failed to parse trigger settings: {e:?}")))
    }
}
