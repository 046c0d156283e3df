//! Event delivery for a single subscription. A [Trigger] takes the events of the subscription,
//! filters them and pushes the survivors to the subscription's sink with bounded retries, while
//! an [OffsetTracker] learns which events are done so consumption can resume after a restart.

pub use self::error::{Error, Result};

/// Tuning of a trigger and the settings document it is loaded from.
pub mod config;
mod error;
/// CloudEvents and their position in the event log.
pub mod event;
pub mod filter;
pub mod metrics;
pub mod offset;
/// Reads events line by line and feeds them to a trigger.
pub mod runner;
pub mod sinker;
pub mod subscription;
pub mod trigger;

#[cfg(test)]
mod test_utils;

pub use crate::config::{TriggerConfig, TriggerSettings};
pub use crate::event::{Event, EventRecord, ExtensionValue, OffsetInfo};
pub use crate::offset::{OffsetTracker, SubscriptionOffset};
pub use crate::subscription::Subscription;
pub use crate::trigger::{Trigger, TriggerState};
