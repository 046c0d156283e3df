//! Filters decide whether an event of a subscription is delivered to its sink. Filtering is a
//! pure function of the event; a [FilterResult::Fail] event is committed without delivery.
//!
//! Subscriptions describe their filters with [SubscriptionFilter], a small attribute matching
//! language:
//! - `exact`: every listed attribute equals the given value.
//! - `prefix` / `suffix`: every listed attribute starts / ends with the given value.
//! - `all` / `any` / `not`: composition of other filters.
//!
//! An attribute the event does not carry never matches.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    Pass,
    Fail,
}

impl From<bool> for FilterResult {
    fn from(pass: bool) -> Self {
        if pass {
            FilterResult::Pass
        } else {
            FilterResult::Fail
        }
    }
}

/// Predicate evaluated by the filter workers, shared between all of them.
pub trait Filter: Send + Sync {
    fn evaluate(&self, event: &Event) -> FilterResult;
}

/// Filter rule as carried by a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionFilter {
    Exact(BTreeMap<String, String>),
    Prefix(BTreeMap<String, String>),
    Suffix(BTreeMap<String, String>),
    All(Vec<SubscriptionFilter>),
    Any(Vec<SubscriptionFilter>),
    Not(Box<SubscriptionFilter>),
}

impl SubscriptionFilter {
    fn matches(&self, event: &Event) -> bool {
        match self {
            SubscriptionFilter::Exact(attrs) => match_attributes(event, attrs, |v, e| v == e),
            SubscriptionFilter::Prefix(attrs) => {
                match_attributes(event, attrs, |v, p| v.starts_with(p))
            }
            SubscriptionFilter::Suffix(attrs) => {
                match_attributes(event, attrs, |v, s| v.ends_with(s))
            }
            SubscriptionFilter::All(filters) => filters.iter().all(|f| f.matches(event)),
            SubscriptionFilter::Any(filters) => filters.iter().any(|f| f.matches(event)),
            SubscriptionFilter::Not(filter) => !filter.matches(event),
        }
    }
}

fn match_attributes(
    event: &Event,
    attrs: &BTreeMap<String, String>,
    op: impl Fn(&str, &str) -> bool,
) -> bool {
    attrs.iter().all(|(name, expected)| {
        event
            .attribute(name)
            .is_some_and(|value| op(&value, expected))
    })
}

impl Filter for SubscriptionFilter {
    fn evaluate(&self, event: &Event) -> FilterResult {
        self.matches(event).into()
    }
}

/// Lets every event through, used for subscriptions without filters.
pub struct PassAll;

impl Filter for PassAll {
    fn evaluate(&self, _event: &Event) -> FilterResult {
        FilterResult::Pass
    }
}

/// Builds the filter of a subscription. The top-level rules are combined with AND.
pub fn build_filter(filters: &[SubscriptionFilter]) -> Arc<dyn Filter> {
    match filters {
        [] => Arc::new(PassAll),
        [filter] => Arc::new(filter.clone()),
        filters => Arc::new(SubscriptionFilter::All(filters.to_vec())),
    }
}
