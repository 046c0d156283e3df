use serde::{Deserialize, Serialize};

use crate::filter::SubscriptionFilter;

/// The subscription a trigger delivers for: its identity, where events go, and which of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    /// address of the sink, e.g. `http://svc:8080/events` or `log:`.
    pub sink: String,
    #[serde(default)]
    pub filters: Vec<SubscriptionFilter>,
}

impl Subscription {
    pub fn new(id: impl Into<String>, sink: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sink: sink.into(),
            filters: Vec::new(),
        }
    }

    pub fn with_filters(mut self, filters: Vec<SubscriptionFilter>) -> Self {
        self.filters = filters;
        self
    }
}
