use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_SPEC_VERSION: &str = "1.0";

/// A CloudEvents shaped event. It serializes to the JSON structured format, extension attributes
/// are flattened next to the context attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub source: String,
    #[serde(rename = "specversion", default = "default_spec_version")]
    pub spec_version: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(
        rename = "datacontenttype",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub data_content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, ExtensionValue>,
}

/// Value of an extension attribute. CloudEvents extensions are strings, integers or booleans in
/// the JSON format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionValue {
    Boolean(bool),
    Integer(i64),
    String(String),
}

impl ExtensionValue {
    /// Canonical string form, as used when matching attributes.
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            ExtensionValue::Boolean(b) => Cow::Owned(b.to_string()),
            ExtensionValue::Integer(i) => Cow::Owned(i.to_string()),
            ExtensionValue::String(s) => Cow::Borrowed(s),
        }
    }
}

impl fmt::Display for ExtensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl From<&str> for ExtensionValue {
    fn from(value: &str) -> Self {
        ExtensionValue::String(value.to_string())
    }
}

impl From<String> for ExtensionValue {
    fn from(value: String) -> Self {
        ExtensionValue::String(value)
    }
}

impl From<i64> for ExtensionValue {
    fn from(value: i64) -> Self {
        ExtensionValue::Integer(value)
    }
}

impl From<bool> for ExtensionValue {
    fn from(value: bool) -> Self {
        ExtensionValue::Boolean(value)
    }
}

fn default_spec_version() -> String {
    DEFAULT_SPEC_VERSION.to_string()
}

impl Event {
    pub fn new(id: impl Into<String>, source: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            spec_version: default_spec_version(),
            ty: ty.into(),
            subject: None,
            time: None,
            data_content_type: None,
            data: None,
            extensions: BTreeMap::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data_content_type = Some("application/json".to_string());
        self.data = Some(data);
        self
    }

    pub fn with_extension(
        mut self,
        key: impl Into<String>,
        value: impl Into<ExtensionValue>,
    ) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Looks up a context attribute or an extension by its CloudEvents name. Integer and boolean
    /// extensions come back in their canonical string form.
    pub fn attribute(&self, name: &str) -> Option<Cow<'_, str>> {
        let value = match name {
            "id" => &self.id,
            "source" => &self.source,
            "specversion" => &self.spec_version,
            "type" => &self.ty,
            "subject" => self.subject.as_ref()?,
            "datacontenttype" => self.data_content_type.as_ref()?,
            _ => return self.extensions.get(name).map(ExtensionValue::as_str),
        };
        Some(Cow::Borrowed(value))
    }
}

/// Position of an event within an event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OffsetInfo {
    pub eventlog_id: u64,
    pub offset: u64,
}

impl OffsetInfo {
    pub fn new(eventlog_id: u64, offset: u64) -> Self {
        Self {
            eventlog_id,
            offset,
        }
    }
}

impl fmt::Display for OffsetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.eventlog_id, self.offset)
    }
}

/// An event ready for delivery together with the position it was read from. The event is shared
/// and never mutated once the record is created.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub event: Arc<Event>,
    pub offset_info: OffsetInfo,
}

impl EventRecord {
    pub fn new(event: Event, offset_info: OffsetInfo) -> Self {
        Self {
            event: Arc::new(event),
            offset_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_attribute_lookup() {
        let event = Event::new("1", "/orders", "order.created")
            .with_subject("o-42")
            .with_extension("region", "eu");

        assert_eq!(event.attribute("id").as_deref(), Some("1"));
        assert_eq!(event.attribute("source").as_deref(), Some("/orders"));
        assert_eq!(event.attribute("type").as_deref(), Some("order.created"));
        assert_eq!(event.attribute("specversion").as_deref(), Some("1.0"));
        assert_eq!(event.attribute("subject").as_deref(), Some("o-42"));
        assert_eq!(event.attribute("region").as_deref(), Some("eu"));
        assert_eq!(event.attribute("datacontenttype"), None);
        assert_eq!(event.attribute("missing"), None);
    }

    #[test]
    fn test_structured_json() {
        let event = Event::new("1", "/orders", "order.created")
            .with_extension("region", "eu")
            .with_data(json!({"amount": 10}));

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "1",
                "source": "/orders",
                "specversion": "1.0",
                "type": "order.created",
                "datacontenttype": "application/json",
                "data": {"amount": 10},
                "region": "eu"
            })
        );
    }

    #[test]
    fn test_parse_without_specversion() {
        let event: Event = serde_json::from_value(json!({
            "id": "7",
            "source": "/s",
            "type": "t",
            "traceparent": "00-abc"
        }))
        .unwrap();

        assert_eq!(event.spec_version, "1.0");
        assert_eq!(event.attribute("traceparent").as_deref(), Some("00-abc"));
    }

    #[test]
    fn test_integer_and_boolean_extensions() {
        let event: Event = serde_json::from_str(
            r#"{"id":"1","source":"/s","type":"t","specversion":"1.0","sequence":5,"replayed":true}"#,
        )
        .unwrap();

        assert_eq!(event.extensions["sequence"], ExtensionValue::Integer(5));
        assert_eq!(event.extensions["replayed"], ExtensionValue::Boolean(true));
        assert_eq!(event.attribute("sequence").as_deref(), Some("5"));
        assert_eq!(event.attribute("replayed").as_deref(), Some("true"));

        // written back with their original JSON types
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["sequence"], json!(5));
        assert_eq!(value["replayed"], json!(true));
    }

    #[test]
    fn test_offset_info_display() {
        assert_eq!(OffsetInfo::new(3, 42).to_string(), "3-42");
    }
}
