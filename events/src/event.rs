use crate::error::{Error, EventLogErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Offset of an event in the log. Opaque to clients: it is only ever echoed
/// back as a replay cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl EventId {
    pub fn next(self) -> Self {
        EventId(self.0 + 1)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the ordered event log. Immutable once read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub topic: String,
    /// Payload object; its `type` field names the kind of object the event is about.
    pub data: Value,
    /// Confidentiality marking identifiers attached to the event.
    pub markings: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// The `type` field of the payload, when present and a string.
    pub fn data_type(&self) -> Option<&str> {
        self.data.get("type").and_then(Value::as_str)
    }
}

impl From<entity::stream_events::Model> for Event {
    fn from(model: entity::stream_events::Model) -> Self {
        let markings = model.marking_ids();
        Event {
            id: EventId(model.id),
            topic: model.topic,
            data: model.data,
            markings,
            timestamp: model.created_at.with_timezone(&Utc),
        }
    }
}

/// Starting point of a range read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    /// The oldest event still held by the log. Written `-`.
    #[default]
    Earliest,
    /// The event with this offset, or the first one after it.
    From(EventId),
}

impl FromStr for Cursor {
    type Err = Error;

    fn from_str(cursor: &str) -> Result<Self, Self::Err> {
        match cursor.trim() {
            "-" | "" => Ok(Cursor::Earliest),
            offset => offset
                .parse::<i64>()
                .map(|id| Cursor::From(EventId(id)))
                .map_err(|e| Error {
                    source: Some(Box::new(e)),
                    error_kind: EventLogErrorKind::InvalidCursor(offset.to_string()),
                }),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cursor::Earliest => write!(f, "-"),
            Cursor::From(id) => write!(f, "{id}"),
        }
    }
}

/// Log metadata handed to each client when its stream opens.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub first_event_id: Option<EventId>,
    pub last_event_id: Option<EventId>,
    pub stream_size: u64,
}
