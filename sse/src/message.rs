use chrono::{DateTime, SecondsFormat, Utc};
use events::StreamInfo;
use serde::Serialize;

/// Event name of the first frame on every stream.
pub const CONNECTED_EVENT: &str = "connected";
/// Event name of the liveness frames.
pub const HEARTBEAT_EVENT: &str = "heartbeat";

/// One server-sent event queued for a stream, before the web layer writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: Option<String>,
    pub event: Option<String>,
    /// Serialized JSON payload. Never contains a raw line break.
    pub data: String,
}

/// Payload of the `connected` frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectedInfo {
    #[serde(flatten)]
    pub stream: StreamInfo,
    pub clients: usize,
}

impl Frame {
    pub fn new(
        id: Option<String>,
        event: Option<String>,
        payload: &impl Serialize,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id,
            event,
            data: serde_json::to_string(payload)?,
        })
    }

    pub fn connected(info: &ConnectedInfo) -> Result<Self, serde_json::Error> {
        Self::new(None, Some(CONNECTED_EVENT.to_string()), info)
    }

    pub fn heartbeat(now: DateTime<Utc>) -> Result<Self, serde_json::Error> {
        Self::new(
            None,
            Some(HEARTBEAT_EVENT.to_string()),
            &now.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use events::EventId;

    #[test]
    fn json_payloads_stay_on_one_data_line() {
        let frame = Frame::new(None, None, &"line one\nline two").unwrap();
        assert!(!frame.data.contains('\n'));
    }

    #[test]
    fn heartbeat_carries_the_timestamp_as_a_json_string() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        let frame = Frame::heartbeat(now).unwrap();

        assert_eq!(frame.event.as_deref(), Some(HEARTBEAT_EVENT));
        assert_eq!(frame.data, "\"2026-03-01T12:30:00.000Z\"");
    }

    #[test]
    fn connected_reports_stream_info_and_client_count() {
        let info = ConnectedInfo {
            stream: StreamInfo {
                first_event_id: Some(EventId(1)),
                last_event_id: Some(EventId(42)),
                stream_size: 42,
            },
            clients: 3,
        };
        let frame = Frame::connected(&info).unwrap();
        let body: serde_json::Value = serde_json::from_str(&frame.data).unwrap();

        assert_eq!(frame.event.as_deref(), Some(CONNECTED_EVENT));
        assert_eq!(body["lastEventId"], serde_json::json!(42));
        assert_eq!(body["streamSize"], serde_json::json!(42));
        assert_eq!(body["clients"], serde_json::json!(3));
    }
}
