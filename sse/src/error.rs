//! Error types for the `sse` crate.

use events::EventLogErrorKind;
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: StreamErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum StreamErrorKind {
    /// The identity has no live stream to deliver to.
    NoActiveSession,
    /// A replay cursor that could not be parsed.
    InvalidCursor(String),
    /// The event log could not be read.
    LogRead,
    /// The live tail of the event log could not be opened.
    Subscribe,
    /// The hub has been shut down and accepts no new streams.
    ShuttingDown,
}

impl Error {
    pub fn new(error_kind: StreamErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let summary = match &self.error_kind {
            StreamErrorKind::NoActiveSession => "stream not connected".to_string(),
            StreamErrorKind::InvalidCursor(cursor) => format!("invalid stream cursor '{cursor}'"),
            StreamErrorKind::LogRead => "failed to read the event log".to_string(),
            StreamErrorKind::Subscribe => "failed to subscribe to the event log".to_string(),
            StreamErrorKind::ShuttingDown => "stream hub is shutting down".to_string(),
        };

        match &self.source {
            Some(source) => write!(f, "{summary}: {source}"),
            None => write!(f, "{summary}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<events::Error> for Error {
    fn from(err: events::Error) -> Self {
        let error_kind = match &err.error_kind {
            EventLogErrorKind::Subscribe => StreamErrorKind::Subscribe,
            EventLogErrorKind::InvalidCursor(cursor) => {
                StreamErrorKind::InvalidCursor(cursor.clone())
            }
            EventLogErrorKind::Read | EventLogErrorKind::Append => StreamErrorKind::LogRead,
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::Cursor;

    #[test]
    fn invalid_cursor_keeps_the_offending_value() {
        let err: Error = "abc".parse::<Cursor>().unwrap_err().into();
        assert_eq!(
            err.error_kind,
            StreamErrorKind::InvalidCursor("abc".to_string())
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn no_active_session_reads_as_not_connected() {
        assert_eq!(
            Error::new(StreamErrorKind::NoActiveSession).to_string(),
            "stream not connected"
        );
    }
}
