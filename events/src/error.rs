//! Error types for the `events` crate.
//!
//! Follows the same pattern as `entity_api::error`: a root `Error` struct holding
//! the kind of failure and, optionally, the lower-level error that caused it.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: EventLogErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum EventLogErrorKind {
    /// The live tail could not be established.
    Subscribe,
    /// A range read or metadata query against the log failed.
    Read,
    /// An event could not be appended to the log.
    Append,
    /// A replay cursor that is neither `-` nor an event offset.
    InvalidCursor(String),
}

impl Error {
    pub(crate) fn new<E>(error_kind: EventLogErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Error {
            source: Some(source.into()),
            error_kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let summary = match &self.error_kind {
            EventLogErrorKind::Subscribe => "failed to subscribe to the event log".to_string(),
            EventLogErrorKind::Read => "failed to read from the event log".to_string(),
            EventLogErrorKind::Append => "failed to append to the event log".to_string(),
            EventLogErrorKind::InvalidCursor(cursor) => format!("invalid stream cursor '{cursor}'"),
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

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::new(EventLogErrorKind::Subscribe, err)
    }
}
