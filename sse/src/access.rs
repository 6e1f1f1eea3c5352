//! Per-recipient confidentiality filtering of log events.
//!
//! [`decide`] is the single place where an event's markings are checked
//! against an identity. Live broadcast and history replay both go through it.

use crate::message::Frame;
use chrono::{DateTime, Utc};
use domain::Identity;
use events::Event;
use serde::Serialize;

/// Object type of marking definitions. Events about the labels themselves are
/// never gated by labels.
pub const MARKING_DEFINITION_TYPE: &str = "marking-definition";

/// What one recipient gets to see of one event.
///
/// Borrows the shared event: building an envelope for one recipient never
/// touches what another recipient receives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Envelope<'a> {
    /// The whole event. `granted` is false when it is only visible through bypass.
    Full { event: &'a Event, granted: bool },
    /// Only the fact that an event happened: its markings and timestamp.
    Redacted { event: &'a Event },
}

#[derive(Serialize)]
struct FullBody<'a> {
    data: &'a serde_json::Value,
    markings: &'a [String],
    timestamp: &'a DateTime<Utc>,
    granted: bool,
}

#[derive(Serialize)]
struct RedactedBody<'a> {
    markings: &'a [String],
    timestamp: &'a DateTime<Utc>,
    granted: bool,
}

pub fn is_marking_definition(event: &Event) -> bool {
    event
        .data_type()
        .is_some_and(|data_type| data_type.eq_ignore_ascii_case(MARKING_DEFINITION_TYPE))
}

/// True when the event carries at least one marking and every one of them is
/// allowed for the identity. An unmarked event is not granted by this rule.
pub fn all_markings_allowed(event: &Event, identity: &Identity) -> bool {
    !event.markings.is_empty() && event.markings.iter().all(|m| identity.may_see(m))
}

pub fn decide<'a>(event: &'a Event, identity: &Identity) -> Envelope<'a> {
    let granted = is_marking_definition(event) || all_markings_allowed(event, identity);

    if granted || identity.bypass {
        Envelope::Full { event, granted }
    } else {
        Envelope::Redacted { event }
    }
}

impl Envelope<'_> {
    pub fn granted(&self) -> bool {
        match self {
            Envelope::Full { granted, .. } => *granted,
            Envelope::Redacted { .. } => false,
        }
    }

    /// Frames the envelope for the wire. Redacted frames carry no `event:`
    /// line, so the topic never reaches a recipient that may not see it.
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        match self {
            Envelope::Full { event, granted } => Frame::new(
                Some(event.id.to_string()),
                Some(event.topic.clone()),
                &FullBody {
                    data: &event.data,
                    markings: &event.markings,
                    timestamp: &event.timestamp,
                    granted: *granted,
                },
            ),
            Envelope::Redacted { event } => Frame::new(
                Some(event.id.to_string()),
                None,
                &RedactedBody {
                    markings: &event.markings,
                    timestamp: &event.timestamp,
                    granted: false,
                },
            ),
        }
    }
}
