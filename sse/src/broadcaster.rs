use crate::registry::ClientRegistry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use events::{Event, EventHandler};
use log::*;
use std::sync::Arc;

/// Fans every event from the live tail out to the registered sessions.
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Sends `event` to every session not expired at `now`, each one filtered
    /// for its own identity. Returns how many sessions accepted a frame.
    pub fn dispatch(&self, event: &Event, now: DateTime<Utc>) -> usize {
        let delivered = self
            .registry
            .snapshot()
            .iter()
            .filter(|session| !session.is_expired_at(now))
            .filter(|session| session.send_event(event))
            .count();

        trace!("Event {} ({}) sent to {delivered} stream(s)", event.id, event.topic);
        delivered
    }
}

#[async_trait]
impl EventHandler for Broadcaster {
    async fn handle(&self, event: &Event) {
        self.dispatch(event, Utc::now());
    }
}
