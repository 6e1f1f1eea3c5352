use crate::{Cursor, Error, Event, EventId, EventLog, StreamInfo, Subscription, SubscriptionFeed};
use async_trait::async_trait;
use chrono::Utc;
use log::*;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Append-only log held in process memory. Offsets start at 1.
#[derive(Default)]
pub struct MemoryEventLog {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    events: Vec<Event>,
    feeds: Vec<SubscriptionFeed>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and pushes it to every live subscriber before returning.
    pub fn append(&self, topic: impl Into<String>, data: Value, markings: Vec<String>) -> Event {
        let mut state = self.state();

        let id = state
            .events
            .last()
            .map(|last| last.id.next())
            .unwrap_or(EventId(1));
        let event = Event {
            id,
            topic: topic.into(),
            data,
            markings,
            timestamp: Utc::now(),
        };
        state.events.push(event.clone());

        // Pushing under the lock keeps every subscriber in append order.
        state.feeds.retain(|feed| feed.push(event.clone()));
        trace!(
            "Appended event {} to memory log ({} subscriber(s))",
            event.id,
            state.feeds.len()
        );

        event
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn subscribe(&self) -> Result<Subscription, Error> {
        let (subscription, feed) = Subscription::channel();
        self.state().feeds.push(feed);
        Ok(subscription)
    }

    async fn range_read(&self, from: &Cursor, size: usize) -> Result<Vec<Event>, Error> {
        let state = self.state();
        let start = match from {
            Cursor::Earliest => 0,
            Cursor::From(id) => state.events.partition_point(|e| e.id < *id),
        };

        Ok(state.events.iter().skip(start).take(size).cloned().collect())
    }

    async fn info(&self) -> Result<StreamInfo, Error> {
        let state = self.state();
        Ok(StreamInfo {
            first_event_id: state.events.first().map(|e| e.id),
            last_event_id: state.events.last().map(|e| e.id),
            stream_size: state.events.len() as u64,
        })
    }
}
