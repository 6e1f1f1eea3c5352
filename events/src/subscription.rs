//! Live-tail subscriptions.
//!
//! A log implementation hands out a [`Subscription`] and keeps the matching
//! [`SubscriptionFeed`]. Events pushed into the feed come out of the
//! subscription in push order. The [`SubscriptionHandle`] is the only way to
//! stop the feed; it is idempotent and can be cloned into whatever owns the
//! process lifecycle.

use crate::{Event, EventHandler};
use log::*;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub struct Subscription {
    events: mpsc::UnboundedReceiver<Event>,
    stop: watch::Receiver<bool>,
    handle: SubscriptionHandle,
}

/// Producer side of a subscription, owned by the event log.
pub struct SubscriptionFeed {
    sender: mpsc::UnboundedSender<Event>,
    stop: watch::Receiver<bool>,
}

#[derive(Clone)]
pub struct SubscriptionHandle {
    stop: Arc<watch::Sender<bool>>,
}

impl Subscription {
    /// Creates a connected subscription/feed pair.
    pub fn channel() -> (Subscription, SubscriptionFeed) {
        let (sender, events) = mpsc::unbounded_channel();
        let (stop_tx, stop) = watch::channel(false);

        (
            Subscription {
                events,
                stop: stop.clone(),
                handle: SubscriptionHandle {
                    stop: Arc::new(stop_tx),
                },
            },
            SubscriptionFeed { sender, stop },
        )
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Waits for the next event. Returns `None` once unsubscribed or once the
    /// log dropped its feed.
    pub async fn next(&mut self) -> Option<Event> {
        // Marks the current value as seen, so an unsubscribe from here on
        // wakes `changed()`.
        if *self.stop.borrow_and_update() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.stop.changed() => None,
            event = self.events.recv() => event,
        }
    }

    /// Spawns the single consumer of this subscription: every event is handed
    /// to `handler` one at a time, in log order, until the subscription ends.
    pub fn drive(mut self, handler: Arc<dyn EventHandler>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = self.next().await {
                handler.handle(&event).await;
            }
            debug!("Event log subscription ended");
        })
    }
}

impl SubscriptionFeed {
    /// Forwards an event to the subscriber. Returns `false` when the subscriber
    /// is gone, in which case the log should drop this feed.
    pub fn push(&self, event: Event) -> bool {
        !self.is_closed() && self.sender.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        *self.stop.borrow() || self.sender.is_closed()
    }

    /// A receiver that flips to `true` when the subscriber unsubscribes.
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop.clone()
    }
}

impl SubscriptionHandle {
    pub fn unsubscribe(&self) {
        self.stop.send_replace(true);
    }
}
