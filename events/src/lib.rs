//! Ordered event log infrastructure for the stream hub.
//!
//! This crate defines the contract the stream hub relies on to read events
//! and ships the two logs the server can run against.
//!
//! # Architecture
//!
//! - **Event**: one immutable log entry (offset, topic, payload, markings, timestamp)
//! - **EventLog**: live-tail subscription, bounded range read and log metadata
//! - **EventHandler**: single consumer driven by a [`Subscription`], one event at a time
//! - **MemoryEventLog**: in-process log for development and tests
//! - **PgEventLog**: `stream_events` table with a LISTEN/NOTIFY live tail
//!
//! Producers append through the concrete log types; consumers only ever see
//! the `EventLog` trait.

use async_trait::async_trait;

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod subscription;

pub use error::{Error, EventLogErrorKind};
pub use event::{Cursor, Event, EventId, StreamInfo};
pub use memory::MemoryEventLog;
pub use postgres::PgEventLog;
pub use subscription::{Subscription, SubscriptionFeed, SubscriptionHandle};

/// Read side of the append-only event log.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Opens a live tail delivering every event appended from now on, in log order.
    async fn subscribe(&self) -> Result<Subscription, Error>;

    /// Reads at most `size` events in log order starting at `from` (inclusive).
    async fn range_read(&self, from: &Cursor, size: usize) -> Result<Vec<Event>, Error>;

    /// Current bounds and size of the log.
    async fn info(&self) -> Result<StreamInfo, Error>;
}

/// Trait for handling events delivered by a subscription.
/// Handlers are invoked sequentially: the next event is not handed over
/// before `handle` returns for the previous one.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event);
}
