//! Server-Sent Events fan-out of the event log to authenticated clients.
//!
//! # Architecture
//!
//! - **One stream per identity**: [`ClientRegistry`] keys sessions by identity
//!   id. A second connection for the same identity force-closes the first.
//! - **Per-recipient filtering**: every event goes through [`access::decide`]
//!   for each recipient. Recipients without clearance for all of an event's
//!   markings get a redacted frame with only its markings and timestamp.
//! - **Single live tail**: the [`Hub`] holds one subscription to the log and a
//!   [`Broadcaster`] consumes it sequentially, so every session receives events
//!   in log order.
//! - **Heartbeat**: [`HeartbeatMonitor`] pings live sessions and closes those
//!   whose credentials expired.
//! - **History replay**: [`Hub::replay`] pushes a range of the log into the
//!   caller's already open stream, through the same filter.
//!
//! # Message Flow
//!
//! 1. A client opens `GET /stream` and the web layer resolves its identity
//! 2. [`Hub::connect`] queues `connected` and `heartbeat` frames, then registers the session
//! 3. The web layer drains the returned [`ClientStream`] into the response body
//! 4. Each event appended to the log reaches the broadcaster through the live tail
//! 5. Dropping the [`ClientStream`] (client gone) unregisters the session
//!
//! # Modules
//!
//! - `access`: marking checks and the full/redacted envelope
//! - `message`: wire frames and control payloads
//! - `session`: one open stream bound to one identity
//! - `registry`: identity-keyed session store
//! - `heartbeat`: periodic liveness and expiry sweep
//! - `broadcaster`: live tail consumer
//! - `manager`: the [`Hub`] tying it all together

pub mod access;
pub mod broadcaster;
pub mod error;
pub mod heartbeat;
pub mod manager;
pub mod message;
pub mod registry;
pub mod session;

pub use broadcaster::Broadcaster;
pub use error::{Error, StreamErrorKind};
pub use heartbeat::HeartbeatMonitor;
pub use manager::{ClientStream, Hub};
pub use message::Frame;
pub use registry::ClientRegistry;
pub use session::{ClientSession, ConnectionId};
