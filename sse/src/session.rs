use crate::access;
use crate::message::{ConnectedInfo, Frame};
use chrono::{DateTime, Utc};
use domain::Identity;
use events::Event;
use log::*;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// One open stream bound to one identity.
///
/// Frames go through an unbounded channel drained by the HTTP response body.
/// Closing drops the sending half, which ends the response once the frames
/// already queued have been flushed.
#[derive(Debug)]
pub struct ClientSession {
    connection_id: ConnectionId,
    identity: Identity,
    /// Milliseconds since the epoch. Closing resets it to zero.
    expiration: AtomicI64,
    closed: AtomicBool,
    sender: Mutex<Option<UnboundedSender<Frame>>>,
}

impl ClientSession {
    /// Opens a session and returns the receiving end of its frames.
    pub fn open(identity: Identity) -> (Arc<Self>, UnboundedReceiver<Frame>) {
        let (sender, frames) = mpsc::unbounded_channel();
        let session = Self {
            connection_id: ConnectionId::new(),
            expiration: AtomicI64::new(identity.expiration_time.timestamp_millis()),
            identity,
            closed: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
        };
        (Arc::new(session), frames)
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn identity_id(&self) -> &str {
        &self.identity.id
    }

    pub fn expiration_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.expiration.load(Ordering::Acquire))
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() >= self.expiration.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Queues a frame. Returns `false` when the stream is already closed, in
    /// which case the frame is dropped.
    pub fn send(&self, frame: Frame) -> bool {
        if self.is_closed() {
            info!(
                "Dropping write to terminated stream of {}",
                self.identity.id
            );
            return false;
        }

        let sender = match self.sender.lock() {
            Ok(sender) => sender,
            Err(_) => return false,
        };
        match sender.as_ref() {
            Some(sender) => match sender.send(frame) {
                Ok(()) => true,
                Err(_) => {
                    debug!("Stream reader of {} is gone", self.identity.id);
                    false
                }
            },
            None => false,
        }
    }

    /// Filters the event against this session's identity and queues the result.
    pub fn send_event(&self, event: &Event) -> bool {
        match access::decide(event, &self.identity).to_frame() {
            Ok(frame) => self.send(frame),
            Err(e) => {
                error!("Failed to serialize event {}: {e}", event.id);
                false
            }
        }
    }

    pub fn send_heartbeat(&self, now: DateTime<Utc>) -> bool {
        match Frame::heartbeat(now) {
            Ok(frame) => self.send(frame),
            Err(e) => {
                error!("Failed to serialize heartbeat: {e}");
                false
            }
        }
    }

    /// Queues the `connected` frame followed by a first heartbeat.
    pub fn send_connected(&self, info: &ConnectedInfo) -> bool {
        let connected = match Frame::connected(info) {
            Ok(frame) => self.send(frame),
            Err(e) => {
                error!("Failed to serialize connected frame: {e}");
                false
            }
        };
        connected && self.send_heartbeat(Utc::now())
    }

    /// Ends the stream and marks the session expired. Safe to call any number
    /// of times.
    pub fn close(&self) {
        if self.shut() {
            info!(
                "Closed stream {} of {}",
                self.connection_id.as_str(),
                self.identity.id
            );
        }
    }

    /// Same as [`close`](Self::close) for a stream whose reader already went away.
    pub(crate) fn mark_disconnected(&self) {
        if self.shut() {
            debug!(
                "Stream {} of {} disconnected",
                self.connection_id.as_str(),
                self.identity.id
            );
        }
    }

    /// Returns `true` for the call that actually closed the session.
    fn shut(&self) -> bool {
        self.expiration.store(0, Ordering::Release);
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        match self.sender.lock() {
            Ok(mut sender) => {
                sender.take();
            }
            Err(e) => error!("Failed to close stream of {}: {e}", self.identity.id),
        }
        true
    }
}
