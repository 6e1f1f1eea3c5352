use crate::broadcaster::Broadcaster;
use crate::error::{Error, StreamErrorKind};
use crate::heartbeat::HeartbeatMonitor;
use crate::message::{ConnectedInfo, Frame};
use crate::registry::ClientRegistry;
use crate::session::ClientSession;
use domain::Identity;
use events::{Cursor, EventLog, StreamInfo, SubscriptionHandle};
use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// Owns the live tail, the client registry and the heartbeat for the process.
pub struct Hub {
    event_log: Arc<dyn EventLog>,
    registry: Arc<ClientRegistry>,
    heartbeat: HeartbeatMonitor,
    subscription: SubscriptionHandle,
    broadcast_task: JoinHandle<()>,
    shut_down: AtomicBool,
}

/// The reading end of one client's stream.
///
/// Dropping it, which happens when the HTTP client goes away, closes the
/// session and removes it from the registry unless a newer session for the
/// same identity already took its place.
pub struct ClientStream {
    session: Arc<ClientSession>,
    frames: UnboundedReceiver<Frame>,
    registry: Arc<ClientRegistry>,
}

impl Hub {
    /// Subscribes to the log's live tail and starts the heartbeat. Fails when
    /// the subscription cannot be established.
    pub async fn start(
        event_log: Arc<dyn EventLog>,
        heartbeat_interval: Duration,
    ) -> Result<Self, Error> {
        let registry = Arc::new(ClientRegistry::new());

        let subscription = event_log.subscribe().await?;
        let handle = subscription.handle();
        let broadcast_task = subscription.drive(Arc::new(Broadcaster::new(Arc::clone(&registry))));
        let heartbeat = HeartbeatMonitor::start(Arc::clone(&registry), heartbeat_interval);

        info!("Stream hub started");
        Ok(Self {
            event_log,
            registry,
            heartbeat,
            subscription: handle,
            broadcast_task,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Opens a stream for `identity`, replacing any stream it already has.
    ///
    /// The `connected` frame and a first heartbeat are queued before the
    /// session is registered, so they always precede broadcast events.
    pub async fn connect(&self, identity: Identity) -> Result<ClientStream, Error> {
        if self.is_shut_down() {
            return Err(Error::new(StreamErrorKind::ShuttingDown));
        }

        let stream = match self.event_log.info().await {
            Ok(info) => info,
            Err(e) => {
                warn!("Failed to read stream info: {e}");
                StreamInfo::default()
            }
        };

        let (session, frames) = ClientSession::open(identity);
        let replacing = self.registry.get(session.identity_id()).is_some();
        let clients = self.registry.count_live() + usize::from(!replacing);
        session.send_connected(&ConnectedInfo { stream, clients });

        self.registry.register(Arc::clone(&session));
        debug!(
            "Opened stream {} for {} ({clients} client(s))",
            session.connection_id().as_str(),
            session.identity_id()
        );

        Ok(ClientStream {
            session,
            frames,
            registry: Arc::clone(&self.registry),
        })
    }

    /// Sends up to `size` events starting at `from` to the live stream of
    /// `identity_id`, filtered for that stream's identity. Returns how many
    /// frames were queued.
    pub async fn replay(&self, identity_id: &str, from: &Cursor, size: usize) -> Result<usize, Error> {
        let session = self
            .registry
            .get(identity_id)
            // Closed by the heartbeat but not yet dropped by its reader.
            .filter(|session| !session.is_closed())
            .ok_or_else(|| Error::new(StreamErrorKind::NoActiveSession))?;

        let events = self.event_log.range_read(from, size).await?;
        let sent = events.iter().filter(|event| session.send_event(event)).count();

        debug!(
            "Replayed {sent}/{} event(s) from {from} to {identity_id}",
            events.len()
        );
        Ok(sent)
    }

    /// Stops the heartbeat, closes every stream and releases the live tail.
    /// Later calls do nothing.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        self.heartbeat.stop();
        self.registry.close_all();
        self.subscription.unsubscribe();
        info!("Stream hub shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        self.shutdown();
        self.broadcast_task.abort();
    }
}

impl ClientStream {
    pub fn session(&self) -> &Arc<ClientSession> {
        &self.session
    }

    /// Waits for the next frame. Returns `None` once the session is closed and
    /// every queued frame has been read.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.frames.recv().await
    }
}

impl Drop for ClientStream {
    fn drop(&mut self) {
        self.session.mark_disconnected();
        if self
            .registry
            .unregister(self.session.identity_id(), &self.session)
        {
            debug!(
                "Unregistered stream {} of {}",
                self.session.connection_id().as_str(),
                self.session.identity_id()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CONNECTED_EVENT, HEARTBEAT_EVENT};
    use chrono::{Duration as ChronoDuration, Utc};
    use events::{EventId, MemoryEventLog};
    use serde_json::{json, Value};

    const HEARTBEAT: Duration = Duration::from_secs(20);

    fn identity(id: &str, allowed: &[&str]) -> Identity {
        Identity::new(
            id,
            allowed.iter().copied(),
            false,
            Utc::now() + ChronoDuration::hours(1),
        )
    }

    async fn hub_with(log: Arc<MemoryEventLog>) -> Hub {
        Hub::start(log, HEARTBEAT).await.unwrap()
    }

    async fn skip_preamble(stream: &mut ClientStream) -> Value {
        let connected = stream.next_frame().await.unwrap();
        assert_eq!(connected.event.as_deref(), Some(CONNECTED_EVENT));
        let heartbeat = stream.next_frame().await.unwrap();
        assert_eq!(heartbeat.event.as_deref(), Some(HEARTBEAT_EVENT));
        serde_json::from_str(&connected.data).unwrap()
    }

    #[tokio::test]
    async fn connect_announces_stream_info_and_client_count() {
        let log = Arc::new(MemoryEventLog::new());
        log.append("create", json!({"type": "report"}), vec!["TLP:GREEN".to_string()]);
        let hub = hub_with(log).await;

        let _first = hub.connect(identity("u1", &[])).await.unwrap();
        let mut second = hub.connect(identity("u2", &[])).await.unwrap();

        let connected = skip_preamble(&mut second).await;
        assert_eq!(connected["clients"], json!(2));
        assert_eq!(connected["lastEventId"], json!(1));
        assert_eq!(connected["streamSize"], json!(1));
    }

    #[tokio::test]
    async fn appended_events_are_broadcast_filtered_per_identity() {
        let log = Arc::new(MemoryEventLog::new());
        let hub = hub_with(Arc::clone(&log)).await;
        let mut cleared = hub.connect(identity("cleared", &["TLP:AMBER"])).await.unwrap();
        let mut other = hub.connect(identity("other", &[])).await.unwrap();
        skip_preamble(&mut cleared).await;
        skip_preamble(&mut other).await;

        log.append("update", json!({"type": "report"}), vec!["TLP:AMBER".to_string()]);

        let full = cleared.next_frame().await.unwrap();
        assert_eq!(full.event.as_deref(), Some("update"));
        let redacted = other.next_frame().await.unwrap();
        assert_eq!(redacted.event, None);
        assert_eq!(redacted.id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn second_connection_for_an_identity_closes_the_first() {
        let hub = hub_with(Arc::new(MemoryEventLog::new())).await;
        let mut first = hub.connect(identity("u1", &[])).await.unwrap();
        let second = hub.connect(identity("u1", &[])).await.unwrap();

        skip_preamble(&mut first).await;
        assert!(first.next_frame().await.is_none());
        assert!(first.session().is_closed());

        // The replaced stream going away leaves the new one registered.
        drop(first);
        assert_eq!(hub.registry().count_live(), 1);
        assert_eq!(
            hub.registry().get("u1").unwrap().connection_id(),
            second.session().connection_id()
        );
    }

    #[tokio::test]
    async fn dropping_a_stream_unregisters_it() {
        let hub = hub_with(Arc::new(MemoryEventLog::new())).await;
        let stream = hub.connect(identity("u1", &[])).await.unwrap();
        let session = Arc::clone(stream.session());

        drop(stream);

        assert_eq!(hub.registry().count_live(), 0);
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn replay_sends_the_requested_range_to_the_callers_stream() {
        let log = Arc::new(MemoryEventLog::new());
        for n in 0..5 {
            let marking = if n % 2 == 0 { "TLP:GREEN" } else { "TLP:RED" };
            log.append("create", json!({"n": n}), vec![marking.to_string()]);
        }
        let hub = hub_with(log).await;
        let mut stream = hub.connect(identity("u1", &["TLP:GREEN"])).await.unwrap();
        skip_preamble(&mut stream).await;

        let sent = hub
            .replay("u1", &Cursor::From(EventId(2)), 3)
            .await
            .unwrap();
        assert_eq!(sent, 3);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let frame = stream.next_frame().await.unwrap();
            seen.push((frame.id.unwrap(), frame.event.is_some()));
        }
        assert_eq!(
            seen,
            vec![
                ("2".to_string(), false),
                ("3".to_string(), true),
                ("4".to_string(), false),
            ]
        );
    }

    #[tokio::test]
    async fn replay_without_a_stream_is_rejected() {
        let hub = hub_with(Arc::new(MemoryEventLog::new())).await;

        let err = hub.replay("nobody", &Cursor::Earliest, 10).await.unwrap_err();
        assert_eq!(err.error_kind, StreamErrorKind::NoActiveSession);
    }

    #[tokio::test]
    async fn replay_into_an_expired_stream_is_rejected() {
        let log = Arc::new(MemoryEventLog::new());
        log.append("create", json!({"n": 0}), vec!["TLP:GREEN".to_string()]);
        let hub = hub_with(log).await;
        let stream = hub.connect(identity("u1", &["TLP:GREEN"])).await.unwrap();

        // What a heartbeat sweep does to an expired session.
        stream.session().close();
        assert_eq!(hub.registry().count_live(), 1);

        let err = hub.replay("u1", &Cursor::Earliest, 10).await.unwrap_err();
        assert_eq!(err.error_kind, StreamErrorKind::NoActiveSession);
    }

    #[tokio::test]
    async fn replay_of_an_empty_range_sends_nothing() {
        let hub = hub_with(Arc::new(MemoryEventLog::new())).await;
        let mut stream = hub.connect(identity("u1", &[])).await.unwrap();
        skip_preamble(&mut stream).await;

        assert_eq!(hub.replay("u1", &Cursor::Earliest, 200).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn shutdown_closes_streams_and_refuses_new_ones() {
        let log = Arc::new(MemoryEventLog::new());
        let hub = hub_with(Arc::clone(&log)).await;
        let mut stream = hub.connect(identity("u1", &[])).await.unwrap();
        skip_preamble(&mut stream).await;

        hub.shutdown();
        hub.shutdown();

        assert!(stream.next_frame().await.is_none());
        assert!(hub.is_shut_down());
        let err = hub.connect(identity("u2", &[])).await.err().unwrap();
        assert_eq!(err.error_kind, StreamErrorKind::ShuttingDown);
    }
}
