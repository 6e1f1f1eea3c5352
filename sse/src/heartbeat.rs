use crate::registry::ClientRegistry;
use chrono::{DateTime, Utc};
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Outcome of one pass over the registry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Sweep {
    pub closed: usize,
    pub pinged: usize,
}

/// Periodically closes expired sessions and pings the others.
pub struct HeartbeatMonitor {
    task: JoinHandle<()>,
}

impl HeartbeatMonitor {
    /// Spawns the periodic task. The first sweep runs one `interval` from now.
    pub fn start(registry: Arc<ClientRegistry>, interval: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let sweep = sweep(&registry, Utc::now());
                trace!(
                    "Heartbeat sweep: {} pinged, {} expired",
                    sweep.pinged,
                    sweep.closed
                );
            }
        });
        debug!("Heartbeat monitor started ({interval:?})");

        Self { task }
    }

    pub fn stop(&self) {
        if !self.task.is_finished() {
            self.task.abort();
            debug!("Heartbeat monitor stopped");
        }
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Closes every session expired at `now` and sends a heartbeat to the rest.
/// Closed sessions stay registered until their stream goes away.
pub fn sweep(registry: &ClientRegistry, now: DateTime<Utc>) -> Sweep {
    let mut sweep = Sweep::default();

    for session in registry.snapshot() {
        if session.is_expired_at(now) {
            if !session.is_closed() {
                info!("Stream credentials of {} expired", session.identity_id());
                session.close();
                sweep.closed += 1;
            }
        } else if session.send_heartbeat(now) {
            sweep.pinged += 1;
        }
    }

    sweep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::HEARTBEAT_EVENT;
    use crate::session::ClientSession;
    use chrono::Duration as ChronoDuration;
    use domain::Identity;

    fn identity(id: &str, expires_in: ChronoDuration) -> Identity {
        Identity::new(id, ["TLP:GREEN"], false, Utc::now() + expires_in)
    }

    #[tokio::test]
    async fn sweep_closes_expired_sessions_and_pings_the_rest() {
        let registry = ClientRegistry::new();
        let (live, mut live_frames) =
            ClientSession::open(identity("live", ChronoDuration::hours(1)));
        let (stale, mut stale_frames) =
            ClientSession::open(identity("stale", ChronoDuration::seconds(30)));
        registry.register(Arc::clone(&live));
        registry.register(Arc::clone(&stale));

        let later = Utc::now() + ChronoDuration::minutes(1);
        let result = sweep(&registry, later);

        assert_eq!(result, Sweep { closed: 1, pinged: 1 });
        assert!(stale.is_closed());
        assert!(stale_frames.recv().await.is_none());
        assert_eq!(
            live_frames.recv().await.unwrap().event.as_deref(),
            Some(HEARTBEAT_EVENT)
        );
        assert!(!live.is_closed());
        // Closed streams stay registered until their reader goes away.
        assert_eq!(registry.count_live(), 2);
    }

    #[tokio::test]
    async fn expiry_at_the_exact_instant_closes() {
        let registry = ClientRegistry::new();
        let expires = Utc::now() + ChronoDuration::seconds(5);
        let (session, _frames) =
            ClientSession::open(Identity::new("u1", ["TLP:GREEN"], false, expires));
        registry.register(Arc::clone(&session));

        let result = sweep(&registry, expires);

        assert_eq!(result.closed, 1);
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn already_closed_sessions_are_skipped() {
        let registry = ClientRegistry::new();
        let (session, _frames) = ClientSession::open(identity("u1", ChronoDuration::hours(1)));
        registry.register(Arc::clone(&session));
        session.close();

        assert_eq!(sweep(&registry, Utc::now()), Sweep::default());
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_pings_every_interval_until_stopped() {
        let registry = Arc::new(ClientRegistry::new());
        let (session, mut frames) = ClientSession::open(identity("u1", ChronoDuration::hours(1)));
        registry.register(Arc::clone(&session));

        let monitor = HeartbeatMonitor::start(Arc::clone(&registry), Duration::from_secs(20));

        time::sleep(Duration::from_secs(19)).await;
        assert!(frames.try_recv().is_err());

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            frames.recv().await.unwrap().event.as_deref(),
            Some(HEARTBEAT_EVENT)
        );

        monitor.stop();
        monitor.stop();
        time::sleep(Duration::from_secs(60)).await;
        assert!(frames.try_recv().is_err());
    }
}
