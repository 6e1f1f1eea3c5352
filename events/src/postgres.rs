use crate::{Cursor, Error, Event, EventId, EventLog, EventLogErrorKind, StreamInfo, Subscription};
use async_trait::async_trait;
use entity::stream_events::NOTIFY_CHANNEL;
use entity_api::stream_event;
use log::*;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use sqlx::postgres::PgListener;
use std::sync::Arc;
use std::time::Duration;

/// Pause before polling the listener again after a dropped connection.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Event log stored in the `stream_events` table.
///
/// Range reads and metadata go through the sea-orm pool. The live tail uses a
/// dedicated `LISTEN` connection: the insert trigger publishes each new id on
/// [`NOTIFY_CHANNEL`] and the listener task loads and forwards the row.
pub struct PgEventLog {
    db: Arc<DatabaseConnection>,
    database_url: String,
}

impl PgEventLog {
    pub fn new(db: Arc<DatabaseConnection>, database_url: impl Into<String>) -> Self {
        Self {
            db,
            database_url: database_url.into(),
        }
    }

    pub async fn append(
        &self,
        topic: impl Into<String>,
        data: Value,
        markings: Vec<String>,
    ) -> Result<Event, Error> {
        stream_event::create(&self.db, topic.into(), data, markings)
            .await
            .map(Event::from)
            .map_err(|e| Error::new(EventLogErrorKind::Append, e))
    }
}

#[async_trait]
impl EventLog for PgEventLog {
    async fn subscribe(&self) -> Result<Subscription, Error> {
        let mut listener = PgListener::connect(&self.database_url).await?;
        listener.listen(NOTIFY_CHANNEL).await?;
        info!("Listening for new stream events on channel {NOTIFY_CHANNEL}");

        let (subscription, feed) = Subscription::channel();
        let mut stop = feed.stop_signal();
        let db = Arc::clone(&self.db);

        tokio::spawn(async move {
            loop {
                let notification = tokio::select! {
                    _ = stop.changed() => break,
                    notification = listener.recv() => notification,
                };

                match notification {
                    Ok(notification) => {
                        let id = match notification.payload().parse::<i64>() {
                            Ok(id) => id,
                            Err(e) => {
                                warn!(
                                    "Ignoring malformed stream notification '{}': {e}",
                                    notification.payload()
                                );
                                continue;
                            }
                        };

                        match stream_event::find_by_id(&db, id).await {
                            Ok(model) => {
                                if !feed.push(Event::from(model)) {
                                    break;
                                }
                            }
                            Err(e) => error!("Failed to load stream event {id}: {e}"),
                        }
                    }
                    Err(e) => {
                        // The listener reconnects on the next recv; notifications
                        // sent while disconnected are lost and must be replayed.
                        error!("Stream listener connection lost: {e}");
                        tokio::time::sleep(RECONNECT_BACKOFF).await;
                    }
                }
            }

            if let Err(e) = listener.unlisten(NOTIFY_CHANNEL).await {
                debug!("Failed to UNLISTEN {NOTIFY_CHANNEL}: {e}");
            }
            info!("Stopped listening for stream events");
        });

        Ok(subscription)
    }

    async fn range_read(&self, from: &Cursor, size: usize) -> Result<Vec<Event>, Error> {
        let from = match from {
            Cursor::Earliest => None,
            Cursor::From(id) => Some(id.0),
        };

        let models = stream_event::find_range(&self.db, from, size as u64)
            .await
            .map_err(|e| Error::new(EventLogErrorKind::Read, e))?;

        Ok(models.into_iter().map(Event::from).collect())
    }

    async fn info(&self) -> Result<StreamInfo, Error> {
        let bounds = stream_event::find_bounds(&self.db)
            .await
            .map_err(|e| Error::new(EventLogErrorKind::Read, e))?;

        Ok(StreamInfo {
            first_event_id: bounds.first_id.map(EventId),
            last_event_id: bounds.last_id.map(EventId),
            stream_size: bounds.size,
        })
    }
}
