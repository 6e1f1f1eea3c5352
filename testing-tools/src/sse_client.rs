use anyhow::Result;
use eventsource_client::{self as es, Client};
use futures_util::stream::StreamExt;
use log::*;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Event name the client library assigns to frames without an `event:` line.
pub const UNNAMED_EVENT: &str = "message";

#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub id: Option<String>,
    pub data: Value,
    pub timestamp: Instant,
}

pub struct Connection {
    pub label: String,
    event_rx: mpsc::UnboundedReceiver<Event>,
    _handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    /// Opens `/stream` with a bearer token. Reconnection is disabled so a
    /// stream closed by the server stays closed.
    pub async fn establish(base_url: &str, token: &str, label: String) -> Result<Self> {
        let url = format!("{}/stream", base_url);
        let (tx, rx) = mpsc::unbounded_channel();

        let client = es::ClientBuilder::for_url(&url)?
            .header("Authorization", &format!("Bearer {}", token))?
            .reconnect(es::ReconnectOptions::reconnect(false).build())
            .build();

        let stream_label = label.clone();
        let handle = tokio::spawn(async move {
            let mut stream = client.stream();

            loop {
                match stream.next().await {
                    Some(Ok(es::SSE::Event(event))) => {
                        let data = match serde_json::from_str(&event.data) {
                            Ok(data) => data,
                            Err(e) => {
                                warn!("Non-JSON frame for {}: {}", stream_label, e);
                                continue;
                            }
                        };
                        let sse_event = Event {
                            event_type: event.event_type,
                            id: event.id,
                            data,
                            timestamp: Instant::now(),
                        };

                        if tx.send(sse_event).is_err() {
                            debug!("SSE receiver dropped for {}", stream_label);
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // Comments carry nothing
                    }
                    Some(Err(e)) => {
                        debug!("SSE stream for {} ended: {}", stream_label, e);
                        break;
                    }
                    None => {
                        debug!("SSE stream ended for {}", stream_label);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            label,
            event_rx: rx,
            _handle: handle,
        })
    }

    pub async fn wait_for_event(&mut self, event_type: &str, timeout: Duration) -> Result<Event> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                anyhow::bail!("Timeout waiting for event: {}", event_type);
            }

            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(event)) if event.event_type == event_type => {
                    return Ok(event);
                }
                Ok(Some(_)) => {
                    // Wrong event type, keep waiting
                    continue;
                }
                Ok(None) => {
                    anyhow::bail!("SSE connection closed");
                }
                Err(_) => {
                    anyhow::bail!("Timeout waiting for event: {}", event_type);
                }
            }
        }
    }

    /// Waits for the next frame carrying an id, i.e. a log event rather than a
    /// control frame.
    pub async fn wait_for_log_event(&mut self, timeout: Duration) -> Result<Event> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(event)) if event.id.is_some() => return Ok(event),
                Ok(Some(_)) => continue,
                Ok(None) => anyhow::bail!("SSE connection closed"),
                Err(_) => anyhow::bail!("Timeout waiting for a log event"),
            }
        }
    }

    /// Resolves once the server has closed the stream.
    pub async fn wait_for_close(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(_)) => continue,
                Ok(None) => return Ok(()),
                Err(_) => anyhow::bail!("Stream still open after {:?}", timeout),
            }
        }
    }
}
