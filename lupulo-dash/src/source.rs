//! Upstream source client
//!
//! Holds the single connection to the data source's SSE endpoint and forwards
//! every event to the runtime loop. Layout and device envelopes travel on the
//! same connection as data events.

use crate::error::Result;
use futures::StreamExt;
use lupulo_common::events::{DashEvent, EventBus};
use lupulo_common::sse::{decode_sse_stream, SseFrame};
use reqwest::header::ACCEPT;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// One upstream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMessage {
    /// SSE event name (`new_widgets`, `new_devices` or a physical event name)
    pub event: String,
    /// Raw JSON text
    pub data: String,
}

impl From<SseFrame> for SourceMessage {
    fn from(frame: SseFrame) -> Self {
        Self {
            event: frame.event,
            data: frame.data,
        }
    }
}

/// Why a connection ended
#[derive(Debug, PartialEq, Eq)]
enum Disconnect {
    /// Server closed the stream
    Closed,
    /// Shutdown requested or runtime gone
    Stop,
}

pub struct SourceClient {
    url: String,
    reconnect_delay: Duration,
    client: reqwest::Client,
    bus: Arc<EventBus>,
    /// Server-requested reconnect delay in milliseconds
    server_retry: Option<u64>,
    last_event_id: Option<String>,
}

impl SourceClient {
    pub fn new(url: impl Into<String>, reconnect_delay: Duration, bus: Arc<EventBus>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay,
            client: reqwest::Client::new(),
            bus,
            server_retry: None,
            last_event_id: None,
        }
    }

    /// Delay before the next reconnect attempt
    pub fn retry_delay(&self) -> Duration {
        self.server_retry
            .map(Duration::from_millis)
            .unwrap_or(self.reconnect_delay)
    }

    /// Stream events into `tx` until shutdown, reconnecting on failure
    pub async fn run(mut self, tx: mpsc::Sender<SourceMessage>, mut shutdown: watch::Receiver<bool>) {
        info!("Source client started for {}", self.url);

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.connect_and_stream(&tx, &mut shutdown).await {
                Ok(Disconnect::Stop) => break,
                Ok(Disconnect::Closed) => info!("Source {} closed the stream", self.url),
                Err(e) => warn!("Source {} failed: {}", self.url, e),
            }
            self.publish_status(false);

            let delay = self.retry_delay();
            debug!("Reconnecting to {} in {:?}", self.url, delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("Source client stopped");
    }

    async fn connect_and_stream(
        &mut self,
        tx: &mpsc::Sender<SourceMessage>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Disconnect> {
        let mut request = self.client.get(&self.url).header(ACCEPT, "text/event-stream");
        if let Some(id) = &self.last_event_id {
            request = request.header("Last-Event-ID", id.as_str());
        }

        let response = request.send().await?.error_for_status()?;
        info!("Connected to source {}", self.url);
        self.publish_status(true);

        let frames = decode_sse_stream(response.bytes_stream());
        tokio::pin!(frames);

        loop {
            tokio::select! {
                frame = frames.next() => match frame {
                    Some(Ok(frame)) => {
                        if frame.retry.is_some() {
                            self.server_retry = frame.retry;
                        }
                        if frame.id.is_some() {
                            self.last_event_id = frame.id.clone();
                        }
                        if tx.send(SourceMessage::from(frame)).await.is_err() {
                            return Ok(Disconnect::Stop);
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(Disconnect::Closed),
                },
                _ = shutdown.changed() => return Ok(Disconnect::Stop),
            }
        }
    }

    fn publish_status(&self, connected: bool) {
        self.bus.emit_lossy(DashEvent::SourceStatus {
            connected,
            url: self.url.clone(),
            timestamp: lupulo_common::time::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_from_frame() {
        let msg = SourceMessage::from(SseFrame::new("id1-battery", "55"));
        assert_eq!(msg.event, "id1-battery");
        assert_eq!(msg.data, "55");
    }

    #[test]
    fn test_retry_delay_prefers_server_value() {
        let bus = Arc::new(EventBus::new(10));
        let mut client = SourceClient::new("http://localhost:1/events", Duration::from_secs(3), bus);
        assert_eq!(client.retry_delay(), Duration::from_secs(3));
        client.server_retry = Some(250);
        assert_eq!(client.retry_delay(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_unreachable_source_reports_and_stops_on_shutdown() {
        let bus = Arc::new(EventBus::new(10));
        let mut events = bus.subscribe();
        // Port 1 refuses connections
        let client = SourceClient::new(
            "http://127.0.0.1:1/events",
            Duration::from_secs(60),
            bus.clone(),
        );
        let (tx, _rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(client.run(tx, shutdown_rx));

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("status event")
            .unwrap();
        assert!(matches!(event, DashEvent::SourceStatus { connected: false, .. }));

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("client stops")
            .unwrap();
    }
}
