//! Analytics sinks
//!
//! A sink receives each tracked interaction through one synchronous,
//! non-blocking call. Delivery past that call (queues, HTTP, retries) is the
//! sink's business; its failures come back as `SinkError` and the tracker
//! only logs them.

use std::sync::Arc;
use std::time::Duration;

use folio_common::events::{EventBus, FolioEvent};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::tracker::TrackedInteraction;

/// Why a sink did not accept an interaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The receiving side is gone
    #[error("analytics sink closed")]
    Closed,

    /// The queue is full; the interaction was dropped
    #[error("analytics queue full")]
    Full,

    /// The sink refused the interaction
    #[error("analytics sink rejected event: {0}")]
    Rejected(String),
}

pub trait AnalyticsSink: Send + Sync {
    fn track(&self, interaction: &TrackedInteraction) -> Result<(), SinkError>;
}

/// Writes each interaction as a structured log line
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn track(&self, interaction: &TrackedInteraction) -> Result<(), SinkError> {
        info!(
            element_identifier = %interaction.element_identifier,
            element_type = %interaction.element_type,
            x = interaction.position_x,
            y = interaction.position_y,
            "Interaction tracked"
        );
        Ok(())
    }
}

/// Republishes interactions on the event bus (SSE subscribers)
#[derive(Clone)]
pub struct BusSink {
    events: EventBus,
}

impl BusSink {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }
}

impl AnalyticsSink for BusSink {
    fn track(&self, interaction: &TrackedInteraction) -> Result<(), SinkError> {
        self.events.emit_lossy(FolioEvent::InteractionTracked {
            element_identifier: interaction.element_identifier.clone(),
            element_type: interaction.element_type.clone(),
            position_x: interaction.position_x,
            position_y: interaction.position_y,
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }
}

/// Hands interactions to a bounded queue without waiting
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<TrackedInteraction>,
}

impl ChannelSink {
    /// Sink plus the receiving end of its queue
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TrackedInteraction>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl AnalyticsSink for ChannelSink {
    fn track(&self, interaction: &TrackedInteraction) -> Result<(), SinkError> {
        self.tx
            .try_send(interaction.clone())
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SinkError::Full,
                mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
            })
    }
}

/// Delivers to every inner sink; the first failure is reported after all
/// sinks have been tried
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn AnalyticsSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl AnalyticsSink for FanoutSink {
    fn track(&self, interaction: &TrackedInteraction) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.track(interaction) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Drain `rx`, POSTing each interaction as JSON to `endpoint`
///
/// Failed deliveries are logged and dropped; tracking is best-effort. The
/// task ends when every `ChannelSink` feeding `rx` is dropped.
pub fn spawn_forwarder(
    endpoint: String,
    mut rx: mpsc::Receiver<TrackedInteraction>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|e| {
                warn!("Could not configure analytics HTTP client ({}), using defaults", e);
                reqwest::Client::new()
            });

        info!("Forwarding tracked interactions to {}", endpoint);

        while let Some(interaction) = rx.recv().await {
            match client.post(&endpoint).json(&interaction).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        "Forwarded interaction '{}' ({})",
                        interaction.element_identifier,
                        response.status()
                    );
                }
                Ok(response) => {
                    warn!(
                        "Analytics endpoint rejected interaction '{}': {}",
                        interaction.element_identifier,
                        response.status()
                    );
                }
                Err(e) => {
                    warn!(
                        "Could not forward interaction '{}': {}",
                        interaction.element_identifier, e
                    );
                }
            }
        }

        debug!("Analytics forwarder stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn interaction(id: &str) -> TrackedInteraction {
        TrackedInteraction {
            element_identifier: id.to_string(),
            element_type: "button".to_string(),
            position_x: 1.0,
            position_y: 2.0,
        }
    }

    struct FailingSink;

    impl AnalyticsSink for FailingSink {
        fn track(&self, _: &TrackedInteraction) -> Result<(), SinkError> {
            Err(SinkError::Rejected("nope".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<String>>);

    impl AnalyticsSink for RecordingSink {
        fn track(&self, interaction: &TrackedInteraction) -> Result<(), SinkError> {
            self.0
                .lock()
                .unwrap()
                .push(interaction.element_identifier.clone());
            Ok(())
        }
    }

    #[test]
    fn test_channel_sink_queues() {
        let (sink, mut rx) = ChannelSink::new(4);
        sink.track(&interaction("a")).unwrap();
        sink.track(&interaction("b")).unwrap();

        assert_eq!(rx.try_recv().unwrap().element_identifier, "a");
        assert_eq!(rx.try_recv().unwrap().element_identifier, "b");
    }

    #[test]
    fn test_channel_sink_full_and_closed() {
        let (sink, rx) = ChannelSink::new(1);
        sink.track(&interaction("a")).unwrap();
        assert_eq!(sink.track(&interaction("b")), Err(SinkError::Full));

        drop(rx);
        assert_eq!(sink.track(&interaction("c")), Err(SinkError::Closed));
    }

    #[test]
    fn test_bus_sink_publishes() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        BusSink::new(bus).track(&interaction("submit")).unwrap();

        match rx.try_recv().unwrap() {
            FolioEvent::InteractionTracked {
                element_identifier,
                element_type,
                ..
            } => {
                assert_eq!(element_identifier, "submit");
                assert_eq!(element_type, "button");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_fanout_tries_every_sink() {
        let recorder = Arc::new(RecordingSink::default());
        let fanout = FanoutSink::new()
            .with(Arc::new(FailingSink))
            .with(recorder.clone());

        let result = fanout.track(&interaction("x"));

        assert_eq!(result, Err(SinkError::Rejected("nope".to_string())));
        assert_eq!(*recorder.0.lock().unwrap(), vec!["x".to_string()]);
    }

    #[test]
    fn test_tracing_sink_accepts() {
        assert!(TracingSink.track(&interaction("x")).is_ok());
    }

    #[tokio::test]
    async fn test_forwarder_stops_when_senders_drop() {
        let (sink, rx) = ChannelSink::new(4);
        // Nothing listens on this port; deliveries fail and are dropped
        let handle = spawn_forwarder("http://127.0.0.1:9/collect".to_string(), rx);
        sink.track(&interaction("x")).unwrap();
        drop(sink);

        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("forwarder should stop")
            .expect("forwarder should not panic");
    }
}
