//! Publishing facade used by the saga state machine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use topology::Channel;

use crate::client::{Producer, RecordMetadata};
use crate::error::PublishResult;

/// A saga event addressed to a channel. The payload is opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    pub channel: Channel,
    pub payload: String,
}

impl EventEnvelope {
    /// Creates an envelope.
    pub fn new(channel: Channel, payload: impl Into<String>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }
}

/// Cheap, clonable handle over one shared producer.
///
/// Safe to use from many tasks at once. Records published to the same
/// channel through one producer keep their publish order; there is no
/// ordering across channels. Failures are returned, never retried.
pub struct Publisher<P: Producer> {
    producer: Arc<P>,
}

impl<P: Producer> Clone for Publisher<P> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<P: Producer> Publisher<P> {
    /// Wraps a producer.
    pub fn new(producer: P) -> Self {
        Self {
            producer: Arc::new(producer),
        }
    }

    /// Publishes `payload` on `channel`.
    #[tracing::instrument(skip(self, payload), fields(channel = %channel, bytes = payload.len()))]
    pub async fn publish(&self, channel: Channel, payload: &str) -> PublishResult<RecordMetadata> {
        let started = Instant::now();
        match self.producer.send(channel, payload).await {
            Ok(metadata) => {
                metrics::counter!("messaging_events_published_total", "channel" => channel.wire_name())
                    .increment(1);
                metrics::histogram!("messaging_publish_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::debug!(
                    partition = metadata.partition,
                    offset = metadata.offset,
                    "event published"
                );
                Ok(metadata)
            }
            Err(e) => {
                metrics::counter!("messaging_publish_failures_total", "channel" => channel.wire_name())
                    .increment(1);
                tracing::warn!(error = %e, "publish failed");
                Err(e)
            }
        }
    }

    /// Publishes an envelope.
    pub async fn publish_envelope(&self, envelope: &EventEnvelope) -> PublishResult<RecordMetadata> {
        self.publish(envelope.channel, &envelope.payload).await
    }

    /// Waits for in-flight records to be acknowledged.
    #[tracing::instrument(skip(self))]
    pub async fn flush(&self, timeout: Duration) -> PublishResult<()> {
        self.producer.flush(timeout).await
    }

    /// Returns the underlying producer.
    pub fn producer(&self) -> &P {
        &self.producer
    }
}
