//! Channel-level consumer handle.

use futures_util::stream;
use topology::Channel;

use crate::client::{ConsumedRecord, Consumer, RecordStream};
use crate::error::ConsumeResult;

/// A consumer bound to the process's consumer group.
///
/// Not shareable between workers: every method takes `&mut self`, so each
/// handle drives exactly one consumer loop.
pub struct ChannelConsumer<C: Consumer> {
    inner: C,
    group_id: String,
    subscription: Vec<Channel>,
}

impl<C: Consumer> ChannelConsumer<C> {
    /// Wraps a backend consumer.
    pub fn new(inner: C, group_id: impl Into<String>) -> Self {
        Self {
            inner,
            group_id: group_id.into(),
            subscription: Vec::new(),
        }
    }

    /// Returns the consumer group.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Returns the subscribed channels.
    pub fn subscription(&self) -> &[Channel] {
        &self.subscription
    }

    /// Subscribes to `channels`, replacing any previous subscription.
    #[tracing::instrument(skip(self), fields(group_id = %self.group_id))]
    pub fn subscribe(&mut self, channels: &[Channel]) -> ConsumeResult<()> {
        self.inner.subscribe(channels)?;
        self.subscription = channels.to_vec();
        tracing::info!(channels = channels.len(), "subscribed");
        Ok(())
    }

    /// Subscribes to every registered channel.
    pub fn subscribe_all(&mut self) -> ConsumeResult<()> {
        self.subscribe(&Channel::ALL)
    }

    /// Waits for the next record.
    pub async fn recv(&mut self) -> ConsumeResult<ConsumedRecord> {
        match self.inner.recv().await {
            Ok(record) => {
                metrics::counter!("messaging_events_consumed_total", "channel" => record.channel.wire_name())
                    .increment(1);
                tracing::debug!(
                    channel = %record.channel,
                    partition = record.partition,
                    offset = record.offset,
                    "event received"
                );
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(group_id = %self.group_id, error = %e, "consume failed");
                Err(e)
            }
        }
    }

    /// Commits the group's position past `record`.
    pub fn commit(&mut self, record: &ConsumedRecord) -> ConsumeResult<()> {
        self.inner.commit(record)
    }

    /// Returns the backend consumer.
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: Consumer + 'static> ChannelConsumer<C> {
    /// Turns the handle into an infinite stream of records.
    ///
    /// Errors are yielded in place so the loop can skip or stop.
    pub fn into_stream(self) -> RecordStream {
        Box::pin(stream::unfold(self, |mut consumer| async move {
            let next = consumer.recv().await;
            Some((next, consumer))
        }))
    }
}
