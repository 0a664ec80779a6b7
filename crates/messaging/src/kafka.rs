//! Apache Kafka backend built on `rdkafka`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rdkafka::Message;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig as KafkaClientConfig;
use rdkafka::consumer::{CommitMode, Consumer as _, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer as _};
use rdkafka::topic_partition_list::{Offset, TopicPartitionList};
use rdkafka::util::Timeout;
use topology::{Channel, ChannelSpec};

use crate::client::{
    Broker, ConsumedRecord, Consumer, Producer, RecordMetadata, TopicAdmin, TopicStatus,
    commit_error,
};
use crate::config::ClientConfig;
use crate::error::{
    ConfigurationError, ConsumeError, ConsumeResult, ProvisioningError, PublishError, PublishResult,
};

/// Kafka backend. Clients are created from [`ClientConfig`] plus any extra
/// librdkafka properties set with [`KafkaBroker::with_property`].
#[derive(Debug, Clone, Default)]
pub struct KafkaBroker {
    extra: Arc<Vec<(String, String)>>,
}

impl KafkaBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a librdkafka property applied to every client, e.g. security settings.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.extra).push((key.into(), value.into()));
        self
    }

    fn client_config(&self, props: Vec<(&'static str, String)>) -> KafkaClientConfig {
        let mut client_config = KafkaClientConfig::new();
        for (key, value) in props {
            client_config.set(key, value);
        }
        for (key, value) in self.extra.iter() {
            client_config.set(key, value);
        }
        client_config
    }
}

fn client_error(client: &'static str) -> impl FnOnce(KafkaError) -> ConfigurationError {
    move |e| ConfigurationError::Client {
        client,
        reason: e.to_string(),
    }
}

impl Broker for KafkaBroker {
    type Admin = KafkaAdmin;
    type Producer = KafkaProducer;
    type Consumer = KafkaConsumer;

    fn name(&self) -> &'static str {
        "kafka"
    }

    fn admin(&self, config: &ClientConfig) -> Result<Self::Admin, ConfigurationError> {
        config.validate()?;
        let client: AdminClient<DefaultClientContext> = self
            .client_config(config.admin_properties())
            .create()
            .map_err(client_error("admin"))?;
        tracing::info!(brokers = %config.bootstrap_servers_string(), "kafka admin client created");
        Ok(KafkaAdmin {
            client,
            timeout: config.provisioning_timeout,
        })
    }

    fn producer(&self, config: &ClientConfig) -> Result<Self::Producer, ConfigurationError> {
        config.validate()?;
        let producer: FutureProducer = self
            .client_config(config.producer_properties())
            .create()
            .map_err(client_error("producer"))?;
        Ok(KafkaProducer {
            producer,
            message_timeout: config.message_timeout,
        })
    }

    fn consumer(&self, config: &ClientConfig) -> Result<Self::Consumer, ConfigurationError> {
        config.validate()?;
        let consumer: StreamConsumer = self
            .client_config(config.consumer_properties())
            .create()
            .map_err(client_error("consumer"))?;
        Ok(KafkaConsumer {
            consumer,
            subscribed: false,
        })
    }
}

/// Kafka admin client used for provisioning.
pub struct KafkaAdmin {
    client: AdminClient<DefaultClientContext>,
    timeout: Duration,
}

#[async_trait]
impl TopicAdmin for KafkaAdmin {
    async fn create_topic(&self, spec: &ChannelSpec) -> Result<TopicStatus, ProvisioningError> {
        let rejected = |reason: String| ProvisioningError::Rejected {
            channel: spec.channel,
            reason,
        };

        let partitions = i32::try_from(spec.partitions.get())
            .map_err(|_| rejected(format!("{} partitions is out of range", spec.partitions)))?;
        let topic = NewTopic::new(
            spec.wire_name(),
            partitions,
            TopicReplication::Fixed(i32::from(spec.replicas.get())),
        );
        let options = AdminOptions::new()
            .request_timeout(Some(self.timeout))
            .operation_timeout(Some(self.timeout));

        let results = self
            .client
            .create_topics(&[topic], &options)
            .await
            .map_err(|e| rejected(e.to_string()))?;

        match results.into_iter().next() {
            Some(Ok(_)) => Ok(TopicStatus::Created),
            Some(Err((_, RDKafkaErrorCode::TopicAlreadyExists))) => Ok(TopicStatus::AlreadyExists),
            Some(Err((name, code))) => Err(rejected(format!("{name}: {code}"))),
            None => Err(rejected("broker returned no result".to_string())),
        }
    }
}

/// Kafka producer with UTF-8 string payloads and no key.
pub struct KafkaProducer {
    producer: FutureProducer,
    message_timeout: Duration,
}

#[async_trait]
impl Producer for KafkaProducer {
    async fn send(&self, channel: Channel, payload: &str) -> PublishResult<RecordMetadata> {
        let record = FutureRecord::<(), str>::to(channel.wire_name()).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(self.message_timeout))
            .await
        {
            Ok((partition, offset)) => Ok(RecordMetadata {
                channel,
                partition,
                offset,
            }),
            Err((KafkaError::MessageProduction(code), _)) => Err(match code {
                RDKafkaErrorCode::MessageTimedOut => PublishError::Timeout {
                    channel,
                    timeout: self.message_timeout,
                },
                RDKafkaErrorCode::UnknownTopic | RDKafkaErrorCode::UnknownTopicOrPartition => {
                    PublishError::UnknownTopic(channel)
                }
                RDKafkaErrorCode::AllBrokersDown | RDKafkaErrorCode::BrokerTransportFailure => {
                    PublishError::Unreachable(code.to_string())
                }
                other => PublishError::Delivery {
                    channel,
                    reason: other.to_string(),
                },
            }),
            Err((e, _)) => Err(PublishError::Delivery {
                channel,
                reason: e.to_string(),
            }),
        }
    }

    async fn flush(&self, timeout: Duration) -> PublishResult<()> {
        // librdkafka's flush blocks the calling thread.
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| PublishError::Flush(e.to_string()))?
            .map_err(|e| PublishError::Flush(e.to_string()))
    }
}

/// Kafka consumer reading UTF-8 string payloads.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    subscribed: bool,
}

#[async_trait]
impl Consumer for KafkaConsumer {
    fn subscribe(&mut self, channels: &[Channel]) -> ConsumeResult<()> {
        if channels.is_empty() {
            self.consumer.unsubscribe();
            self.subscribed = false;
            return Ok(());
        }
        let topics: Vec<&str> = channels.iter().map(|c| c.wire_name()).collect();
        self.consumer
            .subscribe(&topics)
            .map_err(|e| ConsumeError::Connection(e.to_string()))?;
        self.subscribed = true;
        Ok(())
    }

    async fn recv(&mut self) -> ConsumeResult<ConsumedRecord> {
        if !self.subscribed {
            return Err(ConsumeError::NotSubscribed);
        }
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| ConsumeError::Connection(e.to_string()))?;

        let channel = Channel::from_wire_name(message.topic())?;
        let payload = match message.payload_view::<str>() {
            None => String::new(),
            Some(Ok(payload)) => payload.to_string(),
            Some(Err(e)) => {
                return Err(ConsumeError::Deserialization {
                    topic: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                    reason: e.to_string(),
                });
            }
        };

        Ok(ConsumedRecord {
            channel,
            payload,
            partition: message.partition(),
            offset: message.offset(),
            timestamp: message
                .timestamp()
                .to_millis()
                .and_then(DateTime::<Utc>::from_timestamp_millis),
        })
    }

    fn commit(&mut self, record: &ConsumedRecord) -> ConsumeResult<()> {
        let mut partitions = TopicPartitionList::new();
        partitions
            .add_partition_offset(record.topic(), record.partition, Offset::Offset(record.offset + 1))
            .map_err(|e| commit_error(record, e))?;
        self.consumer
            .commit(&partitions, CommitMode::Async)
            .map_err(|e| commit_error(record, e))
    }
}
