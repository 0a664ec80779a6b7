use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use topology::{Channel, ChannelSpec};

use crate::client::{
    Broker, ConsumedRecord, Consumer, Producer, RecordMetadata, TopicAdmin, TopicStatus,
    commit_error,
};
use crate::config::{ClientConfig, OffsetReset};
use crate::error::{
    ConfigurationError, ConsumeError, ConsumeResult, ProvisioningError, PublishError, PublishResult,
};

/// In-memory broker for tests and local runs.
///
/// Models the parts of a Kafka cluster the saga backbone relies on: one
/// append-only log per partition, committed offsets per consumer group,
/// single-owner partition assignment inside a group and the offset-reset
/// policy. Clones share the same cluster state.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<ClusterState>,
    /// Woken on every append, topic creation, partition release and
    /// reachability change.
    activity: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct ClusterState {
    topics: HashMap<Channel, TopicLog>,
    groups: HashMap<String, GroupState>,
    unreachable: bool,
    next_member: u64,
}

struct TopicLog {
    partitions: Vec<Vec<StoredRecord>>,
    next_partition: usize,
}

struct StoredRecord {
    payload: String,
    timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct GroupState {
    committed: HashMap<(Channel, i32), i64>,
    owners: HashMap<(Channel, i32), u64>,
}

impl InMemoryBroker {
    /// Creates an empty broker with no topics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a network partition between clients and the broker.
    ///
    /// While unreachable, topic creation blocks, publishes fail with
    /// [`PublishError::Unreachable`] and polls fail with
    /// [`ConsumeError::Connection`].
    pub fn set_unreachable(&self, unreachable: bool) {
        self.shared.lock().unreachable = unreachable;
        self.shared.activity.notify_waiters();
    }

    /// Returns true if the channel's topic has been created.
    pub fn topic_exists(&self, channel: Channel) -> bool {
        self.shared.lock().topics.contains_key(&channel)
    }

    /// Returns the number of topics that exist.
    pub fn topic_count(&self) -> usize {
        self.shared.lock().topics.len()
    }

    /// Returns the partition count of a channel's topic.
    pub fn partition_count(&self, channel: Channel) -> Option<usize> {
        self.shared
            .lock()
            .topics
            .get(&channel)
            .map(|log| log.partitions.len())
    }

    /// Returns every payload stored for a channel, partition by partition.
    pub fn payloads(&self, channel: Channel) -> Vec<String> {
        self.shared
            .lock()
            .topics
            .get(&channel)
            .map(|log| {
                log.partitions
                    .iter()
                    .flatten()
                    .map(|record| record.payload.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the committed offset of `group` for a partition, if any.
    pub fn committed_offset(&self, group: &str, channel: Channel, partition: i32) -> Option<i64> {
        self.shared
            .lock()
            .groups
            .get(group)
            .and_then(|g| g.committed.get(&(channel, partition)).copied())
    }
}

impl Broker for InMemoryBroker {
    type Admin = InMemoryAdmin;
    type Producer = InMemoryProducer;
    type Consumer = InMemoryConsumer;

    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn admin(&self, config: &ClientConfig) -> Result<Self::Admin, ConfigurationError> {
        config.validate()?;
        Ok(InMemoryAdmin {
            shared: Arc::clone(&self.shared),
        })
    }

    fn producer(&self, config: &ClientConfig) -> Result<Self::Producer, ConfigurationError> {
        config.validate()?;
        Ok(InMemoryProducer {
            shared: Arc::clone(&self.shared),
        })
    }

    fn consumer(&self, config: &ClientConfig) -> Result<Self::Consumer, ConfigurationError> {
        config.validate()?;
        let member = {
            let mut state = self.shared.lock();
            state.next_member += 1;
            state.next_member
        };
        Ok(InMemoryConsumer {
            shared: Arc::clone(&self.shared),
            group: config.group_id.clone(),
            member,
            reset: config.auto_offset_reset,
            auto_commit: config.enable_auto_commit,
            subscription: Vec::new(),
            positions: BTreeMap::new(),
            last_served: None,
        })
    }
}

/// Admin client of an [`InMemoryBroker`].
pub struct InMemoryAdmin {
    shared: Arc<Shared>,
}

#[async_trait]
impl TopicAdmin for InMemoryAdmin {
    async fn create_topic(&self, spec: &ChannelSpec) -> Result<TopicStatus, ProvisioningError> {
        let partitions =
            usize::try_from(spec.partitions.get()).map_err(|_| ProvisioningError::Rejected {
                channel: spec.channel,
                reason: format!("{} partitions is not supported", spec.partitions),
            })?;
        if i32::try_from(partitions).is_err() {
            return Err(ProvisioningError::Rejected {
                channel: spec.channel,
                reason: format!("{partitions} partitions exceeds the broker limit"),
            });
        }

        loop {
            let notified = self.shared.activity.notified();
            {
                let mut state = self.shared.lock();
                if !state.unreachable {
                    if state.topics.contains_key(&spec.channel) {
                        return Ok(TopicStatus::AlreadyExists);
                    }
                    state.topics.insert(
                        spec.channel,
                        TopicLog {
                            partitions: (0..partitions).map(|_| Vec::new()).collect(),
                            next_partition: 0,
                        },
                    );
                    drop(state);
                    self.shared.activity.notify_waiters();
                    return Ok(TopicStatus::Created);
                }
            }
            // An unreachable broker never answers; the caller's timeout decides.
            notified.await;
        }
    }
}

/// Producer client of an [`InMemoryBroker`].
pub struct InMemoryProducer {
    shared: Arc<Shared>,
}

#[async_trait]
impl Producer for InMemoryProducer {
    async fn send(&self, channel: Channel, payload: &str) -> PublishResult<RecordMetadata> {
        let metadata = {
            let mut state = self.shared.lock();
            if state.unreachable {
                return Err(PublishError::Unreachable(
                    "in-memory broker is unreachable".to_string(),
                ));
            }
            let log = state
                .topics
                .get_mut(&channel)
                .ok_or(PublishError::UnknownTopic(channel))?;

            // Records without a key are spread round-robin.
            let partition = log.next_partition % log.partitions.len();
            log.next_partition = log.next_partition.wrapping_add(1);
            let records = &mut log.partitions[partition];
            records.push(StoredRecord {
                payload: payload.to_string(),
                timestamp: Utc::now(),
            });

            RecordMetadata {
                channel,
                partition: partition as i32,
                offset: records.len() as i64 - 1,
            }
        };
        self.shared.activity.notify_waiters();
        Ok(metadata)
    }

    async fn flush(&self, _timeout: Duration) -> PublishResult<()> {
        // Sends are acknowledged synchronously, so nothing is ever in flight.
        if self.shared.lock().unreachable {
            return Err(PublishError::Unreachable(
                "in-memory broker is unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

/// Consumer client of an [`InMemoryBroker`].
///
/// Each partition of a subscribed channel is owned by at most one member of
/// the group at a time. Ownership is claimed lazily on poll and released when
/// the consumer is dropped or unsubscribes, at which point another member
/// resumes from the group's committed offset.
pub struct InMemoryConsumer {
    shared: Arc<Shared>,
    group: String,
    member: u64,
    reset: OffsetReset,
    auto_commit: bool,
    subscription: Vec<Channel>,
    positions: BTreeMap<(Channel, i32), i64>,
    last_served: Option<(Channel, i32)>,
}

impl InMemoryConsumer {
    /// Returns the consumer group this member belongs to.
    pub fn group_id(&self) -> &str {
        &self.group
    }

    fn poll_once(&mut self) -> ConsumeResult<Option<ConsumedRecord>> {
        let mut guard = self.shared.lock();
        if guard.unreachable {
            return Err(ConsumeError::Connection(
                "in-memory broker is unreachable".to_string(),
            ));
        }

        let state = &mut *guard;
        let group = state.groups.entry(self.group.clone()).or_default();
        let reset = self.reset;

        let keys: Vec<(Channel, i32)> = self
            .subscription
            .iter()
            .filter_map(|channel| {
                state
                    .topics
                    .get(channel)
                    .map(|log| (*channel, log.partitions.len()))
            })
            .flat_map(|(channel, count)| (0..count).map(move |index| (channel, index as i32)))
            .collect();
        // Round-robin from the partition after the last one served.
        let start = self
            .last_served
            .and_then(|last| keys.iter().position(|key| *key == last))
            .map_or(0, |index| index + 1);

        for key in keys.iter().cycle().skip(start).take(keys.len()).copied() {
            let Some(records) = state
                .topics
                .get(&key.0)
                .and_then(|log| log.partitions.get(key.1 as usize))
            else {
                continue;
            };
            let owner = *group.owners.entry(key).or_insert(self.member);
            if owner != self.member {
                continue;
            }

            let end = records.len() as i64;
            let position = *self.positions.entry(key).or_insert_with(|| {
                group.committed.get(&key).copied().unwrap_or(match reset {
                    OffsetReset::Earliest => 0,
                    OffsetReset::Latest => end,
                })
            });
            if position >= end {
                continue;
            }

            let stored = &records[position as usize];
            self.positions.insert(key, position + 1);
            self.last_served = Some(key);
            if self.auto_commit {
                group.committed.insert(key, position + 1);
            }
            return Ok(Some(ConsumedRecord {
                channel: key.0,
                payload: stored.payload.clone(),
                partition: key.1,
                offset: position,
                timestamp: Some(stored.timestamp),
            }));
        }
        Ok(None)
    }

    fn release(&mut self, keep: &[Channel]) {
        {
            let mut state = self.shared.lock();
            if let Some(group) = state.groups.get_mut(&self.group) {
                group
                    .owners
                    .retain(|(channel, _), owner| *owner != self.member || keep.contains(channel));
            }
        }
        self.positions
            .retain(|(channel, _), _| keep.contains(channel));
        self.shared.activity.notify_waiters();
    }
}

#[async_trait]
impl Consumer for InMemoryConsumer {
    fn subscribe(&mut self, channels: &[Channel]) -> ConsumeResult<()> {
        let mut subscription = channels.to_vec();
        subscription.sort();
        subscription.dedup();
        self.release(&subscription);
        self.subscription = subscription;
        Ok(())
    }

    async fn recv(&mut self) -> ConsumeResult<ConsumedRecord> {
        if self.subscription.is_empty() {
            return Err(ConsumeError::NotSubscribed);
        }
        let shared = Arc::clone(&self.shared);
        loop {
            let notified = shared.activity.notified();
            if let Some(record) = self.poll_once()? {
                return Ok(record);
            }
            notified.await;
        }
    }

    fn commit(&mut self, record: &ConsumedRecord) -> ConsumeResult<()> {
        let mut state = self.shared.lock();
        if state.unreachable {
            return Err(commit_error(record, "in-memory broker is unreachable"));
        }
        state
            .groups
            .entry(self.group.clone())
            .or_default()
            .committed
            .insert((record.channel, record.partition), record.offset + 1);
        Ok(())
    }
}

impl Drop for InMemoryConsumer {
    fn drop(&mut self) {
        self.release(&[]);
    }
}
