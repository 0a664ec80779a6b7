//! Kafka integration tests
//!
//! These tests share one Kafka container. Run with:
//!
//! ```bash
//! cargo test -p messaging --features kafka --test kafka_integration -- --test-threads=1
//! ```
#![cfg(feature = "kafka")]

use std::sync::Arc;
use std::time::Duration;

use messaging::{
    Channel, ClientConfig, ConsumerFactory, KafkaBroker, OffsetReset, ProducerFactory,
    ProvisioningError, TopicStatus, build_provisioner,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Kafka>,
    bootstrap_servers: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Kafka::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(KAFKA_PORT).await.unwrap();

            Arc::new(ContainerInfo {
                container,
                bootstrap_servers: format!("{host}:{port}"),
            })
        })
        .await
        .clone()
}

/// Config with a fresh consumer group so tests never share offsets.
async fn fresh_config() -> Arc<ClientConfig> {
    let info = get_container_info().await;
    Arc::new(ClientConfig {
        auto_offset_reset: OffsetReset::Earliest,
        provisioning_timeout: Duration::from_secs(20),
        message_timeout: Duration::from_secs(20),
        ..ClientConfig::new(info.bootstrap_servers.clone(), format!("test-{}", Uuid::new_v4()))
    })
}

#[tokio::test]
async fn provisioning_is_idempotent() {
    let config = fresh_config().await;
    let broker = KafkaBroker::new();
    let provisioner = build_provisioner(&broker, &config).unwrap();

    provisioner.ensure_topology().await.unwrap();
    let report = provisioner.ensure_topology().await.unwrap();

    assert_eq!(report.existing().count(), Channel::ALL.len());
    assert_eq!(
        provisioner
            .ensure_channel(&Channel::NotifyEnding.spec())
            .await
            .unwrap(),
        TopicStatus::AlreadyExists
    );
}

#[tokio::test]
async fn published_record_reaches_fresh_group() {
    let config = fresh_config().await;
    let broker = KafkaBroker::new();
    build_provisioner(&broker, &config)
        .unwrap()
        .ensure_topology()
        .await
        .unwrap();

    let publisher = ProducerFactory::new(broker.clone(), config.clone())
        .build_publisher()
        .unwrap();
    let payload = format!("p1-{}", Uuid::new_v4());
    publisher
        .publish(Channel::ProductValidationSuccess, &payload)
        .await
        .unwrap();

    let mut consumer = ConsumerFactory::new(broker, config)
        .build_consumer()
        .unwrap();
    consumer
        .subscribe(&[Channel::ProductValidationSuccess])
        .unwrap();

    let record = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let record = consumer.recv().await.unwrap();
            if record.payload == payload {
                return record;
            }
        }
    })
    .await
    .expect("record not delivered");

    assert_eq!(record.topic(), "product-validation-success");
    publisher.flush(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn unreachable_broker_fails_within_timeout() {
    let config = ClientConfig {
        provisioning_timeout: Duration::from_millis(500),
        ..ClientConfig::new("127.0.0.1:1", "unreachable")
    };
    let provisioner = build_provisioner(&KafkaBroker::new(), &config).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), provisioner.ensure_topology())
        .await
        .expect("provisioning must not hang");
    assert!(matches!(result, Err(ProvisioningError::Partial { .. })));
}
