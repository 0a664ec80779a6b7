use std::time::Duration;

use messaging::{
    Channel, ClientConfig, ConfigurationError, InMemoryBroker, OffsetReset, ProvisioningError,
    PublishError, TopicStatus,
};
use orchestrator::{StartupError, start};

fn test_config() -> ClientConfig {
    ClientConfig {
        auto_offset_reset: OffsetReset::Earliest,
        provisioning_timeout: Duration::from_millis(200),
        ..ClientConfig::new("in-memory:0", "orchestrator-test")
    }
}

#[tokio::test]
async fn test_start_provisions_every_channel() {
    let broker = InMemoryBroker::new();
    let messaging = start(broker.clone(), test_config()).await.unwrap();

    assert_eq!(messaging.report.outcomes.len(), Channel::ALL.len());
    assert_eq!(messaging.report.created().count(), Channel::ALL.len());
    for channel in Channel::ALL {
        assert!(broker.topic_exists(channel), "{channel} not provisioned");
    }
    assert_eq!(messaging.config().group_id, "orchestrator-test");
}

#[tokio::test]
async fn test_restart_finds_existing_topology() {
    let broker = InMemoryBroker::new();
    start(broker.clone(), test_config()).await.unwrap();

    let restarted = start(broker.clone(), test_config()).await.unwrap();
    assert!(
        restarted
            .report
            .outcomes
            .iter()
            .all(|(_, status)| *status == TopicStatus::AlreadyExists)
    );
    assert_eq!(broker.topic_count(), Channel::ALL.len());
}

#[tokio::test]
async fn test_started_handles_move_events() {
    let messaging = start(InMemoryBroker::new(), test_config()).await.unwrap();

    let mut consumer = messaging.consumers.build_consumer().unwrap();
    consumer.subscribe(&[Channel::InventorySuccess]).unwrap();

    messaging
        .publisher
        .publish(Channel::InventorySuccess, r#"{"sagaId":"s-1"}"#)
        .await
        .unwrap();

    let record = tokio::time::timeout(Duration::from_secs(1), consumer.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.channel, Channel::InventorySuccess);
    assert_eq!(record.payload, r#"{"sagaId":"s-1"}"#);

    messaging.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_shutdown_reports_failed_flush() {
    let broker = InMemoryBroker::new();
    let messaging = start(broker.clone(), test_config()).await.unwrap();

    broker.set_unreachable(true);
    let result = messaging.shutdown(Duration::from_millis(100)).await;

    assert!(matches!(result, Err(PublishError::Unreachable(_))));
}

#[tokio::test]
async fn test_unreachable_broker_fails_startup() {
    let broker = InMemoryBroker::new();
    broker.set_unreachable(true);

    let started = tokio::time::Instant::now();
    let result = start(broker, test_config()).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    match result {
        Err(StartupError::Provisioning(ProvisioningError::Partial {
            failed,
            provisioned,
            source,
            ..
        })) => {
            assert_eq!(failed, Channel::ALL[0]);
            assert!(provisioned.is_empty());
            assert!(matches!(*source, ProvisioningError::Timeout { .. }));
        }
        Err(other) => panic!("expected a provisioning failure, got {other:?}"),
        Ok(_) => panic!("startup succeeded against an unreachable broker"),
    }
}

#[tokio::test]
async fn test_invalid_config_fails_before_provisioning() {
    let broker = InMemoryBroker::new();
    let config = ClientConfig {
        bootstrap_servers: Vec::new(),
        ..test_config()
    };

    let result = start(broker.clone(), config).await;

    assert!(matches!(
        result,
        Err(StartupError::Configuration(
            ConfigurationError::NoBootstrapServers
        ))
    ));
    assert_eq!(broker.topic_count(), 0);
}
