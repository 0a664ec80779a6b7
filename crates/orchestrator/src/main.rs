//! Orchestrator entry point.

use std::process::ExitCode;
use std::time::Duration;

use messaging::Broker;
use orchestrator::{Config, Messaging, StartupError};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Runs the orchestrator until a shutdown signal arrives.
///
/// Returns whether the producer drained cleanly on shutdown.
async fn run<B: Broker>(broker: B, config: Config) -> Result<bool, StartupError> {
    let messaging: Messaging<B> = orchestrator::start(broker, config.client).await?;
    tracing::info!(
        group_id = %messaging.consumers.group_id(),
        "orchestrator ready"
    );

    shutdown_signal().await;

    // A failed flush is logged by shutdown.
    Ok(messaging.shutdown(SHUTDOWN_FLUSH_TIMEOUT).await.is_ok())
}

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // 2. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 3. Install Prometheus exporter
    let metrics_addr = config.metrics_addr();
    match metrics_addr.parse::<std::net::SocketAddr>() {
        Ok(addr) => {
            if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
            {
                tracing::warn!(error = %e, "metrics exporter not installed");
            }
        }
        Err(e) => tracing::warn!(%metrics_addr, error = %e, "invalid metrics address"),
    }

    // 4. Provision and serve
    #[cfg(feature = "kafka")]
    let result = run(messaging::KafkaBroker::new(), config).await;

    #[cfg(not(feature = "kafka"))]
    let result = {
        tracing::warn!("built without the kafka feature, using the in-memory broker");
        run(messaging::InMemoryBroker::new(), config).await
    };

    match result {
        Ok(true) => {
            tracing::info!("orchestrator shut down gracefully");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            tracing::error!("in-flight events were not delivered before exit");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "orchestrator failed to start");
            ExitCode::FAILURE
        }
    }
}
