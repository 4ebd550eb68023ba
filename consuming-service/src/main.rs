use std::future::ready;
use std::sync::Arc;

use axum::{routing::get, Router};
use common_metrics::{serve, setup_metrics_routes};
use consuming_core::BrokerClient;
use consuming_kafka::{ListenerSlot, RdKafkaBrokerClient};
use envconfig::Envconfig;
use health::HealthRegistry;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod config;
mod dispatcher;
mod error;

use config::Config;
use dispatcher::LoggingDispatcher;
use error::ServiceError;

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy()
            .add_directive("rdkafka=warn".parse().unwrap()),
    );
    tracing_subscriber::registry().with(log_layer).init();
}

pub async fn index() -> &'static str {
    "consuming service"
}

#[tokio::main]
pub async fn main() -> Result<(), anyhow::Error> {
    setup_tracing();
    info!("Starting consuming service...");

    let config = Config::init_from_env()?;
    let core_config = config.core_config().map_err(ServiceError::Config)?;

    let health_registry = HealthRegistry::new("liveness");
    let consumer_health = health_registry
        .register("consumer".to_string(), std::time::Duration::from_secs(30))
        .await;

    let bind = format!("{}:{}", config.bind_host, config.bind_port);
    let health_router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route(
            "/_liveness",
            get(move || ready(health_registry.get_status())),
        );
    let health_router = setup_metrics_routes(health_router);

    tokio::task::spawn(async move {
        serve(health_router, &bind)
            .await
            .expect("failed to start health server");
    });

    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl+c");
        info!("Shutdown signal received");
        shutdown_cancel.cancel();
    });

    let dispatcher = Arc::new(LoggingDispatcher);
    let listener_slot = ListenerSlot::new();
    let broker = Arc::new(
        RdKafkaBrokerClient::new(&config.kafka, &config.consumer, listener_slot.clone())
            .map_err(ServiceError::Broker)?,
    );

    let (registry, coordinator) =
        consuming_core::build(core_config, dispatcher, broker.clone(), cancel.clone());
    listener_slot.set(registry);

    tokio::spawn(async move {
        loop {
            consumer_health.report_healthy().await;
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        }
    });

    let outcome = coordinator.run().await;
    info!(?outcome, "coordinator stopped");
    broker.close().await;

    info!("Consuming service shut down");
    Ok(())
}
