//! Equipment telemetry ingester.
//!
//! - Partitioned stream (Redpanda) or MQTT ingress
//! - Schema-kind projection into typed ClickHouse tables
//! - Per-partition checkpoints after every durable flush
//! - Minute-aligned downtime and energy aggregation
//! - Health and metrics over HTTP

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use validator::Validate;

use api::{router, AppState};
use clickhouse_client::{
    AggregationSettings, ClickHouseAggregations, ClickHouseCheckpointStore, ClickHouseClient,
    ClickHouseConfig, ClickHouseTelemetryStore,
};
use mqtt_client::{MqttConfig, PushSubscriber, RumqttcConnector};
use redpanda::{spawn_static_assignment, RedpandaConfig, RedpandaSource};
use telemetry::{health, init_tracing_from_env};
use worker::{
    AggregationJobs, DispatchHandler, Dispatcher, DowntimeScheduler, ErrorNotifier,
    NotificationConfig, Notifier, PartitionManager, PartitionSettings, PipelineContext,
    SchedulerConfig,
};

/// Ingress transport feeding the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Transport {
    #[default]
    Stream,
    Mqtt,
}

impl Transport {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Stream => "stream",
            Self::Mqtt => "mqtt",
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_environment")]
    environment: String,
    #[serde(default)]
    transport: Transport,

    #[serde(default)]
    redpanda: RedpandaConfig,
    #[serde(default)]
    mqtt: MqttConfig,
    #[serde(default)]
    clickhouse: ClickHouseConfig,
    #[serde(default)]
    scheduler: SchedulerConfig,
    #[serde(default)]
    notifications: NotificationConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            transport: Transport::default(),
            redpanda: RedpandaConfig::default(),
            mqtt: MqttConfig::default(),
            clickhouse: ClickHouseConfig::default(),
            scheduler: SchedulerConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Config {
    fn validate(&self) -> Result<()> {
        match self.transport {
            Transport::Stream => self.redpanda.validate().context("Invalid Redpanda config")?,
            Transport::Mqtt => self.mqtt.validate().context("Invalid MQTT config")?,
        }
        self.clickhouse.validate().context("Invalid ClickHouse config")?;
        self.scheduler.validate().context("Invalid scheduler config")?;
        self.notifications
            .validate()
            .context("Invalid notification config")?;
        Ok(())
    }

    fn aggregation_settings(&self) -> AggregationSettings {
        AggregationSettings {
            lookback_hours: self.scheduler.lookback_hours,
            line_min_downtime_minutes: self.scheduler.line_min_downtime_minutes,
            skew_minutes: self.scheduler.effective_skew_minutes(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23+ needs a process-wide crypto provider before any TLS use
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        bail!("Failed to install rustls crypto provider");
    }

    dotenvy::dotenv().ok();
    init_tracing_from_env();

    info!("Starting telemetry ingester v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config.validate()?;
    info!(
        environment = %config.environment,
        transport = config.transport.as_str(),
        scheduler = config.scheduler.enabled,
        line_check = config.scheduler.line_check,
        "Loaded configuration"
    );

    let clickhouse = ClickHouseClient::new(config.clickhouse.clone())
        .context("Failed to create ClickHouse client")?;
    health().clickhouse.track();

    if config.clickhouse.init_schema {
        if let Err(e) = clickhouse_client::init_schema(&clickhouse).await {
            // Tables may already exist under a restricted user
            error!("Failed to initialize ClickHouse schema: {}", e);
        }
    }
    clickhouse_client::health::check_connection(&clickhouse).await;

    let notifier: Arc<dyn Notifier> =
        Arc::new(ErrorNotifier::new(&config.notifications, &config.environment));
    let store = Arc::new(ClickHouseTelemetryStore::new(clickhouse.clone()));
    let dispatcher = Arc::new(Dispatcher::new(store));

    let cancel = CancellationToken::new();
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    match config.transport {
        Transport::Stream => {
            health().stream.track();
            let source = Arc::new(RedpandaSource::new(config.redpanda.clone()));
            if redpanda::health::check_connection(&config.redpanda).await {
                health().stream.set_healthy();
                info!("Redpanda connection: healthy");
                let missing =
                    redpanda::health::missing_topics(&config.redpanda, &[config.redpanda.topic.as_str()])
                        .await;
                if !missing.is_empty() {
                    warn!(topics = ?missing, "Topic not found, partition discovery will retry");
                }
            } else {
                health().stream.set_unhealthy("Connection failed");
                warn!("Redpanda connection: unhealthy, partitions will retry");
            }

            let ctx = PipelineContext {
                source: source.clone(),
                checkpoints: Arc::new(ClickHouseCheckpointStore::new(clickhouse.clone())),
                dispatcher: dispatcher.clone(),
                notifier: notifier.clone(),
                settings: PartitionSettings::from_config(&config.redpanda),
            };
            let assignments = spawn_static_assignment(source, cancel.clone());
            let manager = PartitionManager::new(ctx);
            tasks.push(tokio::spawn(manager.run(assignments, cancel.clone())));
        }
        Transport::Mqtt => {
            health().broker.track();
            let connector = Arc::new(RumqttcConnector::new(config.mqtt.clone()));
            let handler = Arc::new(DispatchHandler::new(dispatcher.clone(), notifier.clone()));
            let subscriber = PushSubscriber::new(connector, handler, config.mqtt.poll_interval());
            tasks.push(tokio::spawn(subscriber.run(cancel.clone())));
        }
    }

    if config.scheduler.enabled {
        let aggregations = Arc::new(ClickHouseAggregations::new(
            clickhouse.clone(),
            config.aggregation_settings(),
        ));
        let jobs = AggregationJobs {
            downtime: aggregations.clone(),
            energy: aggregations.clone(),
            line_downtime: aggregations,
        };
        let scheduler = DowntimeScheduler::new(config.scheduler.clone(), jobs, notifier.clone());
        tasks.push(tokio::spawn(scheduler.run(cancel.clone())));
    } else {
        info!("Downtime scheduler disabled");
    }

    let app = router(AppState::new(&config.environment, config.transport.as_str()));
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    info!("Shutting down...");
    cancel.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            error!("Task ended abnormally: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from defaults, file and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("INGESTION")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Flat overrides: nested parsing is unreliable for underscored field names
    if let Ok(brokers) = std::env::var("INGESTION_REDPANDA_BROKERS") {
        config.redpanda.brokers = brokers.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Ok(username) = std::env::var("INGESTION_REDPANDA_SASL_USERNAME") {
        config.redpanda.sasl_username = Some(username);
    }
    if let Ok(password) = std::env::var("INGESTION_REDPANDA_SASL_PASSWORD") {
        config.redpanda.sasl_password = Some(password);
    }
    if let Ok(topic) = std::env::var("INGESTION_REDPANDA_TOPIC") {
        config.redpanda.topic = topic;
    }
    if let Ok(group) = std::env::var("INGESTION_REDPANDA_CONSUMER_GROUP") {
        config.redpanda.consumer_group = group;
    }

    if let Ok(host) = std::env::var("INGESTION_MQTT_HOST") {
        config.mqtt.host = host;
    }
    if let Ok(username) = std::env::var("INGESTION_MQTT_USERNAME") {
        config.mqtt.username = Some(username);
    }
    if let Ok(password) = std::env::var("INGESTION_MQTT_PASSWORD") {
        config.mqtt.password = Some(password);
    }
    if let Ok(topic) = std::env::var("INGESTION_MQTT_TOPIC") {
        config.mqtt.topic = topic;
    }

    if let Ok(url) = std::env::var("INGESTION_CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Ok(database) = std::env::var("INGESTION_CLICKHOUSE_DATABASE") {
        config.clickhouse.database = database;
    }
    if let Ok(username) = std::env::var("INGESTION_CLICKHOUSE_USERNAME") {
        config.clickhouse.username = Some(username);
    }
    if let Ok(password) = std::env::var("INGESTION_CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }

    if let Ok(url) = std::env::var("INGESTION_NOTIFICATIONS_WEBHOOK_URL") {
        config.notifications.webhook_url = Some(url);
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
