//! Payment service entry point.

use std::sync::Arc;

use app::{BookingEventConsumer, Config, PaymentService};
use bus::{EnvelopeHandler, EventConsumer, InMemoryEventBus};
use domain::events::TOPIC_BOOKING_EVENTS;
use gateway::MockGateway;
use saga::EscrowSagaService;
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryPaymentStore, PaymentStore, PostgresPaymentStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
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

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        platform_fee_percent = config.platform_fee_percent,
        "starting payment-service"
    );

    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(&url)
                .await
                .expect("failed to connect to database");

            let store = PostgresPaymentStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run database migrations");
            tracing::info!("database migrations completed");

            run(Arc::new(store), config).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory payment store");
            run(Arc::new(InMemoryPaymentStore::new()), config).await;
        }
    }

    tracing::info!("payment-service stopped");
}

async fn run<S: PaymentStore + 'static>(store: Arc<S>, config: Config) {
    // Real gateway and broker adapters are injected at deployment;
    // this build wires the development implementations.
    if config.gateway_secret_key.is_some() {
        tracing::warn!("gateway credentials configured, but this build wires the mock gateway");
    }
    let gateway = Arc::new(MockGateway::new());
    let bus = InMemoryEventBus::new();

    let sagas = EscrowSagaService::new(
        Arc::clone(&store),
        gateway,
        Arc::new(bus.clone()),
        config.platform_fee_percent,
    );
    let service = Arc::new(PaymentService::new(store, sagas));
    let consumer: Arc<dyn EnvelopeHandler> = Arc::new(BookingEventConsumer::new(service));

    let topic = config.topic(TOPIC_BOOKING_EVENTS);
    let group = config.consumer_group();
    tracing::info!(
        %topic,
        %group,
        brokers = ?config.kafka_brokers,
        "starting booking event consumer"
    );

    tokio::select! {
        result = bus.consume(&topic, &group, consumer) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "booking event consumer failed");
            }
        }
        () = shutdown_signal() => {}
    }
}
