// Main entry point - Dependency injection and stage startup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::net::SocketAddr;
use std::pin::pin;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use futures::Stream;
use tracing::info;

use crate::application::distance_calculator::DistanceService;
use crate::application::distance_relay::DistanceRelay;
use crate::application::drop_counters::DropCounters;
use crate::application::ingest_service::IngestService;
use crate::application::instrumentation::Instrumented;
use crate::application::invoice_aggregator::InvoiceService;
use crate::application::reading_publisher::ReadingPublisher;
use crate::application::stream_processor::StreamProcessor;
use crate::infrastructure::aggregator_client::AggregatorClient;
use crate::infrastructure::config::{BrokerKind, Role, Settings, load_settings};
use crate::infrastructure::memory_broker::MemoryBroker;
use crate::infrastructure::nats_broker::NatsBroker;
use crate::infrastructure::telemetry::init_tracing;
use crate::presentation::app_state::{AggregatorState, GatewayState};
use crate::presentation::routes::{aggregator_router, gateway_router, metrics_router};

const MEMORY_BROKER_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = load_settings()?;
    info!(role = ?settings.role, broker = ?settings.broker.kind, "Starting toll pipeline");

    match settings.role {
        Role::Gateway => {
            let broker = connect_nats(&settings).await?;
            run_gateway(&settings, Arc::new(broker)).await
        }
        Role::Calculator => {
            let broker = connect_nats(&settings).await?;
            let consumer = broker
                .pull_consumer(&settings.broker.consumer, settings.broker.ack_wait())
                .await?;
            let payloads = NatsBroker::payloads(
                consumer,
                settings.broker.batch_size,
                settings.broker.max_wait(),
            );
            run_calculator(&settings, payloads).await
        }
        Role::Aggregator => run_aggregator(&settings).await,
        Role::All => run_all(&settings).await,
    }
}

async fn connect_nats(settings: &Settings) -> anyhow::Result<NatsBroker> {
    let broker = NatsBroker::connect(&settings.broker).await?;
    broker.ensure_stream().await?;
    Ok(broker)
}

async fn run_gateway(
    settings: &Settings,
    publisher: Arc<dyn ReadingPublisher>,
) -> anyhow::Result<()> {
    let publisher: Arc<dyn ReadingPublisher> = Arc::new(Instrumented::new("gateway", publisher));
    let ingest = IngestService::new(
        publisher,
        Arc::new(DropCounters::new()),
        settings.gateway.publish_timeout(),
    );

    serve(
        "gateway",
        settings.gateway.listen_addr,
        gateway_router(GatewayState::new(ingest)),
    )
    .await
}

async fn run_calculator<S>(settings: &Settings, payloads: S) -> anyhow::Result<()>
where
    S: Stream<Item = bytes::Bytes> + Send,
{
    let relay: Arc<dyn DistanceRelay> = Arc::new(Instrumented::new(
        "calculator",
        AggregatorClient::new(settings.calculator.aggregator_endpoint.clone()),
    ));
    let counters = Arc::new(DropCounters::new());
    let processor = StreamProcessor::new(
        Arc::new(Instrumented::new("calculator", DistanceService::new())),
        relay,
        counters.clone(),
        settings.calculator.relay_timeout(),
    );

    let payloads = pin!(payloads);
    tokio::select! {
        _ = processor.run(payloads) => Ok(()),
        result = serve("calculator", settings.calculator.listen_addr, metrics_router(counters)) => result,
    }
}

async fn run_aggregator(settings: &Settings) -> anyhow::Result<()> {
    info!(rate = settings.aggregator.rate, "Invoice aggregator rate");
    let aggregator = Instrumented::new("aggregator", InvoiceService::new(settings.aggregator.rate));

    serve(
        "aggregator",
        settings.aggregator.listen_addr,
        aggregator_router(AggregatorState::new(Arc::new(aggregator))),
    )
    .await
}

/// Every stage in one process. The calculator still relays to the
/// aggregator over HTTP so the stages keep their production boundaries.
async fn run_all(settings: &Settings) -> anyhow::Result<()> {
    match settings.broker.kind {
        BrokerKind::Memory => {
            let (broker, payloads) = MemoryBroker::channel(MEMORY_BROKER_CAPACITY);
            tokio::try_join!(
                run_aggregator(settings),
                run_gateway(settings, Arc::new(broker)),
                run_calculator(settings, payloads),
            )?;
        }
        BrokerKind::Nats => {
            let broker = connect_nats(settings).await?;
            let consumer = broker
                .pull_consumer(&settings.broker.consumer, settings.broker.ack_wait())
                .await?;
            let payloads = NatsBroker::payloads(
                consumer,
                settings.broker.batch_size,
                settings.broker.max_wait(),
            );
            tokio::try_join!(
                run_aggregator(settings),
                run_gateway(settings, Arc::new(broker)),
                run_calculator(settings, payloads),
            )?;
        }
    }
    Ok(())
}

async fn serve(stage: &'static str, addr: SocketAddr, router: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {} listener on {}", stage, addr))?;
    info!(stage, %addr, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| format!("{} server failed", stage))?;

    info!(stage, "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
