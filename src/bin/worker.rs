// src/bin/worker.rs

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use QuizForge::broker::{ConnectionManager, ConsumerConfig, RequestConsumer, ResponseProducer};
use QuizForge::config::{worker::Args, Settings};
use QuizForge::error::Result;
use QuizForge::generator::{GeneratorConfig, TestGenerator};
use QuizForge::llm::AnthropicBackend;
use QuizForge::server::run_status_server;
use QuizForge::store::S3ObjectStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")); // Default to info if RUST_LOG is not set
    fmt::Subscriber::builder().with_env_filter(filter).init();

    let mut settings = Settings::from_env()?;
    if let Some(port) = args.status_port {
        settings.status_port = port;
    }
    settings.validate()?;

    if args.validate_config {
        info!("Configuration is valid.");
        return Ok(());
    }

    info!("Worker starting.");
    info!(
        "Consuming from queue '{}' (exchange '{}', routing key '{}'), replies to '{}' @ {}",
        settings.broker.queue,
        settings.broker.exchange,
        settings.broker.routing_key,
        settings.broker.response_queue,
        settings.broker.host,
    );
    info!("Prefetch count: {}", settings.broker.prefetch_count);

    // Separate broker connections for consuming and publishing, so a stalled
    // publish never backs up delivery flow.
    let consumer_manager = Arc::new(ConnectionManager::new(settings.broker.amqp_url()));
    let producer_manager = Arc::new(ConnectionManager::new(settings.broker.amqp_url()));

    let store = Arc::new(S3ObjectStore::connect(&settings.store).await);
    let backend = Arc::new(AnthropicBackend::new(&settings.generation));
    let producer = Arc::new(ResponseProducer::new(producer_manager));

    let generator = Arc::new(TestGenerator::new(
        store,
        backend,
        producer.clone(),
        GeneratorConfig::from_settings(&settings),
    ));

    let consumer = RequestConsumer::new(
        consumer_manager.clone(),
        ConsumerConfig::from_settings(&settings.broker, settings.max_concurrent_jobs),
    );
    consumer.start(Some(generator)).await;

    run_status_server(settings.status_port, consumer_manager);

    info!("Worker running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, stopping worker...");
    consumer.stop().await;
    producer.close().await;
    info!("Worker stopped.");

    Ok(())
}
