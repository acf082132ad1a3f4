// src/bin/requester.rs

//! # Requester Binary
//!
//! Small operational client for the QuizForge worker. It publishes a single
//! test generation request to the request exchange, then waits on the
//! response queue until a reply arrives and prints it as pretty JSON.
//! Useful for smoke-testing a deployment end to end without the upstream
//! service that normally submits requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use clap::Parser;
use futures::StreamExt;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, QueueDeclareOptions},
    types::FieldTable,
    ExchangeKind,
};
use rand::Rng;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use QuizForge::broker::{ConnectionManager, ResponseProducer};
use QuizForge::config::{requester::Args, BrokerSettings};
use QuizForge::data_model::TestRequest;
use QuizForge::error::{Result, WorkerError};

/// Spinner for the wait on the response queue; the reply count is unknown
/// ahead of time so a bar makes no sense here.
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(filter).init();

    let broker = BrokerSettings::from_env()?;
    broker.validate()?;

    let test_id = args
        .test_id
        .clone()
        .unwrap_or_else(|| format!("req-{:08x}", rand::thread_rng().gen::<u32>()));

    let request = TestRequest {
        file_name: args.file_name.clone(),
        test_id: test_id.clone(),
        start_page: args.start_page,
        end_page: args.end_page,
        question_count: args.question_count,
    };
    request.validate()?;

    info!(
        "Requesting {} question(s) for '{}' (pages {}-{}), test id '{}'",
        request.question_count,
        request.file_name,
        request.start_page,
        request.end_page,
        test_id
    );

    let manager = Arc::new(ConnectionManager::new(broker.amqp_url()));
    let producer = ResponseProducer::new(manager.clone());

    let payload = serde_json::to_string(&request)?;
    producer
        .send(
            &broker.exchange,
            &broker.routing_key,
            &payload,
            ExchangeKind::Direct,
        )
        .await?;
    info!(
        "Request published to exchange '{}' with routing key '{}'",
        broker.exchange, broker.routing_key
    );

    // Reuse the producer's channel to wait for the reply. The response queue
    // is declared durable on both sides so either process may start first.
    let channel = manager.connect().await?.channel;
    channel
        .queue_declare(
            &broker.response_queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    let consumer_tag = format!("requester-{}-{}", std::process::id(), Utc::now().timestamp());
    let mut consumer = channel
        .basic_consume(
            &broker.response_queue,
            &consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let spinner = create_spinner(&format!(
        "Waiting for response on '{}'...",
        broker.response_queue
    ));
    let wait_start = Instant::now();

    let delivery = match tokio::time::timeout(
        Duration::from_secs(args.timeout_secs),
        consumer.next(),
    )
    .await
    {
        Ok(Some(Ok(delivery))) => delivery,
        Ok(Some(Err(e))) => {
            spinner.finish_and_clear();
            return Err(WorkerError::ConnectionError(format!(
                "Error receiving response: {}",
                e
            )));
        }
        Ok(None) => {
            spinner.finish_and_clear();
            return Err(WorkerError::ConnectionError(
                "Response stream closed unexpectedly".to_string(),
            ));
        }
        Err(_) => {
            spinner.finish_and_clear();
            return Err(WorkerError::ConnectionError(format!(
                "No response within {} seconds",
                args.timeout_secs
            )));
        }
    };

    spinner.finish_with_message(format!(
        "Response received in {}",
        HumanDuration(wait_start.elapsed())
    ));

    if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
        warn!(error = %e, "Failed to ack response delivery");
    }

    match serde_json::from_slice::<serde_json::Value>(&delivery.data) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!(
            "{}",
            String::from_utf8_lossy(&delivery.data)
        ),
    }

    producer.close().await;
    Ok(())
}
