// src/broker/consumer.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lapin::message::{Delivery, DeliveryResult};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::ExchangeKind;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::connection::ConnectionManager;
use crate::config::BrokerSettings;
use crate::error::{Result, WorkerError};
use crate::utils::prometheus_metrics::{BROKER_RECONNECTS_TOTAL, MESSAGES_CONSUMED_TOTAL};

/// Poll interval for noticing a lost connection while consuming.
const CONNECTION_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Fixed delay before the next attempt after any consume-loop failure.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Inbound message body: JSON if it parses as such, raw text otherwise.
#[derive(Debug, Clone)]
pub enum InboundPayload {
    Json(serde_json::Value),
    Text(String),
}

/// Processing seam for consumed messages. A success return acks the
/// delivery; an error rejects it without requeue, so queue policy decides
/// between dead-lettering and dropping.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: InboundPayload) -> Result<()>;
}

/// Consumer topology names plus runtime bounds.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub exchange: String,
    pub queue: String,
    pub routing_key: String,
    pub prefetch_count: u16,
    pub max_concurrent: usize,
}

impl ConsumerConfig {
    pub fn from_settings(broker: &BrokerSettings, max_concurrent: usize) -> Self {
        ConsumerConfig {
            exchange: broker.exchange.clone(),
            queue: broker.queue.clone(),
            routing_key: broker.routing_key.clone(),
            prefetch_count: broker.prefetch_count,
            max_concurrent,
        }
    }
}

type HandlerSlot = Arc<Mutex<Option<Arc<dyn MessageHandler>>>>;

/// Consumes request messages under a self-supervising loop: declare
/// topology, consume, watch the connection, and on any failure retry forever
/// with a fixed delay. `stop` cancels the loop, joins it and disconnects.
pub struct RequestConsumer {
    manager: Arc<ConnectionManager>,
    config: ConsumerConfig,
    handler: HandlerSlot,
    limiter: Arc<Semaphore>,
    consuming: AtomicBool,
    supervisor: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl RequestConsumer {
    pub fn new(manager: Arc<ConnectionManager>, config: ConsumerConfig) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrent));
        RequestConsumer {
            manager,
            config,
            handler: Arc::new(Mutex::new(None)),
            limiter,
            consuming: AtomicBool::new(false),
            supervisor: Mutex::new(None),
        }
    }

    /// Handle to the underlying connection, for status reporting.
    pub fn connection(&self) -> Arc<ConnectionManager> {
        self.manager.clone()
    }

    pub fn is_consuming(&self) -> bool {
        self.consuming.load(Ordering::SeqCst)
    }

    /// Stores the handler (a later call may replace it) and spawns the
    /// supervising loop. Returns immediately; calling while already
    /// consuming only swaps the handler. With no handler registered at all,
    /// messages are logged and dropped.
    pub async fn start(&self, handler: Option<Arc<dyn MessageHandler>>) {
        if let Some(handler) = handler {
            *self.handler.lock().await = Some(handler);
        }
        if self.consuming.swap(true, Ordering::SeqCst) {
            debug!("Consumer already running");
            return;
        }

        let token = CancellationToken::new();
        let task = tokio::spawn(supervise(
            self.manager.clone(),
            self.config.clone(),
            self.handler.clone(),
            self.limiter.clone(),
            token.clone(),
        ));
        *self.supervisor.lock().await = Some((token, task));
        info!(queue = %self.config.queue, "Consumer started");
    }

    /// Cancels the supervising loop, waits for it to finish, then closes the
    /// connection. Safe to call when never started. In-flight handler calls
    /// are not interrupted, but their delivery can no longer be acked once
    /// the channel is gone.
    pub async fn stop(&self) {
        self.consuming.store(false, Ordering::SeqCst);
        if let Some((token, task)) = self.supervisor.lock().await.take() {
            info!("Stopping consumer");
            token.cancel();
            if let Err(e) = task.await {
                warn!(error = %e, "Consumer supervisor ended abnormally");
            }
        }
        self.manager.disconnect().await;
    }
}

async fn supervise(
    manager: Arc<ConnectionManager>,
    config: ConsumerConfig,
    handler: HandlerSlot,
    limiter: Arc<Semaphore>,
    cancel: CancellationToken,
) {
    loop {
        match consume_until_interrupted(&manager, &config, &handler, &limiter, &cancel).await {
            Ok(LoopExit::Cancelled) => {
                info!("Consumer loop cancelled");
                return;
            }
            Ok(LoopExit::ConnectionLost) => {
                warn!(
                    "RabbitMQ connection closed. Reconnecting in {}s...",
                    RECONNECT_DELAY.as_secs()
                );
            }
            Err(e) => {
                error!(
                    error = %e,
                    "Consumer setup failed. Retrying in {}s...",
                    RECONNECT_DELAY.as_secs()
                );
            }
        }

        BROKER_RECONNECTS_TOTAL.inc();
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Consumer loop cancelled");
                return;
            }
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}

enum LoopExit {
    Cancelled,
    ConnectionLost,
}

/// One pass of the supervising loop: connect, declare the inbound topology,
/// consume, then idle-poll until the connection dies or `cancel` fires.
async fn consume_until_interrupted(
    manager: &Arc<ConnectionManager>,
    config: &ConsumerConfig,
    handler: &HandlerSlot,
    limiter: &Arc<Semaphore>,
    cancel: &CancellationToken,
) -> Result<LoopExit> {
    let connected = manager.connect().await?;
    let channel = connected.channel;

    channel
        .exchange_declare(
            &config.exchange,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| {
            WorkerError::ConnectionError(format!(
                "Failed to declare exchange '{}': {}",
                config.exchange, e
            ))
        })?;

    channel
        .queue_declare(
            &config.queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| {
            WorkerError::ConnectionError(format!(
                "Failed to declare queue '{}': {}",
                config.queue, e
            ))
        })?;

    channel
        .queue_bind(
            &config.queue,
            &config.exchange,
            &config.routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| {
            WorkerError::ConnectionError(format!(
                "Failed to bind queue '{}' to exchange '{}': {}",
                config.queue, config.exchange, e
            ))
        })?;

    channel
        .basic_qos(config.prefetch_count, BasicQosOptions::default())
        .await
        .map_err(|e| WorkerError::ConnectionError(format!("Failed to set QoS: {}", e)))?;

    let consumer_tag = format!(
        "worker-{}-{}",
        std::process::id(),
        chrono::Utc::now().timestamp()
    );
    let consumer = channel
        .basic_consume(
            &config.queue,
            &consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| {
            WorkerError::ConnectionError(format!(
                "Failed to start consuming from '{}': {}",
                config.queue, e
            ))
        })?;

    info!(queue = %config.queue, consumer_tag = %consumer_tag, "Consuming requests");

    let delegate_handler = handler.clone();
    let delegate_limiter = limiter.clone();
    consumer.set_delegate(move |delivery: DeliveryResult| {
        let handler = delegate_handler.clone();
        let limiter = delegate_limiter.clone();
        async move {
            dispatch(handler, limiter, delivery).await;
        }
    });

    // Deliveries arrive through the delegate above; this loop only watches
    // for cancellation and connection loss.
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(LoopExit::Cancelled),
            _ = tokio::time::sleep(CONNECTION_POLL_INTERVAL) => {
                if !manager.is_connected().await {
                    return Ok(LoopExit::ConnectionLost);
                }
            }
        }
    }
}

/// Per-delivery dispatch: decode, hand to the current handler, ack or
/// reject. Runs on the client's dispatch executor, bounded by `limiter`.
async fn dispatch(handler_slot: HandlerSlot, limiter: Arc<Semaphore>, delivery: DeliveryResult) {
    let delivery = match delivery {
        Ok(Some(delivery)) => delivery,
        // consumer was cancelled by the broker or the channel closed
        Ok(None) => return,
        Err(e) => {
            error!(error = %e, "Error receiving delivery");
            return;
        }
    };

    let _permit = match limiter.acquire_owned().await {
        Ok(permit) => permit,
        // semaphore closed mid-shutdown; the unacked delivery is redelivered
        Err(_) => return,
    };

    MESSAGES_CONSUMED_TOTAL.inc();
    debug!(bytes = delivery.data.len(), "Received message");

    let text = match std::str::from_utf8(&delivery.data) {
        Ok(text) => text.to_owned(),
        Err(e) => {
            error!(error = %e, "Received non-UTF-8 message body; rejecting");
            reject(&delivery).await;
            return;
        }
    };

    let payload = match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => InboundPayload::Json(value),
        Err(_) => InboundPayload::Text(text),
    };

    let handler = handler_slot.lock().await.clone();
    match handler {
        Some(handler) => match handler.handle(payload).await {
            Ok(()) => ack(&delivery).await,
            Err(e) => {
                error!(error = %e, "Handler failed; rejecting message");
                reject(&delivery).await;
            }
        },
        None => {
            info!("No handler registered; dropping message");
            ack(&delivery).await;
        }
    }
}

async fn ack(delivery: &Delivery) {
    if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
        error!(error = %e, "Failed to ack message");
    }
}

async fn reject(delivery: &Delivery) {
    // requeue=false: queue policy decides between dead-letter and drop
    let options = BasicNackOptions {
        requeue: false,
        ..Default::default()
    };
    if let Err(e) = delivery.nack(options).await {
        error!(error = %e, "Failed to nack message");
    }
}
