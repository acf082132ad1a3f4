// src/broker/producer.rs

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions};
use lapin::protocol::basic::AMQPProperties;
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::broker::connection::ConnectionManager;
use crate::error::{Result, WorkerError};

/// Publishing seam so the pipeline can be driven against a fake in tests.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn send(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &str,
        kind: ExchangeKind,
    ) -> Result<()>;
}

#[derive(Default)]
struct PublishState {
    /// Connection generation the registry below was built on.
    generation: u64,
    /// Exchanges already declared on the current connection.
    declared: HashSet<String>,
}

/// Lazily connecting publisher. An empty exchange name routes through the
/// broker's default exchange, where the routing key names the destination
/// queue directly; any other name is declared durable once per connection
/// before the first publish to it. Publishes are persistent and wait for the
/// broker's confirm. Failures propagate to the caller; retrying is the
/// caller's decision.
pub struct ResponseProducer {
    manager: Arc<ConnectionManager>,
    state: Mutex<PublishState>,
}

impl ResponseProducer {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        ResponseProducer {
            manager,
            state: Mutex::new(PublishState::default()),
        }
    }

    pub async fn send(
        &self,
        exchange_name: &str,
        routing_key: &str,
        body: &str,
        kind: ExchangeKind,
    ) -> Result<()> {
        let (channel, generation) = self.publish_channel().await?;

        if !exchange_name.is_empty() {
            self.ensure_exchange(&channel, exchange_name, kind, generation)
                .await?;
        }

        let confirmation = channel
            .basic_publish(
                exchange_name,
                routing_key,
                BasicPublishOptions::default(),
                body.as_bytes(),
                // delivery mode 2: broker persists the message
                AMQPProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| {
                WorkerError::PublishError(format!(
                    "Failed to publish to exchange '{}' with routing key '{}': {}",
                    exchange_name, routing_key, e
                ))
            })?
            .await
            .map_err(|e| {
                WorkerError::PublishError(format!("Broker did not confirm publish: {}", e))
            })?;

        if let Confirmation::Nack(_) = confirmation {
            return Err(WorkerError::PublishError(format!(
                "Broker negatively confirmed publish to '{}' with routing key '{}'",
                exchange_name, routing_key
            )));
        }

        info!(exchange = %exchange_name, routing_key = %routing_key, "Message published");
        Ok(())
    }

    /// Drops the exchange registry and closes the connection. The next
    /// `send` reconnects from scratch.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.declared.clear();
        state.generation = 0;
        drop(state);
        self.manager.disconnect().await;
    }

    /// Channel ready for publishing: confirm mode enabled and the exchange
    /// registry reset whenever the underlying connection was replaced.
    async fn publish_channel(&self) -> Result<(Channel, u64)> {
        let connected = self.manager.connect().await?;
        let mut state = self.state.lock().await;
        if state.generation != connected.generation {
            connected
                .channel
                .confirm_select(ConfirmSelectOptions::default())
                .await
                .map_err(|e| {
                    WorkerError::PublishError(format!(
                        "Failed to enable publisher confirms: {}",
                        e
                    ))
                })?;
            state.declared.clear();
            state.generation = connected.generation;
            debug!(
                generation = connected.generation,
                "Publisher channel ready"
            );
        }
        Ok((connected.channel, connected.generation))
    }

    async fn ensure_exchange(
        &self,
        channel: &Channel,
        exchange_name: &str,
        kind: ExchangeKind,
        generation: u64,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.generation == generation && state.declared.contains(exchange_name) {
            return Ok(());
        }

        channel
            .exchange_declare(
                exchange_name,
                kind,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                WorkerError::PublishError(format!(
                    "Failed to declare exchange '{}': {}",
                    exchange_name, e
                ))
            })?;

        // remember the declaration only if the connection has not been
        // replaced while we were declaring
        if state.generation == generation {
            state.declared.insert(exchange_name.to_string());
            debug!(exchange = %exchange_name, "Exchange declared");
        }
        Ok(())
    }
}

#[async_trait]
impl MessagePublisher for ResponseProducer {
    async fn send(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &str,
        kind: ExchangeKind,
    ) -> Result<()> {
        ResponseProducer::send(self, exchange, routing_key, body, kind).await
    }
}
