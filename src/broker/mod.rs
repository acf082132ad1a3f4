// Broker connectivity: connection lifecycle, consuming, publishing.

pub mod connection;
pub mod consumer;
pub mod producer;

pub use connection::{ConnectedChannel, ConnectionManager};
pub use consumer::{ConsumerConfig, InboundPayload, MessageHandler, RequestConsumer};
pub use producer::{MessagePublisher, ResponseProducer};
