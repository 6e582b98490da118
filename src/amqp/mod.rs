//! Broker access.
//!
//! The [`Transport`], [`AmqpConnection`] and [`AmqpChannel`] traits are the
//! only way the rest of the crate talks to a broker. [`lapin_client`] is the
//! production implementation, tests plug in a recording stub.

use async_trait::async_trait;
use log::warn;

use crate::errors::amqp_error::AmqpError;
use crate::models::connection_params::ConnectionParams;
use crate::models::message::InboundMessage;

pub mod handler;
pub mod lapin_client;
pub mod listener;
pub mod publisher;

/// What a blocking wait on a consuming channel produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Delivery(InboundMessage),
    /// the consumer was cancelled or the channel went away
    Closed,
}

/// Builds live broker connections.
#[async_trait]
pub trait Transport: Send + Sync {
    type Connection: AmqpConnection;

    async fn connect(&self, params: &ConnectionParams) -> Result<Self::Connection, AmqpError>;
}

#[async_trait]
pub trait AmqpConnection: Send {
    type Channel: AmqpChannel;

    async fn open_channel(&mut self) -> Result<Self::Channel, AmqpError>;

    fn is_open(&self) -> bool;

    /// Closing an already closed connection is a no-op.
    async fn close(&mut self) -> Result<(), AmqpError>;
}

#[async_trait]
pub trait AmqpChannel: Send {
    /// Limits the number of unacknowledged deliveries in flight.
    async fn set_prefetch(&mut self, count: u16) -> Result<(), AmqpError>;

    /// Registers a consumer on `queue`, deliveries must be acked explicitly.
    async fn consume(&mut self, queue: &str) -> Result<(), AmqpError>;

    /// Blocks until the broker delivers a message or the consumer ends.
    async fn wait(&mut self) -> Result<ChannelEvent, AmqpError>;

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), AmqpError>;

    async fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
    ) -> Result<(), AmqpError>;

    fn is_open(&self) -> bool;

    /// Closing an already closed channel is a no-op.
    async fn close(&mut self) -> Result<(), AmqpError>;
}

// closes the channel, then the connection, even if the first close fails
pub(crate) async fn close_all<Ch, C>(
    channel: &mut Ch,
    connection: &mut C,
) -> Result<(), AmqpError>
where
    Ch: AmqpChannel,
    C: AmqpConnection,
{
    let channel_result = channel.close().await;
    if let Err(err) = &channel_result {
        warn!(target: "app",
            "close_all - cannot close AMQP channel, closing connection anyway. Err = {:?}", err);
    }
    let connection_result = connection.close().await;
    channel_result.and(connection_result)
}
