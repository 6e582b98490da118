use async_trait::async_trait;
use futures::stream::StreamExt;
use log::{debug, error, info, warn};

use lapin::uri::{AMQPAuthority, AMQPQueryString, AMQPScheme, AMQPUri, AMQPUserInfo};
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer,
};

use crate::amqp::{AmqpChannel, AmqpConnection, ChannelEvent, Transport};
use crate::errors::amqp_error::AmqpError;
use crate::models::connection_params::ConnectionParams;
use crate::models::message::InboundMessage;
use crate::models::transport_mode::TransportMode;

const REPLY_SUCCESS: u16 = 200;

/// [`Transport`] backed by `lapin`, running on the current tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct LapinTransport;

impl LapinTransport {
    pub fn new() -> Self {
        Self
    }
}

pub fn amqp_uri(params: &ConnectionParams) -> AMQPUri {
    let scheme = match params.transport_mode() {
        TransportMode::Plain => AMQPScheme::AMQP,
        TransportMode::Secure => AMQPScheme::AMQPS,
    };
    AMQPUri {
        scheme,
        authority: AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: params.username().to_string(),
                password: params.password().to_string(),
            },
            host: params.host().to_string(),
            port: params.port(),
        },
        vhost: params.vhost().to_string(),
        query: AMQPQueryString::default(),
    }
}

#[async_trait]
impl Transport for LapinTransport {
    type Connection = LapinConnection;

    async fn connect(&self, params: &ConnectionParams) -> Result<LapinConnection, AmqpError> {
        info!(target: "app", "connect - creating AMQP connection to {}:{} vhost={} mode={}",
            params.host(), params.port(), params.vhost(), params.transport_mode());
        let options = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);
        match Connection::connect_uri(amqp_uri(params), options).await {
            Ok(connection) => {
                info!(target: "app", "connect - AMQP connection established");
                connection.on_error(|err| {
                    error!(target: "app", "connect - AMQP connection error = {:?}", err);
                });
                Ok(LapinConnection { connection })
            }
            Err(err) => {
                error!(target: "app", "connect - cannot create AMQP connection. Err = {:?}", err);
                Err(AmqpError::Connection(err))
            }
        }
    }
}

pub struct LapinConnection {
    connection: Connection,
}

#[async_trait]
impl AmqpConnection for LapinConnection {
    type Channel = LapinChannel;

    async fn open_channel(&mut self) -> Result<LapinChannel, AmqpError> {
        debug!(target: "app", "open_channel - creating AMQP channel...");
        match self.connection.create_channel().await {
            Ok(channel) => {
                debug!(target: "app", "open_channel - AMQP channel {} created", channel.id());
                Ok(LapinChannel::new(channel))
            }
            Err(err) => {
                error!(target: "app", "open_channel - cannot create AMQP channel. Err = {:?}", err);
                Err(AmqpError::Channel(err))
            }
        }
    }

    fn is_open(&self) -> bool {
        self.connection.status().connected()
    }

    async fn close(&mut self) -> Result<(), AmqpError> {
        if !self.is_open() {
            debug!(target: "app", "close - AMQP connection already closed");
            return Ok(());
        }
        self.connection
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(AmqpError::Close)?;
        debug!(target: "app", "close - AMQP connection closed");
        Ok(())
    }
}

pub struct LapinChannel {
    channel: Channel,
    consumer: Option<Consumer>,
    queue: String,
    consumer_ended: bool,
}

impl LapinChannel {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            consumer: None,
            queue: String::new(),
            consumer_ended: false,
        }
    }
}

#[async_trait]
impl AmqpChannel for LapinChannel {
    async fn set_prefetch(&mut self, count: u16) -> Result<(), AmqpError> {
        self.channel
            .basic_qos(count, BasicQosOptions::default())
            .await
            .map_err(|source| AmqpError::Qos { prefetch: count, source })
    }

    async fn consume(&mut self, queue: &str) -> Result<(), AmqpError> {
        debug!(target: "app", "consume - registering consumer on queue {}", queue);
        // an empty consumer tag lets the broker generate one
        let consumer = self
            .channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions {
                    no_ack: false,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|source| AmqpError::Consume {
                queue: queue.to_string(),
                source,
            })?;
        self.queue = queue.to_string();
        self.consumer = Some(consumer);
        self.consumer_ended = false;
        Ok(())
    }

    async fn wait(&mut self) -> Result<ChannelEvent, AmqpError> {
        let Some(consumer) = self.consumer.as_mut() else {
            warn!(target: "app", "wait - no consumer registered on channel {}", self.channel.id());
            return Ok(ChannelEvent::Closed);
        };
        match consumer.next().await {
            Some(Ok(delivery)) => {
                debug!(target: "app", "wait - delivery {} received from queue {}",
                    delivery.delivery_tag, &self.queue);
                Ok(ChannelEvent::Delivery(InboundMessage::new(
                    delivery.delivery_tag,
                    delivery.data,
                )))
            }
            Some(Err(err)) => {
                error!(target: "app", "wait - consumer error on queue {}. Err = {:?}",
                    &self.queue, err);
                Err(AmqpError::Consume {
                    queue: self.queue.clone(),
                    source: err,
                })
            }
            None => {
                debug!(target: "app", "wait - consumer on queue {} ended", &self.queue);
                self.consumer_ended = true;
                Ok(ChannelEvent::Closed)
            }
        }
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), AmqpError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|source| AmqpError::Ack { delivery_tag, source })
    }

    async fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
    ) -> Result<(), AmqpError> {
        let to_publish_error = |source| AmqpError::Publish {
            exchange: exchange.to_string(),
            source,
        };
        self.channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default(),
            )
            .await
            .map_err(to_publish_error)?
            .await
            .map_err(to_publish_error)?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.channel.status().connected() && !self.consumer_ended
    }

    async fn close(&mut self) -> Result<(), AmqpError> {
        if !self.channel.status().connected() {
            debug!(target: "app", "close - AMQP channel already closed");
            return Ok(());
        }
        self.channel
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(AmqpError::Close)?;
        debug!(target: "app", "close - AMQP channel closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use lapin::uri::AMQPScheme;
    use pretty_assertions::assert_eq;

    use crate::amqp::lapin_client::amqp_uri;
    use crate::models::connection_params::ConnectionParams;
    use crate::models::transport_mode::TransportMode;

    #[test]
    fn check_amqp_uri_for_plain_mode() {
        let params =
            ConnectionParams::new("localhost", "guest", "guest", 5672, "/", TransportMode::Plain)
                .unwrap();
        let uri = amqp_uri(&params);
        assert!(matches!(uri.scheme, AMQPScheme::AMQP));
        assert_eq!(uri.authority.host, "localhost");
        assert_eq!(uri.authority.port, 5672);
        assert_eq!(uri.authority.userinfo.username, "guest");
        assert_eq!(uri.authority.userinfo.password, "guest");
        assert_eq!(uri.vhost, "/");
    }

    #[test]
    fn check_amqp_uri_for_secure_mode() {
        let params =
            ConnectionParams::new("broker", "user", "pass", 5671, "events", TransportMode::Secure)
                .unwrap();
        let uri = amqp_uri(&params);
        assert!(matches!(uri.scheme, AMQPScheme::AMQPS));
        assert_eq!(uri.authority.port, 5671);
        assert_eq!(uri.vhost, "events");
    }
}
