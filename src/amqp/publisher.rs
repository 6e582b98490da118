use log::{debug, error};

use crate::amqp::{close_all, AmqpChannel, AmqpConnection};
use crate::errors::amqp_error::AmqpError;
use crate::models::message::OutboundMessage;

/// One-shot publisher: sends a single message, then closes its channel and
/// the connection it was given.
pub struct Publisher<C> {
    connection: C,
}

impl<C: AmqpConnection> Publisher<C> {
    pub fn new(connection: C) -> Self {
        Self { connection }
    }

    /// Validates `exchange` and `body` (see [`OutboundMessage::new`]), then sends.
    /// The connection is closed even when validation fails.
    pub async fn publish(
        self,
        exchange: &str,
        routing_key: &str,
        body: &str,
    ) -> Result<(), AmqpError> {
        match OutboundMessage::new(exchange, routing_key, body) {
            Ok(message) => self.send(&message).await,
            Err(err) => {
                let mut connection = self.connection;
                if let Err(close_err) = connection.close().await {
                    error!(target: "app", "publish - cannot close AMQP connection. Err = {:?}",
                        close_err);
                }
                Err(err.into())
            }
        }
    }

    pub async fn send(mut self, message: &OutboundMessage) -> Result<(), AmqpError> {
        let mut channel = match self.connection.open_channel().await {
            Ok(channel) => channel,
            Err(err) => {
                if let Err(close_err) = self.connection.close().await {
                    error!(target: "app", "send - cannot close AMQP connection. Err = {:?}",
                        close_err);
                }
                return Err(err);
            }
        };

        debug!(target: "app", "send - publishing message to exchange {} with routing key '{}'",
            message.exchange(), message.routing_key());
        let published = channel
            .publish(message.exchange(), message.routing_key(), message.body().as_bytes())
            .await;
        let closed = close_all(&mut channel, &mut self.connection).await;

        published?;
        closed?;
        debug!(target: "app", "send - message published to exchange {}", message.exchange());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::amqp::publisher::Publisher;
    use crate::amqp::Transport;
    use crate::errors::amqp_error::AmqpError;
    use crate::errors::message_error::MessageError;
    use crate::tests::amqp_stub::{test_params, StubTransport};

    #[tokio::test]
    async fn ok_publish_is_one_shot() {
        let transport = StubTransport::new(vec![]);
        let connection = transport.connect(&test_params()).await.unwrap();

        Publisher::new(connection).publish("exch", "key", "body").await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.opened_channels, 1);
        assert_eq!(
            calls.published,
            vec![("exch".to_string(), "key".to_string(), "body".to_string())]
        );
        assert_eq!(calls.channel_closes, 1);
        assert_eq!(calls.connection_closes, 1);
    }

    #[tokio::test]
    async fn wrong_publish_with_empty_exchange() {
        let transport = StubTransport::new(vec![]);
        let connection = transport.connect(&test_params()).await.unwrap();

        let result = Publisher::new(connection).publish("", "key", "body").await;

        assert!(matches!(result, Err(AmqpError::Message(MessageError::EmptyField("exchange")))));
        let calls = transport.calls();
        assert_eq!(calls.opened_channels, 0);
        assert_eq!(calls.published.len(), 0);
        assert_eq!(calls.connection_closes, 1);
    }

    #[tokio::test]
    async fn wrong_publish_with_blank_body() {
        for body in ["", "   "] {
            let transport = StubTransport::new(vec![]);
            let connection = transport.connect(&test_params()).await.unwrap();

            let result = Publisher::new(connection).publish("exch", "key", body).await;

            assert!(matches!(result, Err(AmqpError::Message(MessageError::EmptyField("message")))));
            assert_eq!(transport.calls().opened_channels, 0);
        }
    }

    #[tokio::test]
    async fn wrong_publish_failure_still_closes() {
        let transport = StubTransport::new(vec![]).failing_publish();
        let connection = transport.connect(&test_params()).await.unwrap();

        let result = Publisher::new(connection).publish("exch", "key", "body").await;

        assert!(matches!(result, Err(AmqpError::Publish { .. })));
        let calls = transport.calls();
        assert_eq!(calls.channel_closes, 1);
        assert_eq!(calls.connection_closes, 1);
    }

    #[tokio::test]
    async fn wrong_channel_failure_closes_connection() {
        let transport = StubTransport::new(vec![]).failing_channel();
        let connection = transport.connect(&test_params()).await.unwrap();

        let result = Publisher::new(connection).publish("exch", "key", "body").await;

        assert!(matches!(result, Err(AmqpError::Channel(_))));
        let calls = transport.calls();
        assert_eq!(calls.channel_closes, 0);
        assert_eq!(calls.connection_closes, 1);
    }
}
