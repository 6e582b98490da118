//! Entry point of the crate: holds validated connection parameters and
//! opens a fresh broker connection for every `listen` and `publish`.

use std::sync::{Mutex, PoisonError};

use log::{error, info};
use once_cell::sync::OnceCell;

use crate::amqp::handler::HandlerTarget;
use crate::amqp::lapin_client::LapinTransport;
use crate::amqp::listener::{ListenOutcome, Listener, ListenerConfig, DEFAULT_MAX_ITERATIONS};
use crate::amqp::publisher::Publisher;
use crate::amqp::{AmqpConnection, Transport};
use crate::errors::amqp_error::AmqpError;
use crate::errors::params_error::ParamsError;
use crate::models::connection_params::ConnectionParams;
use crate::models::message::OutboundMessage;
use crate::models::transport_mode::TransportMode;

static CONTEXT: OnceCell<AmqpContext> = OnceCell::new();

/// Returns the process-wide context, creating it on the first successful call.
///
/// `transport_mode` is parsed on every call and becomes the mode used by the
/// next connection. The other parameters are validated on the first call only,
/// later calls get the existing context whatever they pass.
pub fn context(
    host: &str,
    username: &str,
    password: &str,
    port: u16,
    vhost: &str,
    transport_mode: &str,
) -> Result<&'static AmqpContext, ParamsError> {
    let mode: TransportMode = transport_mode.parse()?;
    let ctx = CONTEXT.get_or_try_init(|| {
        let params = ConnectionParams::new(host, username, password, port, vhost, mode)?;
        info!(target: "app", "context - AMQP context created with {:?}", &params);
        Ok::<AmqpContext, ParamsError>(AmqpContext::new(params))
    })?;
    ctx.set_transport_mode(mode);
    Ok(ctx)
}

pub struct AmqpContext<T = LapinTransport> {
    params: ConnectionParams,
    transport_mode: Mutex<TransportMode>,
    transport: T,
}

impl AmqpContext<LapinTransport> {
    pub fn new(params: ConnectionParams) -> Self {
        Self::with_transport(params, LapinTransport::new())
    }
}

impl<T: Transport> AmqpContext<T> {
    pub fn with_transport(params: ConnectionParams, transport: T) -> Self {
        Self {
            transport_mode: Mutex::new(params.transport_mode()),
            params,
            transport,
        }
    }

    /// Stored parameters, carrying the current transport mode.
    pub fn params(&self) -> ConnectionParams {
        self.params.clone().with_transport_mode(self.transport_mode())
    }

    pub fn transport_mode(&self) -> TransportMode {
        // TransportMode is Copy, a poisoned lock still holds a valid value
        *self.transport_mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_transport_mode(&self, mode: TransportMode) {
        *self.transport_mode.lock().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    pub async fn connect(&self) -> Result<T::Connection, AmqpError> {
        self.transport.connect(&self.params()).await
    }

    /// Consumes `queue` with the handler registered as `method` on `service`,
    /// for at most `max_iterations` waits (10 when `None`).
    pub async fn listen(
        &self,
        service: &dyn HandlerTarget,
        method: &str,
        queue: &str,
        max_iterations: Option<u32>,
    ) -> Result<ListenOutcome, AmqpError> {
        let mut connection = self.connect().await?;
        let config = ListenerConfig::builder()
            .connection(&mut connection)
            .service(service)
            .method(method)
            .queue(queue)
            .max_iterations(max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS))
            .build();
        match config {
            Ok(config) => Listener::new(config).watch().await,
            Err(err) => {
                error!(target: "app", "listen - invalid listener configuration. Err = {:?}", err);
                if let Err(close_err) = connection.close().await {
                    error!(target: "app", "listen - cannot close AMQP connection. Err = {:?}",
                        close_err);
                }
                Err(err.into())
            }
        }
    }

    /// Publishes `body` to `exchange` with `routing_key` on a fresh connection.
    /// Blank `exchange` or `body` fail before connecting.
    pub async fn publish(
        &self,
        body: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), AmqpError> {
        let message = OutboundMessage::new(exchange, routing_key, body)?;
        let connection = self.connect().await?;
        Publisher::new(connection).send(&message).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;

    use crate::amqp::handler::Service;
    use crate::context::{context, AmqpContext};
    use crate::errors::amqp_error::AmqpError;
    use crate::errors::message_error::MessageError;
    use crate::errors::params_error::ParamsError;
    use crate::models::transport_mode::TransportMode;
    use crate::tests::amqp_stub::{test_params, StubEvent, StubTransport};

    // the only test touching the process-wide context
    #[test]
    fn check_context_is_a_singleton() {
        assert_eq!(
            context("host", "user", "pass", 1234, "vhost", "invalid_mode").err(),
            Some(ParamsError::InvalidConnectionMode("invalid_mode".to_string()))
        );
        assert_eq!(
            context("", "user", "pass", 1234, "vhost", "stream").err(),
            Some(ParamsError::MissingParameter("host"))
        );

        let first = context("host", "user", "pass", 1234, "vhost", "stream").unwrap();
        let second = context("other", "someone", "secret", 4321, "other", "ssl").unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(second.params().host(), "host");
        assert_eq!(second.params().port(), 1234);
        // the mode of the last call wins
        assert_eq!(second.transport_mode(), TransportMode::Secure);
        assert_eq!(first.params().transport_mode(), TransportMode::Secure);

        // an invalid mode is still rejected once the context exists
        assert_eq!(
            context("host", "user", "pass", 1234, "vhost", "ftp").err(),
            Some(ParamsError::InvalidConnectionMode("ftp".to_string()))
        );
        assert_eq!(first.transport_mode(), TransportMode::Secure);
    }

    #[tokio::test]
    async fn ok_listen_uses_stored_params() {
        let transport = StubTransport::new(vec![StubEvent::deliver("a"), StubEvent::deliver("b")]);
        let ctx = AmqpContext::with_transport(test_params(), transport.clone());
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let recorded = bodies.clone();
        let service = Service::new().route("start", move |body: &str| -> anyhow::Result<()> {
            recorded.lock().unwrap().push(body.to_string());
            Ok(())
        });

        let outcome = ctx.listen(&service, "start", "test", Some(2)).await.unwrap();

        assert!(outcome.max_iteration_reached);
        assert_eq!(*bodies.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
        let calls = transport.calls();
        assert_eq!(calls.connects, vec![test_params()]);
        assert_eq!(calls.acks, vec![1, 2]);
        assert_eq!(calls.connection_closes, 1);
    }

    #[tokio::test]
    async fn ok_listen_defaults_to_ten_iterations() {
        let script = (0..12).map(|i| StubEvent::deliver(&format!("msg-{}", i))).collect();
        let transport = StubTransport::new(script);
        let ctx = AmqpContext::with_transport(test_params(), transport.clone());
        let service = Service::new().route("start", |_: &str| -> anyhow::Result<()> { Ok(()) });

        let outcome = ctx.listen(&service, "start", "test", None).await.unwrap();

        assert_eq!(outcome.iterations, 10);
        assert_eq!(outcome.delivered, 10);
        assert_eq!(transport.calls().waits, 10);
    }

    #[tokio::test]
    async fn wrong_listen_with_unknown_method_closes_connection() {
        let transport = StubTransport::new(vec![]);
        let ctx = AmqpContext::with_transport(test_params(), transport.clone());
        let service = Service::new();

        let result = ctx.listen(&service, "start", "test", None).await;

        assert!(matches!(
            result,
            Err(AmqpError::Params(ParamsError::InvalidTarget(ref method))) if method == "start"
        ));
        let calls = transport.calls();
        assert_eq!(calls.opened_channels, 0);
        assert_eq!(calls.connection_closes, 1);
    }

    #[tokio::test]
    async fn wrong_listen_when_broker_is_unreachable() {
        let transport = StubTransport::new(vec![]).failing_connect();
        let ctx = AmqpContext::with_transport(test_params(), transport.clone());
        let service = Service::new().route("start", |_: &str| -> anyhow::Result<()> { Ok(()) });

        let result = ctx.listen(&service, "start", "test", None).await;

        assert!(matches!(result, Err(AmqpError::Connection(_))));
    }

    #[tokio::test]
    async fn ok_publish_opens_a_fresh_connection_each_time() {
        let transport = StubTransport::new(vec![]);
        let ctx = AmqpContext::with_transport(test_params(), transport.clone());

        ctx.publish("first", "exch", "key").await.unwrap();
        ctx.publish("second", "exch", "").await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.connects.len(), 2);
        assert_eq!(calls.opened_channels, 2);
        assert_eq!(
            calls.published,
            vec![
                ("exch".to_string(), "key".to_string(), "first".to_string()),
                ("exch".to_string(), "".to_string(), "second".to_string()),
            ]
        );
        assert_eq!(calls.channel_closes, 2);
        assert_eq!(calls.connection_closes, 2);
    }

    #[tokio::test]
    async fn wrong_publish_validates_before_connecting() {
        let transport = StubTransport::new(vec![]);
        let ctx = AmqpContext::with_transport(test_params(), transport.clone());

        let result = ctx.publish("body", "", "key").await;
        assert!(matches!(result, Err(AmqpError::Message(MessageError::EmptyField("exchange")))));

        let result = ctx.publish("   ", "exch", "key").await;
        assert!(matches!(result, Err(AmqpError::Message(MessageError::EmptyField("message")))));

        assert_eq!(transport.calls().connects.len(), 0);
    }

    #[tokio::test]
    async fn check_transport_mode_switch_applies_to_next_connection() {
        let transport = StubTransport::new(vec![]);
        let ctx = AmqpContext::with_transport(test_params(), transport.clone());

        ctx.set_transport_mode(TransportMode::Secure);
        ctx.publish("body", "exch", "key").await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls.connects[0].transport_mode(), TransportMode::Secure);
    }
}
