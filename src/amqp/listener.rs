use std::fmt;

use log::{debug, error, info};

use crate::amqp::handler::{HandlerTarget, MessageHandler};
use crate::amqp::{close_all, AmqpChannel, AmqpConnection, ChannelEvent};
use crate::errors::amqp_error::AmqpError;
use crate::errors::params_error::ParamsError;
use crate::models::message::InboundMessage;

/// At most one unacknowledged message in flight.
pub const PREFETCH_COUNT: u16 = 1;
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;
pub const MAX_ITERATION_NOTICE: &str = " [x] Max iteration reached";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Configuring,
    Consuming,
    Draining,
    Closed,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ListenerState::Idle => "idle",
            ListenerState::Configuring => "configuring",
            ListenerState::Consuming => "consuming",
            ListenerState::Draining => "draining",
            ListenerState::Closed => "closed",
        };
        fmt.write_str(name)
    }
}

/// Summary of a finished listen session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenOutcome {
    /// number of blocking waits performed
    pub iterations: u32,
    /// messages handled and acknowledged
    pub delivered: u32,
    pub max_iteration_reached: bool,
}

/// Validated listener settings, see [`ListenerConfig::builder`].
pub struct ListenerConfig<'a, C> {
    connection: &'a mut C,
    handler: &'a dyn MessageHandler,
    method: String,
    queue: String,
    max_iterations: u32,
}

impl<'a, C: AmqpConnection> ListenerConfig<'a, C> {
    pub fn builder() -> ListenerConfigBuilder<'a, C> {
        ListenerConfigBuilder {
            connection: None,
            service: None,
            method: None,
            queue: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

pub struct ListenerConfigBuilder<'a, C> {
    connection: Option<&'a mut C>,
    service: Option<&'a dyn HandlerTarget>,
    method: Option<String>,
    queue: Option<String>,
    max_iterations: u32,
}

impl<'a, C: AmqpConnection> ListenerConfigBuilder<'a, C> {
    pub fn connection(mut self, connection: &'a mut C) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn service(mut self, service: &'a dyn HandlerTarget) -> Self {
        self.service = Some(service);
        self
    }

    pub fn method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    pub fn queue(mut self, queue: &str) -> Self {
        self.queue = Some(queue.to_string());
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Presence is checked in the order connection, service, method, queue
    /// (blank text counts as missing). Only then is the method resolved on
    /// the service and the connection checked to be open.
    pub fn build(self) -> Result<ListenerConfig<'a, C>, ParamsError> {
        let connection = self.connection.ok_or(ParamsError::MissingParameter("connection"))?;
        let service = self.service.ok_or(ParamsError::MissingParameter("service"))?;
        let method = non_blank(self.method).ok_or(ParamsError::MissingParameter("method"))?;
        let queue = non_blank(self.queue).ok_or(ParamsError::MissingParameter("queue"))?;

        let handler = service
            .resolve(&method)
            .ok_or_else(|| ParamsError::InvalidTarget(method.clone()))?;
        if !connection.is_open() {
            return Err(ParamsError::InvalidConnection);
        }

        Ok(ListenerConfig {
            connection,
            handler,
            method,
            queue,
            max_iterations: self.max_iterations,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Consumes one queue for a bounded number of iterations, then closes the
/// channel and the connection.
pub struct Listener<'a, C> {
    config: ListenerConfig<'a, C>,
    state: ListenerState,
}

impl<'a, C: AmqpConnection> Listener<'a, C> {
    pub fn new(config: ListenerConfig<'a, C>) -> Self {
        let mut listener = Self {
            config,
            state: ListenerState::Idle,
        };
        listener.transition(ListenerState::Configuring);
        listener
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Runs the consume loop to completion.
    ///
    /// Every delivery is passed to the handler and acknowledged once the
    /// handler returns `Ok`. The loop stops when `max_iterations` waits have
    /// been performed or the channel closes. Channel and connection are
    /// closed on every exit path, a loop error takes precedence over a close error.
    pub async fn watch(mut self) -> Result<ListenOutcome, AmqpError> {
        self.transition(ListenerState::Consuming);
        let mut channel = match self.config.connection.open_channel().await {
            Ok(channel) => channel,
            Err(err) => {
                self.transition(ListenerState::Draining);
                if let Err(close_err) = self.config.connection.close().await {
                    error!(target: "app", "watch - cannot close AMQP connection. Err = {:?}",
                        close_err);
                }
                self.transition(ListenerState::Closed);
                return Err(err);
            }
        };

        let result = self.consume(&mut channel).await;

        self.transition(ListenerState::Draining);
        if let Ok(outcome) = &result {
            if outcome.max_iteration_reached {
                info!(target: "app", "{}", MAX_ITERATION_NOTICE);
            }
        }
        let closed = close_all(&mut channel, &mut *self.config.connection).await;
        self.transition(ListenerState::Closed);

        let outcome = result?;
        closed?;
        Ok(outcome)
    }

    async fn consume(&self, channel: &mut C::Channel) -> Result<ListenOutcome, AmqpError> {
        channel.set_prefetch(PREFETCH_COUNT).await?;
        channel.consume(&self.config.queue).await?;
        info!(target: "app", "consume - waiting for messages on queue {}, max_iterations = {}",
            &self.config.queue, self.config.max_iterations);

        let mut counter: u32 = 0;
        let mut delivered: u32 = 0;
        while channel.is_open() && counter < self.config.max_iterations {
            counter += 1;
            match channel.wait().await? {
                ChannelEvent::Delivery(message) => {
                    self.dispatch(channel, message).await?;
                    delivered += 1;
                }
                ChannelEvent::Closed => {
                    debug!(target: "app", "consume - channel closed after {} iterations", counter);
                }
            }
        }

        Ok(ListenOutcome {
            iterations: counter,
            delivered,
            max_iteration_reached: counter >= self.config.max_iterations,
        })
    }

    async fn dispatch(
        &self,
        channel: &mut C::Channel,
        message: InboundMessage,
    ) -> Result<(), AmqpError> {
        let delivery_tag = message.delivery_tag;
        let body = message.body();
        debug!(target: "app", "dispatch - delivery {} to method {}",
            delivery_tag, &self.config.method);
        self.config.handler.handle(&body).await.map_err(|err| {
            error!(target: "app", "dispatch - method {} failed on delivery {}. Err = {:?}",
                &self.config.method, delivery_tag, err);
            AmqpError::Handler(err)
        })?;
        channel.ack(delivery_tag).await
    }

    fn transition(&mut self, next: ListenerState) {
        debug!(target: "app", "listener on queue {}: {} -> {}",
            &self.config.queue, self.state, next);
        self.state = next;
    }
}
