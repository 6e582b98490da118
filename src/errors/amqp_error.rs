use thiserror::Error;

use crate::errors::message_error::MessageError;
use crate::errors::params_error::ParamsError;

// custom error, based on 'thiserror' library
#[derive(Error, Debug)]
pub enum AmqpError {
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error("amqp connection error")]
    Connection(#[source] lapin::Error),
    #[error("amqp channel error")]
    Channel(#[source] lapin::Error),
    #[error("amqp qos error, prefetch = {prefetch}")]
    Qos {
        prefetch: u16,
        #[source]
        source: lapin::Error,
    },
    #[error("amqp consume error on queue {queue}")]
    Consume {
        queue: String,
        #[source]
        source: lapin::Error,
    },
    #[error("amqp publish error on exchange {exchange}")]
    Publish {
        exchange: String,
        #[source]
        source: lapin::Error,
    },
    #[error("amqp ack error, delivery_tag = {delivery_tag}")]
    Ack {
        delivery_tag: u64,
        #[source]
        source: lapin::Error,
    },
    #[error("amqp close error")]
    Close(#[source] lapin::Error),
    #[error("message handler error: {0}")]
    Handler(anyhow::Error),
}
