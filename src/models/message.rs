use std::borrow::Cow;

use crate::errors::message_error::MessageError;

/// A single message to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    exchange: String,
    routing_key: String,
    body: String,
}

impl OutboundMessage {
    /// Fails with `EmptyField` when `exchange` or `body` is blank, exchange checked first.
    /// An empty routing key is allowed.
    pub fn new(exchange: &str, routing_key: &str, body: &str) -> Result<Self, MessageError> {
        if exchange.trim().is_empty() {
            return Err(MessageError::EmptyField("exchange"));
        }
        if body.trim().is_empty() {
            return Err(MessageError::EmptyField("message"));
        }
        Ok(Self {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            body: body.to_string(),
        })
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// A message delivered by the broker, not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub delivery_tag: u64,
    pub data: Vec<u8>,
}

impl InboundMessage {
    pub fn new(delivery_tag: u64, data: Vec<u8>) -> Self {
        Self { delivery_tag, data }
    }

    /// Invalid UTF-8 sequences are replaced with U+FFFD.
    pub fn body(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}
