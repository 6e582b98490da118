//! A small facade over an AMQP 0-9-1 client.
//!
//! [`context::AmqpContext`] validates connection parameters once and exposes
//! two operations: `listen`, a bounded consume loop dispatching every message
//! body to a [`amqp::handler::MessageHandler`], and `publish`, a one-shot send
//! to an exchange. Every call opens and closes its own broker connection.

pub mod amqp;
pub mod config;
pub mod context;
pub mod errors;
pub mod models;
