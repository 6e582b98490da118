pub mod amqp_error;
pub mod message_error;
pub mod params_error;
