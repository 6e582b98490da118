pub mod connection_params;
pub mod message;
pub mod transport_mode;
