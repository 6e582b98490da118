use std::collections::HashMap;
use std::path::Path;

use dotenvy::dotenv;
use log::{info, warn, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use serde::Deserialize;

use crate::errors::params_error::ParamsError;
use crate::models::connection_params::{ConnectionParams, HOST, PASSWORD, PORT, USERNAME, VHOST};
use crate::models::transport_mode::TransportMode;

pub const LOG_CONFIG_FILE: &str = "log4rs.yaml";
const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}";

// connection fields are optional here, ConnectionParams reports them in order
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Env {
    pub amqp_host: Option<String>,
    pub amqp_port: Option<String>,
    pub amqp_username: Option<String>,
    pub amqp_password: Option<String>,
    pub amqp_vhost: Option<String>,
    #[serde(default = "default_transport_mode")]
    pub amqp_transport_mode: String,
    #[serde(default)]
    pub amqp_queue_name: String,
    #[serde(default)]
    pub amqp_exchange: String,
    #[serde(default)]
    pub amqp_routing_key: String,
    #[serde(default = "default_max_iterations")]
    pub amqp_max_iterations: u32,
}

fn default_transport_mode() -> String {
    TransportMode::Plain.to_string()
}

fn default_max_iterations() -> u32 {
    crate::amqp::listener::DEFAULT_MAX_ITERATIONS
}

impl Env {
    pub fn connection_params(&self) -> Result<ConnectionParams, ParamsError> {
        let mode: TransportMode = self.amqp_transport_mode.parse()?;
        let mut fields: HashMap<String, String> = HashMap::new();
        let entries = [
            (HOST, &self.amqp_host),
            (PORT, &self.amqp_port),
            (USERNAME, &self.amqp_username),
            (PASSWORD, &self.amqp_password),
            (VHOST, &self.amqp_vhost),
        ];
        for (field, value) in entries {
            if let Some(value) = value {
                fields.insert(field.to_string(), value.clone());
            }
        }
        ConnectionParams::from_map(&fields, mode)
    }
}

/// Loads `.env` (if any) and reads the `AMQP_*` environment variables.
pub fn init() -> Result<Env, envy::Error> {
    dotenv().ok();
    let env = envy::from_env::<Env>()?;
    print_env(&env);
    Ok(env)
}

/// Initializes log4rs from `log4rs.yaml`, or a console logger when the file is missing.
pub fn init_logger() -> anyhow::Result<()> {
    if Path::new(LOG_CONFIG_FILE).exists() {
        log4rs::init_file(LOG_CONFIG_FILE, Default::default())?;
        return Ok(());
    }
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    warn!(target: "app", "init_logger - {} not found, logging to console only", LOG_CONFIG_FILE);
    Ok(())
}

pub fn print_env(env: &Env) {
    let unset = "<unset>".to_string();
    info!(target: "app", "AMQP_HOST = {}", env.amqp_host.as_ref().unwrap_or(&unset));
    info!(target: "app", "AMQP_PORT = {}", env.amqp_port.as_ref().unwrap_or(&unset));
    info!(target: "app", "AMQP_USERNAME = {}", env.amqp_username.as_ref().unwrap_or(&unset));
    let password = if env.amqp_password.is_some() { "********" } else { "<unset>" };
    info!(target: "app", "AMQP_PASSWORD = {}", password);
    info!(target: "app", "AMQP_VHOST = {}", env.amqp_vhost.as_ref().unwrap_or(&unset));
    info!(target: "app", "AMQP_TRANSPORT_MODE = {}", env.amqp_transport_mode);
    info!(target: "app", "AMQP_QUEUE_NAME = {}", env.amqp_queue_name);
    info!(target: "app", "AMQP_EXCHANGE = {}", env.amqp_exchange);
    info!(target: "app", "AMQP_ROUTING_KEY = {}", env.amqp_routing_key);
    info!(target: "app", "AMQP_MAX_ITERATIONS = {}", env.amqp_max_iterations);
}
