use std::collections::HashMap;
use std::fmt;

use crate::errors::params_error::ParamsError;
use crate::models::transport_mode::TransportMode;

pub const HOST: &str = "host";
pub const PORT: &str = "port";
pub const USERNAME: &str = "username";
pub const PASSWORD: &str = "password";
pub const VHOST: &str = "vhost";

/// Checked in this order, the first failing field is reported.
pub const REQUIRED_FIELDS: [&str; 5] = [HOST, PORT, USERNAME, PASSWORD, VHOST];

/// Validated broker connection parameters.
///
/// Values can only be obtained through [`ConnectionParams::new`] or
/// [`ConnectionParams::from_map`], so every field is non-blank and the
/// port is non-zero.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    host: String,
    port: u16,
    username: String,
    password: String,
    vhost: String,
    transport_mode: TransportMode,
}

impl ConnectionParams {
    pub fn new(
        host: &str,
        username: &str,
        password: &str,
        port: u16,
        vhost: &str,
        transport_mode: TransportMode,
    ) -> Result<Self, ParamsError> {
        let mut fields: HashMap<String, String> = HashMap::new();
        fields.insert(HOST.to_string(), host.to_string());
        fields.insert(PORT.to_string(), port.to_string());
        fields.insert(USERNAME.to_string(), username.to_string());
        fields.insert(PASSWORD.to_string(), password.to_string());
        fields.insert(VHOST.to_string(), vhost.to_string());
        Self::from_map(&fields, transport_mode)
    }

    /// Validates a mapping of named text fields.
    ///
    /// Every field in [`REQUIRED_FIELDS`] must be present and non-blank after
    /// trimming. A port of `0` is treated as missing. Values are stored trimmed.
    pub fn from_map(
        fields: &HashMap<String, String>,
        transport_mode: TransportMode,
    ) -> Result<Self, ParamsError> {
        for field in REQUIRED_FIELDS {
            if required(fields, field).is_none() {
                return Err(ParamsError::MissingParameter(field));
            }
        }

        let port_str = required(fields, PORT).unwrap_or_default();
        let port = port_str.parse::<u16>().map_err(|err| ParamsError::InvalidParameter {
            field: PORT,
            reason: format!("'{}' is not a valid port, {}", port_str, err),
        })?;

        Ok(Self {
            host: required(fields, HOST).unwrap_or_default().to_string(),
            port,
            username: required(fields, USERNAME).unwrap_or_default().to_string(),
            password: required(fields, PASSWORD).unwrap_or_default().to_string(),
            vhost: required(fields, VHOST).unwrap_or_default().to_string(),
            transport_mode,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn vhost(&self) -> &str {
        &self.vhost
    }

    pub fn transport_mode(&self) -> TransportMode {
        self.transport_mode
    }

    pub fn with_transport_mode(mut self, transport_mode: TransportMode) -> Self {
        self.transport_mode = transport_mode;
        self
    }
}

// trimmed value of `field`, None when absent, blank or a zero port
fn required<'a>(fields: &'a HashMap<String, String>, field: &str) -> Option<&'a str> {
    let value = fields.get(field)?.trim();
    if value.is_empty() || (field == PORT && value.trim_start_matches('0').is_empty()) {
        return None;
    }
    Some(value)
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"********")
            .field("vhost", &self.vhost)
            .field("transport_mode", &self.transport_mode)
            .finish()
    }
}
