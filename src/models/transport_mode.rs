use std::fmt;
use std::str::FromStr;

use crate::errors::params_error::ParamsError;

/// How the broker connection is carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// plain TCP, `amqp://`
    #[default]
    Plain,
    /// TLS, `amqps://`
    Secure,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Plain => "plain",
            TransportMode::Secure => "secure",
        }
    }
}

impl FromStr for TransportMode {
    type Err = ParamsError;

    // "stream" and "ssl" are accepted as aliases of "plain" and "secure"
    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        match mode.trim().to_lowercase().as_str() {
            "plain" | "stream" => Ok(TransportMode::Plain),
            "secure" | "ssl" => Ok(TransportMode::Secure),
            _ => Err(ParamsError::InvalidConnectionMode(mode.to_string())),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::params_error::ParamsError;
    use crate::models::transport_mode::TransportMode;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_transport_modes_and_aliases() {
        assert_eq!("plain".parse::<TransportMode>(), Ok(TransportMode::Plain));
        assert_eq!("stream".parse::<TransportMode>(), Ok(TransportMode::Plain));
        assert_eq!("secure".parse::<TransportMode>(), Ok(TransportMode::Secure));
        assert_eq!("SSL".parse::<TransportMode>(), Ok(TransportMode::Secure));
        assert_eq!(TransportMode::default(), TransportMode::Plain);
    }

    #[test]
    fn wrong_transport_mode() {
        assert_eq!(
            "invalid_mode".parse::<TransportMode>(),
            Err(ParamsError::InvalidConnectionMode("invalid_mode".to_string()))
        );
        assert_eq!(
            "".parse::<TransportMode>(),
            Err(ParamsError::InvalidConnectionMode("".to_string()))
        );
    }

    #[test]
    fn check_transport_mode_display() {
        assert_eq!(TransportMode::Secure.to_string(), "secure");
        assert_eq!(TransportMode::Plain.to_string(), "plain");
    }
}
