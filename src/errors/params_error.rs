use thiserror::Error;

// custom error, based on 'thiserror' library
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParamsError {
    #[error("'{0}' is missing")]
    MissingParameter(&'static str),
    #[error("'{field}' is invalid: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
    #[error("invalid connection mode given: '{0}'")]
    InvalidConnectionMode(String),
    #[error("method {0} is not found")]
    InvalidTarget(String),
    #[error("'connection' is invalid")]
    InvalidConnection,
}
