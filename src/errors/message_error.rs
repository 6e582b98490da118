use thiserror::Error;

// custom error, based on 'thiserror' library
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MessageError {
    #[error("{0} is empty")]
    EmptyField(&'static str),
}
