use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration { input: String, reason: String },

    #[error("unknown resource kind: {0}")]
    UnknownResource(String),
}
