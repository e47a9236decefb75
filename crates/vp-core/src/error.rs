use thiserror::Error;

use crate::connection::TransportError;

pub type VpResult<T> = Result<T, VpError>;

#[derive(Error, Debug)]
pub enum VpError {
    #[error("Missing argument: {what}")]
    MissingArgument { what: &'static str },

    #[error("Unsupported: {message}")]
    Unsupported { message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Remote error: {message}")]
    Remote { message: String },

    #[error("Request queue closed before the request completed")]
    QueueClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
