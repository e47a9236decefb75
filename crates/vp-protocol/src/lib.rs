//! vp-protocol: typed remote calls for the rendering server.
//!
//! Provides:
//! - Method names and argument shapes for every remote call a proxy issues
//! - Response decoding with explicit failures for malformed replies
//! - `MemoryServer`, an in-process server for tests and offline sessions

pub mod calls;
pub mod memory;
pub mod methods;
pub mod types;

pub use calls::*;
pub use memory::{MemoryServer, ObjectFixture, PropertyFixture, RecordedCall, ServerFixture};
pub use types::*;

use vp_core::{TransportError, VpError};

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Server rejected `{method}`: {message}")]
    ErrorResponse { method: String, message: String },

    #[error("Malformed response to `{method}`: {what}")]
    Malformed { method: String, what: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    pub(crate) fn malformed(method: &str, what: impl Into<String>) -> Self {
        ProtocolError::Malformed {
            method: method.to_string(),
            what: what.into(),
        }
    }
}

impl From<ProtocolError> for VpError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Transport(e) => VpError::Transport(e),
            ProtocolError::Json(e) => VpError::Json(e),
            other => VpError::Remote {
                message: other.to_string(),
            },
        }
    }
}
