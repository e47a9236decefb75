//! vp-core: shared foundation for vizproxy.
//!
//! Contains:
//! - error (shared error types)
//! - ids (remote object handles for one opened file)
//! - connection (live handle to a remote rendering server)
//! - options (per-proxy rendering options)

pub mod connection;
pub mod error;
pub mod ids;
pub mod options;

// Re-exports: nice ergonomics for downstream crates
pub use connection::{Connection, ConnectionState, RemoteClient, TransportError};
pub use error::{VpError, VpResult};
pub use ids::*;
pub use options::ProxyOptions;
