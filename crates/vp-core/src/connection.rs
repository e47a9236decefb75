//! Live handle to a remote rendering server.
//!
//! The server is reached through a single blocking request/response
//! function ([`RemoteClient::call`]). A [`Connection`] wraps that function
//! together with a lifecycle state and a stable identity so that proxies can
//! tell whether they are already bound to it.

use core::fmt;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use uuid::Uuid;

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Failure to complete a remote call at the transport level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection is not established")]
    NotConnected,

    #[error("request `{method}` failed: {message}")]
    Request { method: String, message: String },

    #[error("request `{method}` was interrupted")]
    Interrupted { method: String },
}

/// Opaque request/response function exposed by a remote server.
///
/// Implementations block until the response arrives.
pub trait RemoteClient: Send + Sync {
    fn call(&self, method: &str, args: Value) -> Result<Value, TransportError>;
}

struct Inner {
    id: Uuid,
    name: String,
    state: Mutex<ConnectionState>,
    client: Arc<dyn RemoteClient>,
}

/// Shared, cheaply cloned connection handle.
///
/// Two handles are the same connection iff they share an id.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Create a disconnected handle around a client.
    pub fn new(name: impl Into<String>, client: Arc<dyn RemoteClient>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                name: name.into(),
                state: Mutex::new(ConnectionState::Disconnected),
                client,
            }),
        }
    }

    /// Create a handle that is already connected.
    pub fn connected(name: impl Into<String>, client: Arc<dyn RemoteClient>) -> Self {
        let connection = Self::new(name, client);
        connection.set_state(ConnectionState::Connected);
        connection
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> ConnectionState {
        match self.inner.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set_state(&self, state: ConnectionState) {
        match self.inner.state.lock() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Issue a remote call. Fails without touching the client unless connected.
    pub fn call(&self, method: &str, args: Value) -> Result<Value, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.inner.client.call(method, args)
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}
