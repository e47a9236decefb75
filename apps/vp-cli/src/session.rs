//! Session files: builders plus the server the CLI talks to.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vp_core::{Connection, ProxyOptions, VpError};
use vp_protocol::{MemoryServer, ServerFixture};
use vp_proxy::Proxy;
use vp_registry::{LayoutBuilder, ProxyLayout, ProxyRegistry, RegistryError};

pub type CliResult<T> = Result<T, CliError>;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid session file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Proxy(#[from] VpError),

    #[error("Expected name=value, got `{arg}`")]
    InvalidAssignment { arg: String },

    #[error("Server could not open {uri}")]
    OpenFailed { uri: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderConfig {
    pub name: String,
    pub extensions: Vec<String>,
    #[serde(default)]
    pub layout: ProxyLayout,
    /// Overrides the session-wide options for this builder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ProxyOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub options: ProxyOptions,
    #[serde(default)]
    pub builders: Vec<BuilderConfig>,
    #[serde(default)]
    pub server: ServerFixture,
}

impl SessionConfig {
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&text)?;
        Ok(config)
    }

    /// Registry with every builder registered in file order.
    pub fn registry(&self) -> ProxyRegistry {
        let registry = ProxyRegistry::new();
        for builder in &self.builders {
            let options = builder.options.unwrap_or(self.options);
            let layout_builder = LayoutBuilder::new(
                builder.name.clone(),
                &builder.extensions,
                builder.layout.clone(),
            )
            .with_options(options);
            if !registry.register(Arc::new(layout_builder)) {
                debug!(builder = %builder.name, "builder has no usable extensions");
            }
        }
        registry
    }

    /// Start the in-process server and return a live connection to it.
    pub fn connect(&self) -> (Arc<MemoryServer>, Connection) {
        let server = Arc::new(MemoryServer::new(self.server.clone()));
        let connection = Connection::connected("memory", server.clone());
        (server, connection)
    }
}

/// Create the proxy for `file` and open it on a fresh server.
pub fn open_proxy(config: &SessionConfig, file: &Path) -> CliResult<(Arc<MemoryServer>, Proxy)> {
    let proxy = config.registry().create_proxy(file)?;
    let (server, connection) = config.connect();
    if !proxy.open(connection).wait()? {
        return Err(CliError::OpenFailed {
            uri: file.display().to_string(),
        });
    }
    Ok((server, proxy))
}

/// Split `name=value` at the first `=`.
pub fn parse_assignment(arg: &str) -> CliResult<(String, String)> {
    match arg.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::InvalidAssignment {
            arg: arg.to_string(),
        }),
    }
}
