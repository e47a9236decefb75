//! vp-registry: extension-based dispatch from files to proxy builders.
//!
//! Provides:
//! - `ProxyBuilder`: constructs proxies for a set of file extensions
//! - `ProxyRegistry`: per-extension builder lists with most-recent-wins dispatch
//! - `LayoutStrategy` / `LayoutBuilder`: file types declared as data instead of code

pub mod builder;
pub mod layout;
pub mod registry;

pub use builder::{ProxyBuilder, extension_of, normalize_extension};
pub use layout::{LayoutBuilder, LayoutStrategy, PropertySpec, ProxyLayout};
pub use registry::ProxyRegistry;

use vp_core::VpError;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("Missing argument: {what}")]
    MissingArgument { what: &'static str },

    #[error("Unsupported input: {uri}")]
    UnsupportedInput { uri: String },

    #[error("Failed to build proxy: {0}")]
    Build(#[from] VpError),
}

impl From<RegistryError> for VpError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::MissingArgument { what } => VpError::MissingArgument { what },
            RegistryError::UnsupportedInput { uri } => VpError::Unsupported {
                message: format!("no proxy builder for {uri}"),
            },
            RegistryError::Build(e) => e,
        }
    }
}
