//! vp-proxy: local stand-in for one file opened on a remote rendering server.
//!
//! Provides:
//! - `Property`: a remotely-backed, typed setting with a cached allowed set
//! - Feature coloring metadata carried by properties that can color a view
//! - `ProxyStrategy`: hooks that declare the features and properties of a file type
//! - `RequestQueue`: the single worker every mutating call is serialized through
//! - `Proxy`: the asynchronous open / set-feature / set-property / set-timestep API
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vp_core::{Connection, ProxyIds, ProxyOptions};
//! use vp_protocol::{MemoryServer, ObjectFixture, PropertyFixture, ServerFixture};
//! use vp_proxy::{BaseStrategy, Proxy};
//!
//! let fixture = ServerFixture::new()
//!     .with_file("/data/wave.e", ProxyIds::new(1, 3, 2))
//!     .with_object(1, ObjectFixture::new().with_times(&[0.0, 1.0]))
//!     .with_object(
//!         2,
//!         ObjectFixture::new()
//!             .with_property(PropertyFixture::choice("Opacity", "1", &["1"]))
//!             .with_property(PropertyFixture::choice(
//!                 "Representation",
//!                 "Surface",
//!                 &["Surface", "Wireframe"],
//!             )),
//!     );
//! let server = Arc::new(MemoryServer::new(fixture));
//! let connection = Connection::connected("memory", server);
//!
//! let proxy =
//!     Proxy::new("/data/wave.e", Box::new(BaseStrategy), ProxyOptions::default()).unwrap();
//! assert!(proxy.open(connection).wait().unwrap());
//! assert!(proxy.set_property("Representation", "Wireframe").wait().unwrap());
//! assert_eq!(proxy.property("Representation").as_deref(), Some("Wireframe"));
//! ```

pub mod property;
pub mod proxy;
pub mod queue;
pub mod strategy;

// Re-exports for ergonomics
pub use property::{Coloring, Property, PropertyKind, Validator};
pub use proxy::{ActiveFeature, PropertyView, Proxy, ProxyView};
pub use queue::{RequestHandle, RequestQueue};
pub use strategy::{BaseStrategy, ProxyStrategy, REPRESENTATION_INDEX, representation_property};
pub use vp_protocol::{ColorLocation, ColorMode};
