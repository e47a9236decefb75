//! Hooks that declare what a file type exposes.

use vp_core::ProxyIds;

use crate::property::{Property, PropertyKind};

/// Index of the representation type in the representation object's property list.
pub const REPRESENTATION_INDEX: usize = 1;

/// Declares the features and properties of one kind of file.
///
/// Called on the proxy's worker every time the file is (re)opened, once the
/// server has assigned the ids. The returned properties are unbound; the
/// proxy binds them to the new connection.
pub trait ProxyStrategy: Send + 'static {
    /// Properties that can color the view, in registration order.
    fn find_features(&self, _ids: &ProxyIds) -> Vec<Property> {
        Vec::new()
    }

    fn find_properties(&self, _ids: &ProxyIds) -> Vec<Property> {
        Vec::new()
    }
}

/// Representation type ("Surface", "Wireframe", ...) of the opened file.
pub fn representation_property(ids: &ProxyIds) -> Property {
    Property::new(
        "Representation",
        REPRESENTATION_INDEX,
        PropertyKind::SingleChoice,
        ids.representation,
    )
}

/// Strategy for files with no declared features: exposes only the representation.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseStrategy;

impl ProxyStrategy for BaseStrategy {
    fn find_properties(&self, ids: &ProxyIds) -> Vec<Property> {
        vec![representation_property(ids)]
    }
}
