//! Remotely-backed properties.
//!
//! A property mirrors one entry of a remote object's property list. Its
//! allowed values and current selection are cached locally and refreshed
//! whenever the property is bound to a new connection. Properties that can
//! color a view (features) carry a [`Coloring`] payload.

use core::fmt;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vp_core::{Connection, RemoteId};
use vp_protocol::{ColorLocation, ColorMode, PropertyUpdate, ProxyObject};

/// Type discipline of a property's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    /// Any value accepted by the property's validator.
    FreeForm,
    /// Exactly one of the allowed values.
    SingleChoice,
    /// Any subset of the allowed values.
    MultiChoice,
}

/// How a feature is applied when it colors a view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coloring {
    #[serde(default)]
    pub mode: Option<ColorMode>,
    #[serde(default)]
    pub location: Option<ColorLocation>,
}

impl Coloring {
    pub fn new(mode: ColorMode, location: ColorLocation) -> Self {
        Self {
            mode: Some(mode),
            location: Some(location),
        }
    }

    /// Only a fully specified coloring names an array in color-by requests.
    pub fn can_color_by(&self) -> bool {
        self.mode.is_some() && self.location.is_some()
    }

    pub fn mode_or_default(&self) -> ColorMode {
        self.mode.unwrap_or(ColorMode::Solid)
    }

    pub fn location_or_default(&self) -> ColorLocation {
        self.location.unwrap_or(ColorLocation::Points)
    }
}

/// Validation hook for free-form values.
#[derive(Clone)]
pub struct Validator(Arc<dyn Fn(&str) -> bool + Send + Sync>);

impl Validator {
    pub fn new(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn check(&self, value: &str) -> bool {
        (self.0)(value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    index: usize,
    kind: PropertyKind,
    remote_id: RemoteId,
    coloring: Option<Coloring>,
    validator: Option<Validator>,

    connection: Option<Connection>,
    remote_name: Option<String>,
    allowed: BTreeSet<String>,
    value: Option<String>,
    values: Vec<String>,
}

impl Property {
    /// Create an unbound property.
    ///
    /// # Arguments
    ///
    /// * `name` - Local name, unique within its proxy
    /// * `index` - Position in the remote object's `ui`/`properties` lists
    /// * `kind` - Value discipline
    /// * `remote_id` - Id of the remote object that owns the property
    pub fn new(
        name: impl Into<String>,
        index: usize,
        kind: PropertyKind,
        remote_id: RemoteId,
    ) -> Self {
        Self {
            name: name.into(),
            index,
            kind,
            remote_id,
            coloring: None,
            validator: None,
            connection: None,
            remote_name: None,
            allowed: BTreeSet::new(),
            value: None,
            values: Vec::new(),
        }
    }

    /// Create a feature: a property that can color a view.
    pub fn feature(
        name: impl Into<String>,
        index: usize,
        kind: PropertyKind,
        remote_id: RemoteId,
        coloring: Coloring,
    ) -> Self {
        Self::new(name, index, kind, remote_id).with_coloring(coloring)
    }

    pub fn with_coloring(mut self, coloring: Coloring) -> Self {
        self.coloring = Some(coloring);
        self
    }

    /// Install the validation hook used by free-form properties.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    pub fn remote_id(&self) -> RemoteId {
        self.remote_id
    }

    /// Name of the property inside the remote object, once discovered.
    pub fn remote_name(&self) -> Option<&str> {
        self.remote_name.as_deref()
    }

    pub fn coloring(&self) -> Option<&Coloring> {
        self.coloring.as_ref()
    }

    pub fn is_feature(&self) -> bool {
        self.coloring.is_some()
    }

    pub fn can_color_by(&self) -> bool {
        self.coloring.is_some_and(|c| c.can_color_by())
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    /// Cached single value. Always `None` for multi-choice properties.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Cached selection of a multi-choice property; empty for other kinds.
    pub fn values(&self) -> Vec<String> {
        match self.kind {
            PropertyKind::MultiChoice => self.values.clone(),
            _ => Vec::new(),
        }
    }

    /// Copy of the cached allowed values.
    pub fn allowed_values(&self) -> BTreeSet<String> {
        self.allowed.clone()
    }

    /// First selected value: the head of a multi-choice selection or the single value.
    pub fn selection(&self) -> Option<String> {
        match self.kind {
            PropertyKind::MultiChoice => self.values.first().cloned(),
            _ => self.value.clone(),
        }
    }

    pub fn value_allowed(&self, value: &str) -> bool {
        match self.kind {
            PropertyKind::FreeForm => self.validate(value),
            _ => self.allowed.contains(value),
        }
    }

    fn validate(&self, value: &str) -> bool {
        self.validator.as_ref().is_none_or(|v| v.check(value))
    }

    fn reset(&mut self) {
        self.remote_name = None;
        self.allowed.clear();
        self.value = None;
        self.values.clear();
    }

    /// Bind the property to a connection and reload its cached state.
    ///
    /// Binding the connection that is already bound does nothing. A missing or
    /// non-live connection clears the cache. Returns whether the bound
    /// connection changed.
    pub fn bind(&mut self, connection: Option<&Connection>) -> bool {
        if let (Some(new), Some(current)) = (connection, self.connection.as_ref())
            && new == current
        {
            return false;
        }

        let had_connection = self.connection.is_some();
        self.reset();
        self.connection = None;

        match connection.filter(|c| c.is_connected()) {
            Some(connection) => {
                self.connection = Some(connection.clone());
                self.refresh(connection);
                true
            }
            None => had_connection,
        }
    }

    fn refresh(&mut self, connection: &Connection) {
        let object = match vp_protocol::get_proxy(connection, self.remote_id) {
            Ok(object) => object,
            Err(e) => {
                warn!(property = %self.name, error = %e, "failed to fetch remote object");
                return;
            }
        };
        self.load(&object);
    }

    fn load(&mut self, object: &ProxyObject) {
        match object.property_name(self.index) {
            Ok(name) => self.remote_name = Some(name),
            Err(e) => warn!(property = %self.name, error = %e, "remote property name unavailable"),
        }
        match object.allowed_values(self.index) {
            Ok(values) => self.allowed.extend(values),
            Err(e) => debug!(property = %self.name, error = %e, "no allowed values listed"),
        }
        if self.kind == PropertyKind::MultiChoice {
            match object.values(self.index) {
                Ok(values) => {
                    for value in values {
                        if !self.values.contains(&value) {
                            self.values.push(value);
                        }
                    }
                }
                Err(e) => warn!(property = %self.name, error = %e, "current values unavailable"),
            }
        } else {
            match object.value(self.index) {
                Ok(value) => self.value = value,
                Err(e) => warn!(property = %self.name, error = %e, "current value unavailable"),
            }
        }
    }

    /// Select a value and push it to the server.
    ///
    /// Rejected without a remote call when the value is not allowed or is
    /// already selected. Local state is updated before the push and is kept
    /// even if the server rejects it. Returns whether the push succeeded.
    pub fn set_value(&mut self, value: &str) -> bool {
        let changed = match self.kind {
            PropertyKind::FreeForm => {
                if self.value.as_deref() != Some(value) && self.validate(value) {
                    self.value = Some(value.to_string());
                    true
                } else {
                    false
                }
            }
            PropertyKind::SingleChoice => {
                if self.allowed.contains(value) && self.value.as_deref() != Some(value) {
                    self.value = Some(value.to_string());
                    true
                } else {
                    false
                }
            }
            PropertyKind::MultiChoice => {
                if self.allowed.contains(value) && self.values != [value] {
                    self.values = vec![value.to_string()];
                    true
                } else {
                    false
                }
            }
        };

        changed && self.push()
    }

    /// Replace the selection of a multi-choice property.
    ///
    /// Values outside the allowed set are dropped. Pushes only if the
    /// resulting selection differs (as a set) from the previous one.
    pub fn set_values(&mut self, values: &[String]) -> bool {
        if self.kind != PropertyKind::MultiChoice {
            return false;
        }

        let requested: Vec<&String> = values.iter().filter(|v| self.allowed.contains(*v)).collect();
        let previous: BTreeSet<String> = self.values.iter().cloned().collect();

        let mut selection: Vec<String> = self
            .values
            .iter()
            .filter(|v| requested.contains(v))
            .cloned()
            .collect();
        for value in requested {
            if !selection.contains(value) {
                selection.push(value.clone());
            }
        }

        let next: BTreeSet<String> = selection.iter().cloned().collect();
        if next == previous {
            return false;
        }
        self.values = selection;
        self.push()
    }

    /// Deselect everything and push the cleared state.
    ///
    /// Returns false without a remote call when nothing was selected.
    pub fn clear(&mut self) -> bool {
        let had_selection = match self.kind {
            PropertyKind::MultiChoice => !self.values.is_empty(),
            _ => self.value.is_some(),
        };
        if !had_selection {
            return false;
        }
        self.value = None;
        self.values.clear();
        self.push()
    }

    fn push(&self) -> bool {
        let (Some(connection), Some(remote_name)) =
            (self.connection.as_ref(), self.remote_name.as_deref())
        else {
            debug!(property = %self.name, "property is not bound; update not sent");
            return false;
        };

        let update = match self.kind {
            PropertyKind::MultiChoice => {
                PropertyUpdate::multi(self.remote_id, remote_name, &self.values)
            }
            _ => PropertyUpdate::single(self.remote_id, remote_name, self.value.as_deref()),
        };

        match vp_protocol::update_properties(connection, &[update]) {
            Ok(reply) if reply.success => true,
            Ok(reply) => {
                debug!(
                    property = %self.name,
                    errors = ?reply.error_list,
                    "server rejected property update"
                );
                false
            }
            Err(e) => {
                warn!(property = %self.name, error = %e, "property update failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vp_core::ProxyIds;
    use vp_protocol::{MemoryServer, ObjectFixture, PropertyFixture, ServerFixture, methods};

    fn server() -> Arc<MemoryServer> {
        let fixture = ServerFixture::new()
            .with_file("/data/wave.e", ProxyIds::new(1, 3, 2))
            .with_object(
                2,
                ObjectFixture::new()
                    .with_property(PropertyFixture::choice(
                        "Representation",
                        "Surface",
                        &["Surface", "Wireframe", "Points"],
                    ))
                    .with_property(PropertyFixture::multi(
                        "PointArrays",
                        &["pressure"],
                        &["pressure", "velocity", "density"],
                    ))
                    .with_property(PropertyFixture::free("Label", "wave")),
            );
        Arc::new(MemoryServer::new(fixture))
    }

    fn bound(server: &Arc<MemoryServer>, property: Property) -> Property {
        let connection = Connection::connected("memory", server.clone());
        let mut property = property;
        assert!(property.bind(Some(&connection)));
        property
    }

    fn representation(server: &Arc<MemoryServer>) -> Property {
        bound(server, Property::new("Representation", 0, PropertyKind::SingleChoice, 2))
    }

    fn arrays(server: &Arc<MemoryServer>) -> Property {
        bound(server, Property::new("Arrays", 1, PropertyKind::MultiChoice, 2))
    }

    #[test]
    fn bind_loads_remote_state() {
        let server = server();
        let property = representation(&server);
        assert_eq!(property.remote_name(), Some("Representation"));
        assert_eq!(property.value(), Some("Surface"));
        assert_eq!(property.allowed_values().len(), 3);
        assert!(property.values().is_empty());

        let arrays = arrays(&server);
        assert_eq!(arrays.remote_name(), Some("PointArrays"));
        assert_eq!(arrays.values(), vec!["pressure".to_string()]);
        assert_eq!(arrays.value(), None);
    }

    #[test]
    fn bind_same_connection_is_noop() {
        let server = server();
        let connection = Connection::connected("memory", server.clone());
        let mut property = Property::new("Representation", 0, PropertyKind::SingleChoice, 2);

        assert!(property.bind(Some(&connection)));
        let fetches = server.call_count(methods::PROXY_GET);
        assert!(!property.bind(Some(&connection.clone())));
        assert_eq!(server.call_count(methods::PROXY_GET), fetches);
    }

    #[test]
    fn bind_none_clears_state() {
        let server = server();
        let mut property = representation(&server);

        assert!(property.bind(None));
        assert_eq!(property.value(), None);
        assert!(property.allowed_values().is_empty());
        assert!(property.remote_name().is_none());

        // Nothing bound any more, so unbinding again changes nothing.
        assert!(!property.bind(None));
    }

    #[test]
    fn bind_disconnected_connection_is_not_live() {
        let server = server();
        let connection = Connection::new("memory", server.clone());
        let mut property = Property::new("Representation", 0, PropertyKind::SingleChoice, 2);

        assert!(!property.bind(Some(&connection)));
        assert!(property.connection().is_none());
        assert_eq!(server.call_count(methods::PROXY_GET), 0);
    }

    #[test]
    fn set_value_pushes_allowed_changes_only() {
        let server = server();
        let mut property = representation(&server);

        assert!(!property.set_value("Volume"));
        assert!(!property.set_value("Surface"));
        assert_eq!(server.call_count(methods::PROXY_UPDATE), 0);

        assert!(property.set_value("Wireframe"));
        assert_eq!(property.value(), Some("Wireframe"));
        assert_eq!(
            server.property_value(2, "Representation"),
            Some(serde_json::json!("Wireframe"))
        );

        assert!(!property.set_value("Wireframe"));
        assert!(!property.set_value("Wireframe"));
        assert_eq!(server.call_count(methods::PROXY_UPDATE), 1);
    }

    #[test]
    fn rejected_push_keeps_optimistic_value() {
        let server = server();
        let mut property = representation(&server);
        server.reject_updates(true);

        assert!(!property.set_value("Points"));
        assert_eq!(property.value(), Some("Points"));
        assert_eq!(
            server.property_value(2, "Representation"),
            Some(serde_json::json!("Surface"))
        );
    }

    #[test]
    fn set_values_drops_disallowed_entries() {
        let server = server();
        let mut arrays = arrays(&server);

        let requested: Vec<String> = ["velocity", "vorticity", "pressure"]
            .into_iter()
            .map(String::from)
            .collect();
        assert!(arrays.set_values(&requested));
        assert_eq!(arrays.values(), vec!["pressure".to_string(), "velocity".to_string()]);

        // Same set in a different order is not a change.
        let reordered = vec!["pressure".to_string(), "velocity".to_string()];
        assert!(!arrays.set_values(&reordered));
        assert_eq!(server.call_count(methods::PROXY_UPDATE), 1);
    }

    #[test]
    fn set_values_on_single_choice_is_rejected() {
        let server = server();
        let mut property = representation(&server);
        assert!(!property.set_values(&["Points".to_string()]));
        assert_eq!(property.value(), Some("Surface"));
    }

    #[test]
    fn multi_choice_set_value_replaces_selection() {
        let server = server();
        let mut arrays = arrays(&server);
        assert!(arrays.set_value("density"));
        assert_eq!(arrays.values(), vec!["density".to_string()]);
        assert!(!arrays.set_value("density"));
    }

    #[test]
    fn free_form_uses_validator() {
        let server = server();
        let mut label = bound(
            &server,
            Property::new("Label", 2, PropertyKind::FreeForm, 2)
                .with_validator(Validator::new(|v| !v.trim().is_empty())),
        );

        assert!(label.value_allowed("crest"));
        assert!(!label.value_allowed("  "));
        assert!(!label.set_value(" "));
        assert!(label.set_value("crest"));
        assert_eq!(label.value(), Some("crest"));
    }

    #[test]
    fn clear_pushes_only_when_selected() {
        let server = server();
        let mut arrays = arrays(&server);
        assert!(arrays.clear());
        assert!(arrays.values().is_empty());
        assert!(!arrays.clear());
        assert_eq!(server.call_count(methods::PROXY_UPDATE), 1);
        assert_eq!(server.property_value(2, "PointArrays"), Some(serde_json::json!([])));
    }

    #[test]
    fn unbound_property_cannot_push() {
        let mut property = Property::new("Representation", 0, PropertyKind::FreeForm, 2);
        assert!(!property.set_value("Surface"));
        // The local value is still updated.
        assert_eq!(property.value(), Some("Surface"));
    }

    #[test]
    fn coloring_requires_mode_and_location() {
        let partial = Coloring {
            mode: Some(ColorMode::Array),
            location: None,
        };
        assert!(!partial.can_color_by());
        assert_eq!(partial.location_or_default(), ColorLocation::Points);

        let feature = Property::feature(
            "Arrays",
            1,
            PropertyKind::MultiChoice,
            2,
            Coloring::new(ColorMode::Array, ColorLocation::Cells),
        );
        assert!(feature.is_feature());
        assert!(feature.can_color_by());
        assert!(!Property::new("Representation", 0, PropertyKind::SingleChoice, 2).is_feature());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use vp_core::ProxyIds;
    use vp_protocol::{MemoryServer, ObjectFixture, PropertyFixture, ServerFixture};

    const ALLOWED: [&str; 5] = ["a", "b", "c", "d", "e"];

    fn bound(kind: PropertyKind, fixture: PropertyFixture) -> Property {
        let fixture = ServerFixture::new()
            .with_file("/f.e", ProxyIds::new(1, 3, 2))
            .with_object(2, ObjectFixture::new().with_property(fixture));
        let server = Arc::new(MemoryServer::new(fixture));
        let connection = Connection::connected("memory", server);
        let mut property = Property::new("p", 0, kind, 2);
        property.bind(Some(&connection));
        property
    }

    proptest! {
        #[test]
        fn single_choice_accepts_exactly_new_allowed_values(candidate in "[a-g]") {
            let mut property = bound(
                PropertyKind::SingleChoice,
                PropertyFixture::choice("p", "a", &ALLOWED),
            );
            let expected = ALLOWED.contains(&candidate.as_str()) && candidate != "a";
            prop_assert_eq!(property.set_value(&candidate), expected);
            if expected {
                prop_assert_eq!(property.value(), Some(candidate.as_str()));
            } else {
                prop_assert_eq!(property.value(), Some("a"));
            }
        }

        #[test]
        fn multi_choice_keeps_allowed_intersection(
            requested in prop::collection::vec("[a-g]", 0..8),
        ) {
            let mut property = bound(
                PropertyKind::MultiChoice,
                PropertyFixture::multi("p", &["a"], &ALLOWED),
            );
            property.set_values(&requested);

            let expected: BTreeSet<String> = requested
                .iter()
                .filter(|v| ALLOWED.contains(&v.as_str()))
                .cloned()
                .collect();
            let actual: BTreeSet<String> = property.values().into_iter().collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
