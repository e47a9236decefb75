//! File types declared as data.
//!
//! A [`ProxyLayout`] lists where each feature and property lives in the
//! remote object graph. [`LayoutStrategy`] turns it into properties when a
//! file is opened, and [`LayoutBuilder`] registers it for a set of
//! extensions.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vp_core::{ObjectRole, ProxyIds, ProxyOptions, VpResult};
use vp_proxy::{
    Coloring, Property, PropertyKind, Proxy, ProxyStrategy, Validator, representation_property,
};

use crate::builder::{ProxyBuilder, normalize_extension};

fn default_object() -> ObjectRole {
    ObjectRole::Representation
}

fn default_true() -> bool {
    true
}

/// Location and type of one property in the remote object graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    /// Index into the owning object's `ui`/`properties` lists.
    pub index: usize,
    pub kind: PropertyKind,
    #[serde(default = "default_object")]
    pub object: ObjectRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coloring: Option<Coloring>,
    /// Inclusive numeric bounds for free-form values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<(f64, f64)>,
}

impl PropertySpec {
    pub fn new(name: impl Into<String>, index: usize, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            index,
            kind,
            object: default_object(),
            coloring: None,
            range: None,
        }
    }

    pub fn on(mut self, object: ObjectRole) -> Self {
        self.object = object;
        self
    }

    pub fn colored(mut self, coloring: Coloring) -> Self {
        self.coloring = Some(coloring);
        self
    }

    pub fn within(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    /// Unbound property for an opened file.
    pub fn to_property(&self, ids: &ProxyIds) -> Property {
        let remote_id = ids.get(self.object);
        let mut property = Property::new(self.name.clone(), self.index, self.kind, remote_id);
        if let Some(coloring) = self.coloring {
            property = property.with_coloring(coloring);
        }
        if let Some((min, max)) = self.range {
            property = property.with_validator(Validator::new(move |value| {
                value
                    .trim()
                    .parse::<f64>()
                    .is_ok_and(|x| (min..=max).contains(&x))
            }));
        }
        property
    }

    fn to_feature(&self, ids: &ProxyIds) -> Property {
        let coloring = self.coloring.unwrap_or_default();
        self.to_property(ids).with_coloring(coloring)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyLayout {
    /// Properties that can color the view, in activation order.
    #[serde(default)]
    pub features: Vec<PropertySpec>,
    #[serde(default)]
    pub properties: Vec<PropertySpec>,
    /// Expose the representation type ahead of the declared properties.
    #[serde(default = "default_true")]
    pub include_representation: bool,
}

impl Default for ProxyLayout {
    fn default() -> Self {
        Self {
            features: Vec::new(),
            properties: Vec::new(),
            include_representation: true,
        }
    }
}

impl ProxyLayout {
    pub fn with_feature(mut self, spec: PropertySpec) -> Self {
        self.features.push(spec);
        self
    }

    pub fn with_property(mut self, spec: PropertySpec) -> Self {
        self.properties.push(spec);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayoutStrategy {
    layout: ProxyLayout,
}

impl LayoutStrategy {
    pub fn new(layout: ProxyLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ProxyLayout {
        &self.layout
    }
}

impl ProxyStrategy for LayoutStrategy {
    fn find_features(&self, ids: &ProxyIds) -> Vec<Property> {
        self.layout.features.iter().map(|spec| spec.to_feature(ids)).collect()
    }

    fn find_properties(&self, ids: &ProxyIds) -> Vec<Property> {
        let representation = self
            .layout
            .include_representation
            .then(|| representation_property(ids));
        representation
            .into_iter()
            .chain(self.layout.properties.iter().map(|spec| spec.to_property(ids)))
            .collect()
    }
}

/// Builder for proxies described by a [`ProxyLayout`].
#[derive(Debug, Clone)]
pub struct LayoutBuilder {
    name: String,
    extensions: BTreeSet<String>,
    layout: ProxyLayout,
    options: ProxyOptions,
}

impl LayoutBuilder {
    pub fn new<I, S>(name: impl Into<String>, extensions: I, layout: ProxyLayout) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            extensions: extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
            layout,
            options: ProxyOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ProxyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn layout(&self) -> &ProxyLayout {
        &self.layout
    }

    pub fn options(&self) -> &ProxyOptions {
        &self.options
    }
}

impl ProxyBuilder for LayoutBuilder {
    fn name(&self) -> &str {
        &self.name
    }

    fn extensions(&self) -> BTreeSet<String> {
        self.extensions.clone()
    }

    fn build(&self, uri: &Path) -> VpResult<Proxy> {
        Proxy::new(
            uri,
            Box::new(LayoutStrategy::new(self.layout.clone())),
            self.options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vp_proxy::{ColorLocation, ColorMode, REPRESENTATION_INDEX};

    fn ids() -> ProxyIds {
        ProxyIds::new(10, 30, 20)
    }

    #[test]
    fn specs_resolve_remote_object_by_role() {
        let spec = PropertySpec::new("Time Scale", 4, PropertyKind::FreeForm).on(ObjectRole::File);
        let property = spec.to_property(&ids());
        assert_eq!(property.remote_id(), 10);
        assert_eq!(property.index(), 4);
        assert!(!property.is_feature());

        let spec = PropertySpec::new("Opacity", 0, PropertyKind::FreeForm);
        assert_eq!(spec.to_property(&ids()).remote_id(), 20);
    }

    #[test]
    fn range_installs_a_validator() {
        let property = PropertySpec::new("Opacity", 0, PropertyKind::FreeForm)
            .within(0.0, 1.0)
            .to_property(&ids());
        assert!(property.value_allowed("0.5"));
        assert!(property.value_allowed(" 1 "));
        assert!(!property.value_allowed("1.5"));
        assert!(!property.value_allowed("opaque"));
    }

    #[test]
    fn strategy_declares_features_and_representation() {
        let layout = ProxyLayout::default()
            .with_feature(
                PropertySpec::new("Point Data", 2, PropertyKind::MultiChoice)
                    .colored(Coloring::new(ColorMode::Array, ColorLocation::Points)),
            )
            .with_feature(PropertySpec::new("Blocks", 5, PropertyKind::MultiChoice))
            .with_property(PropertySpec::new("Opacity", 0, PropertyKind::FreeForm));
        let strategy = LayoutStrategy::new(layout);

        let features = strategy.find_features(&ids());
        assert_eq!(features.len(), 2);
        assert!(features.iter().all(Property::is_feature));
        assert!(features[0].can_color_by());
        assert!(!features[1].can_color_by());

        let properties = strategy.find_properties(&ids());
        let names: Vec<&str> = properties.iter().map(Property::name).collect();
        assert_eq!(names, vec!["Representation", "Opacity"]);
        assert_eq!(properties[0].index(), REPRESENTATION_INDEX);
    }

    #[test]
    fn representation_can_be_left_out() {
        let layout = ProxyLayout {
            include_representation: false,
            ..ProxyLayout::default()
        };
        assert!(LayoutStrategy::new(layout).find_properties(&ids()).is_empty());
    }

    #[test]
    fn builder_normalizes_extensions() {
        let builder = LayoutBuilder::new("exodus", [".E", "EXO", ""], ProxyLayout::default());
        let extensions: Vec<String> = builder.extensions().into_iter().collect();
        assert_eq!(extensions, vec!["e", "exo"]);
        assert_eq!(builder.name(), "exodus");
        assert!(builder.supports(Path::new("/data/CAN.Exo")));
    }

    #[test]
    fn layout_loads_from_yaml() {
        let yaml = r#"
features:
  - name: Point Data
    index: 2
    kind: multi_choice
    coloring: { mode: ARRAY, location: points }
properties:
  - name: Opacity
    index: 0
    kind: free_form
    range: [0.0, 1.0]
  - name: Time Scale
    index: 1
    kind: free_form
    object: file
"#;
        let layout: ProxyLayout = serde_yaml::from_str(yaml).unwrap();
        assert!(layout.include_representation);
        assert_eq!(
            layout.features[0].coloring,
            Some(Coloring::new(ColorMode::Array, ColorLocation::Points))
        );
        assert_eq!(layout.properties[0].range, Some((0.0, 1.0)));
        assert_eq!(layout.properties[0].object, ObjectRole::Representation);
        assert_eq!(layout.properties[1].object, ObjectRole::File);
    }
}
