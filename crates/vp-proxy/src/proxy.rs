//! The proxy for one opened file.
//!
//! Mutating calls (`open`, `set_feature`, `set_property`, `set_properties`,
//! `set_timestep`) are queued on the proxy's single worker and return a
//! [`RequestHandle`]. The worker owns the session state; at the end of every
//! job it publishes a [`ProxyView`] that the read accessors serve from, so
//! reads never wait on the server.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use tracing::{debug, info, warn};
use vp_core::{Connection, ProxyIds, ProxyOptions, RemoteId, VpError, VpResult};
use vp_protocol::VcrAction;

use crate::property::{Property, PropertyKind};
use crate::queue::{RequestHandle, RequestQueue};
use crate::strategy::ProxyStrategy;

/// The feature currently coloring the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveFeature {
    pub category: String,
    pub feature: String,
}

/// Published state of one property or feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyView {
    pub kind: PropertyKind,
    pub value: Option<String>,
    pub values: Vec<String>,
    pub allowed: BTreeSet<String>,
}

impl PropertyView {
    fn of(property: &Property) -> Self {
        Self {
            kind: property.kind(),
            value: property.value().map(str::to_string),
            values: property.values(),
            allowed: property.allowed_values(),
        }
    }
}

/// Snapshot of a proxy as of its last completed job.
#[derive(Debug, Clone, Default)]
pub struct ProxyView {
    pub connection: Option<Connection>,
    pub ids: ProxyIds,
    pub features: BTreeMap<String, PropertyView>,
    pub properties: BTreeMap<String, PropertyView>,
    pub timesteps: Vec<f64>,
    pub current_timestep: usize,
    pub active: Option<ActiveFeature>,
}

pub struct Proxy {
    uri: PathBuf,
    view: Arc<RwLock<ProxyView>>,
    target_timestep: Arc<AtomicUsize>,
    queue: RequestQueue<Session>,
}

impl Proxy {
    /// Create an unopened proxy for `uri` and start its worker.
    ///
    /// # Errors
    ///
    /// Returns [`VpError::MissingArgument`] for an empty path and
    /// [`VpError::Io`] if the worker thread cannot be spawned.
    pub fn new(
        uri: impl Into<PathBuf>,
        strategy: Box<dyn ProxyStrategy>,
        options: ProxyOptions,
    ) -> VpResult<Self> {
        let uri = uri.into();
        if uri.as_os_str().is_empty() {
            return Err(VpError::MissingArgument { what: "uri" });
        }

        let view = Arc::new(RwLock::new(ProxyView::default()));
        let target_timestep = Arc::new(AtomicUsize::new(0));
        let session = Session {
            path: uri.to_string_lossy().into_owned(),
            options,
            strategy,
            connection: None,
            ids: ProxyIds::unset(),
            features: Vec::new(),
            properties: Vec::new(),
            timesteps: Vec::new(),
            current_timestep: 0,
            target_timestep: target_timestep.clone(),
            active: None,
            view: view.clone(),
        };

        let name = match uri.file_name() {
            Some(file) => format!("proxy-{}", file.to_string_lossy()),
            None => "proxy".to_string(),
        };
        let queue = RequestQueue::spawn(name, session)?;

        Ok(Self {
            uri,
            view,
            target_timestep,
            queue,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, ProxyView> {
        match self.view.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ---- Mutating operations (queued) ----

    /// Open the file on `connection` and rebuild all metadata.
    ///
    /// Re-opening on the connection already bound succeeds without remote
    /// calls. A failed open leaves the previous session untouched.
    pub fn open(&self, connection: Connection) -> RequestHandle<bool> {
        self.queue.submit(move |session: &mut Session| {
            let opened = session.open(connection);
            session.publish();
            opened
        })
    }

    /// Color the view by `feature` from `category`.
    pub fn set_feature(&self, category: &str, feature: &str) -> RequestHandle<bool> {
        let category = category.to_string();
        let feature = feature.to_string();
        self.queue.submit(move |session: &mut Session| {
            let changed = session.set_feature(&category, &feature);
            session.publish();
            changed
        })
    }

    pub fn set_property(&self, name: &str, value: &str) -> RequestHandle<bool> {
        let name = name.to_string();
        let value = value.to_string();
        self.queue.submit(move |session: &mut Session| {
            let changed = session.set_property(&name, &value);
            session.publish();
            changed
        })
    }

    /// Apply a batch of property values. Invalid entries are skipped.
    ///
    /// Resolves to the number of properties that changed.
    pub fn set_properties<I, K, V>(&self, properties: I) -> RequestHandle<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let properties: Vec<(String, String)> = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.queue.submit(move |session: &mut Session| {
            let count = session.set_properties(&properties);
            session.publish();
            count
        })
    }

    /// Move the view to timestep `index`.
    ///
    /// An out-of-range index leaves the target unchanged. The walk itself
    /// runs on the worker toward whatever the target is when it starts.
    pub fn set_timestep(&self, index: usize) -> RequestHandle<bool> {
        if index < self.read().timesteps.len() {
            self.target_timestep.store(index, Ordering::SeqCst);
        } else {
            debug!(uri = %self.uri.display(), index, "timestep out of range; target unchanged");
        }
        self.queue.submit(|session: &mut Session| {
            let changed = session.walk_to_target();
            session.publish();
            changed
        })
    }

    // ---- Read accessors ----

    pub fn uri(&self) -> &Path {
        &self.uri
    }

    pub fn connection(&self) -> Option<Connection> {
        self.read().connection.clone()
    }

    pub fn ids(&self) -> ProxyIds {
        self.read().ids
    }

    pub fn file_id(&self) -> RemoteId {
        self.ids().file
    }

    pub fn view_id(&self) -> RemoteId {
        self.ids().view
    }

    pub fn representation_id(&self) -> RemoteId {
        self.ids().representation
    }

    pub fn feature_categories(&self) -> BTreeSet<String> {
        self.read().features.keys().cloned().collect()
    }

    /// Allowed features for `category`, or `None` if the category is unknown.
    pub fn features(&self, category: &str) -> Option<BTreeSet<String>> {
        self.read().features.get(category).map(|f| f.allowed.clone())
    }

    /// Current value of every property.
    pub fn properties(&self) -> BTreeMap<String, Option<String>> {
        self.read()
            .properties
            .iter()
            .map(|(name, p)| (name.clone(), p.value.clone()))
            .collect()
    }

    pub fn property(&self, name: &str) -> Option<String> {
        self.read().properties.get(name).and_then(|p| p.value.clone())
    }

    pub fn property_allowed_values(&self, name: &str) -> Option<BTreeSet<String>> {
        self.read().properties.get(name).map(|p| p.allowed.clone())
    }

    pub fn timesteps(&self) -> Vec<f64> {
        self.read().timesteps.clone()
    }

    pub fn current_timestep(&self) -> usize {
        self.read().current_timestep
    }

    pub fn target_timestep(&self) -> usize {
        self.target_timestep.load(Ordering::SeqCst)
    }

    pub fn active_feature(&self) -> Option<ActiveFeature> {
        self.read().active.clone()
    }

    pub fn snapshot(&self) -> ProxyView {
        self.read().clone()
    }
}

/// Worker-owned state of one proxy.
struct Session {
    path: String,
    options: ProxyOptions,
    strategy: Box<dyn ProxyStrategy>,
    connection: Option<Connection>,
    ids: ProxyIds,
    features: Vec<Property>,
    properties: Vec<Property>,
    timesteps: Vec<f64>,
    current_timestep: usize,
    target_timestep: Arc<AtomicUsize>,
    active: Option<ActiveFeature>,
    view: Arc<RwLock<ProxyView>>,
}

impl Session {
    fn publish(&self) {
        let view = ProxyView {
            connection: self.connection.clone(),
            ids: self.ids,
            features: self
                .features
                .iter()
                .map(|f| (f.name().to_string(), PropertyView::of(f)))
                .collect(),
            properties: self
                .properties
                .iter()
                .map(|p| (p.name().to_string(), PropertyView::of(p)))
                .collect(),
            timesteps: self.timesteps.clone(),
            current_timestep: self.current_timestep,
            active: self.active.clone(),
        };
        match self.view.write() {
            Ok(mut guard) => *guard = view,
            Err(poisoned) => *poisoned.into_inner() = view,
        }
    }

    fn live_connection(&self) -> Option<Connection> {
        self.connection.clone().filter(Connection::is_connected)
    }

    fn open(&mut self, connection: Connection) -> bool {
        if !connection.is_connected() {
            debug!(path = %self.path, "cannot open on a connection that is not live");
            return false;
        }
        if self.connection.as_ref() == Some(&connection) {
            return true;
        }

        let ids = match vp_protocol::create_view(&connection, &self.path) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(path = %self.path, error = %e, "failed to open file on server");
                return false;
            }
        };
        info!(path = %self.path, ?ids, connection = connection.name(), "opened file");

        self.connection = Some(connection.clone());
        self.ids = ids;

        self.timesteps = self.find_timesteps(&connection);
        // The target is left alone: a request queued behind this open may
        // already have set it.
        self.current_timestep = 0;

        self.features = bind_all(self.strategy.find_features(&ids), &connection);
        self.properties = bind_all(self.strategy.find_properties(&ids), &connection);

        self.active = None;
        if let Some((index, feature)) = self.first_selected_feature() {
            self.active = Some(ActiveFeature {
                category: self.features[index].name().to_string(),
                feature: feature.clone(),
            });
            self.refresh_view(&connection, index, &feature);
        }
        true
    }

    fn find_timesteps(&self, connection: &Connection) -> Vec<f64> {
        match vp_protocol::get_proxy(connection, self.ids.file).and_then(|obj| obj.times()) {
            Ok(times) => times,
            Err(e) => {
                warn!(path = %self.path, error = %e, "failed to read timesteps");
                Vec::new()
            }
        }
    }

    /// First feature, in registration order, with something selected.
    fn first_selected_feature(&self) -> Option<(usize, String)> {
        self.features
            .iter()
            .enumerate()
            .find_map(|(i, feature)| feature.selection().map(|value| (i, value)))
    }

    fn feature_index(&self, category: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name() == category)
    }

    fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name() == name)
    }

    /// Re-color the view by `feature`, then rescale and refresh the scalar bar.
    ///
    /// All three calls are best-effort.
    fn refresh_view(&self, connection: &Connection, index: usize, feature: &str) {
        let info = &self.features[index];
        let coloring = info.coloring().copied().unwrap_or_default();
        let array_name = if coloring.can_color_by() { feature } else { "" };

        if let Err(e) = vp_protocol::color_by(
            connection,
            self.ids.representation,
            coloring.mode_or_default(),
            coloring.location_or_default(),
            array_name,
        ) {
            warn!(path = %self.path, feature, error = %e, "color-by request failed");
        }
        self.rescale(connection);
        if let Err(e) = vp_protocol::set_scalar_bar_visibility(
            connection,
            self.ids.file,
            self.options.show_scalar_bar,
        ) {
            warn!(path = %self.path, error = %e, "scalar bar refresh failed");
        }
    }

    fn rescale(&self, connection: &Connection) {
        let file = self.ids.file;
        if let Err(e) = vp_protocol::rescale_transfer_function(connection, file, &self.options) {
            warn!(path = %self.path, error = %e, "rescale request failed");
        }
    }

    fn set_feature(&mut self, category: &str, feature: &str) -> bool {
        let Some(connection) = self.live_connection() else {
            return false;
        };
        let Some(index) = self.feature_index(category) else {
            debug!(path = %self.path, category, "unknown feature category");
            return false;
        };
        if !self.features[index].value_allowed(feature) {
            debug!(path = %self.path, category, feature, "feature not allowed");
            return false;
        }
        if let Some(active) = &self.active
            && active.category == category
            && active.feature == feature
        {
            return false;
        }

        let mut updated = false;
        let previous = self
            .active
            .as_ref()
            .filter(|active| active.category != category)
            .and_then(|active| self.feature_index(&active.category));
        if let Some(previous) = previous {
            updated |= self.features[previous].clear();
        }
        updated |= self.features[index].set_value(feature);

        if updated {
            self.active = Some(ActiveFeature {
                category: category.to_string(),
                feature: feature.to_string(),
            });
            self.refresh_view(&connection, index, feature);
        }
        updated
    }

    fn set_property(&mut self, name: &str, value: &str) -> bool {
        if self.live_connection().is_none() {
            return false;
        }
        match self.property_mut(name) {
            Some(property) if property.value_allowed(value) => property.set_value(value),
            Some(_) => {
                debug!(property = name, value, "value not allowed");
                false
            }
            None => {
                debug!(property = name, "unknown property");
                false
            }
        }
    }

    fn set_properties(&mut self, properties: &[(String, String)]) -> usize {
        if self.live_connection().is_none() {
            return 0;
        }
        let mut count = 0;
        for (name, value) in properties {
            if let Some(property) = self.property_mut(name)
                && property.value_allowed(value)
                && property.set_value(value)
            {
                count += 1;
            }
        }
        count
    }

    /// Step one timestep at a time toward the target; the server cannot seek.
    ///
    /// The color map is rescaled only once the target has been reached.
    fn walk_to_target(&mut self) -> bool {
        let Some(connection) = self.live_connection() else {
            return false;
        };
        if self.timesteps.is_empty() {
            return false;
        }
        let target = self
            .target_timestep
            .load(Ordering::SeqCst)
            .min(self.timesteps.len() - 1);

        let mut changed = false;
        while self.current_timestep != target {
            let action = if self.current_timestep < target {
                VcrAction::Next
            } else {
                VcrAction::Prev
            };
            if let Err(e) = vp_protocol::vcr_action(&connection, action) {
                warn!(
                    path = %self.path,
                    at = self.current_timestep,
                    target,
                    error = %e,
                    "timestep walk interrupted"
                );
                break;
            }
            match action {
                VcrAction::Next => self.current_timestep += 1,
                _ => self.current_timestep -= 1,
            }
            changed = true;
        }

        if changed && self.current_timestep == target && !self.options.scale_by_all_times {
            self.rescale(&connection);
        }
        changed
    }
}

/// Bind freshly declared properties, keeping those whose binding took.
///
/// A later property with the same name replaces an earlier one.
fn bind_all(declared: Vec<Property>, connection: &Connection) -> Vec<Property> {
    let mut bound: Vec<Property> = Vec::with_capacity(declared.len());
    for mut property in declared {
        if property.bind(Some(connection)) {
            bound.retain(|p| p.name() != property.name());
            bound.push(property);
        }
    }
    bound
}
