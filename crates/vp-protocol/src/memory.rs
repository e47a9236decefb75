//! In-process rendering server.
//!
//! `MemoryServer` answers every method in [`crate::methods`] from a
//! [`ServerFixture`] describing the files it can open and the objects it
//! holds. Every request is recorded so callers can inspect exactly which
//! remote calls were issued and in what order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;
use vp_core::{ProxyIds, RemoteClient, RemoteId, TransportError};

use crate::methods;
use crate::types::{ColorLocation, ColorMode, VcrAction, id_from_value};

/// Ids the server assigns when a file path is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFixture {
    pub file: RemoteId,
    pub view: RemoteId,
    pub representation: RemoteId,
}

/// One property of a remote object: entry `i` of both `ui` and `properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFixture {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub allowed: Vec<Value>,
}

impl PropertyFixture {
    pub fn choice(name: &str, value: &str, allowed: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            value: Value::String(value.to_string()),
            allowed: allowed.iter().map(|v| Value::String(v.to_string())).collect(),
        }
    }

    pub fn multi(name: &str, values: &[&str], allowed: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            value: Value::Array(values.iter().map(|v| Value::String(v.to_string())).collect()),
            allowed: allowed.iter().map(|v| Value::String(v.to_string())).collect(),
        }
    }

    pub fn free(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Value::String(value.to_string()),
            allowed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectFixture {
    #[serde(default)]
    pub times: Vec<f64>,
    #[serde(default)]
    pub properties: Vec<PropertyFixture>,
}

impl ObjectFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_times(mut self, times: &[f64]) -> Self {
        self.times = times.to_vec();
        self
    }

    pub fn with_property(mut self, property: PropertyFixture) -> Self {
        self.properties.push(property);
        self
    }
}

/// Everything a `MemoryServer` knows at start-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerFixture {
    #[serde(default)]
    pub files: BTreeMap<String, FileFixture>,
    #[serde(default)]
    pub objects: BTreeMap<RemoteId, ObjectFixture>,
}

impl ServerFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, ids: ProxyIds) -> Self {
        self.files.insert(
            path.to_string(),
            FileFixture {
                file: ids.file,
                view: ids.view,
                representation: ids.representation,
            },
        );
        self
    }

    pub fn with_object(mut self, id: RemoteId, object: ObjectFixture) -> Self {
        self.objects.insert(id, object);
        self
    }
}

/// A request as received by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub args: Value,
}

/// Last color-by request applied to a representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorByRecord {
    pub representation: RemoteId,
    pub mode: ColorMode,
    pub location: ColorLocation,
    pub array_name: String,
}

#[derive(Debug, Default)]
struct ServerState {
    fixture: ServerFixture,
    calls: Vec<RecordedCall>,
    failing: BTreeSet<String>,
    reject_updates: bool,
    active_file: Option<RemoteId>,
    time_index: usize,
    colored_by: Option<ColorByRecord>,
    scalar_bars: BTreeMap<RemoteId, bool>,
}

#[derive(Debug, Default)]
pub struct MemoryServer {
    state: Mutex<ServerState>,
}

impl MemoryServer {
    pub fn new(fixture: ServerFixture) -> Self {
        Self {
            state: Mutex::new(ServerState {
                fixture,
                ..ServerState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Every request received so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Number of requests received for `method`.
    pub fn call_count(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.method == method).count()
    }

    /// Actions of every `pv.vcr.action` request, oldest first.
    pub fn vcr_actions(&self) -> Vec<VcrAction> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method == methods::VCR_ACTION)
            .filter_map(|c| c.args.get(0).and_then(Value::as_str).and_then(VcrAction::parse))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make every subsequent request for `method` fail at the transport.
    pub fn fail_method(&self, method: &str) {
        self.lock().failing.insert(method.to_string());
    }

    pub fn restore_method(&self, method: &str) {
        self.lock().failing.remove(method);
    }

    /// Answer property updates with `success: false` without applying them.
    pub fn reject_updates(&self, reject: bool) {
        self.lock().reject_updates = reject;
    }

    /// Current server-side value of a property.
    pub fn property_value(&self, id: RemoteId, name: &str) -> Option<Value> {
        self.lock()
            .fixture
            .objects
            .get(&id)
            .and_then(|obj| obj.properties.iter().find(|p| p.name == name))
            .map(|p| p.value.clone())
    }

    pub fn time_index(&self) -> usize {
        self.lock().time_index
    }

    pub fn colored_by(&self) -> Option<ColorByRecord> {
        self.lock().colored_by.clone()
    }

    pub fn scalar_bar_visible(&self, file: RemoteId) -> Option<bool> {
        self.lock().scalar_bars.get(&file).copied()
    }

    fn dispatch(
        state: &mut ServerState,
        method: &str,
        args: &Value,
    ) -> Result<Value, TransportError> {
        let reply = match method {
            methods::CREATE_VIEW => Self::create_view(state, args),
            methods::PROXY_GET => Self::get_object(state, args),
            methods::PROXY_UPDATE => Self::update(state, args),
            methods::COLOR_BY => Self::color_by(state, args),
            methods::RESCALE => json!({ "success": true }),
            methods::SCALAR_BAR_VISIBILITY => Self::scalar_bar(state, args),
            methods::VCR_ACTION => Self::vcr(state, args),
            other => {
                return Err(TransportError::Request {
                    method: other.to_string(),
                    message: "unknown method".to_string(),
                });
            }
        };
        Ok(reply)
    }

    fn create_view(state: &mut ServerState, args: &Value) -> Value {
        let Some(path) = args.get(0).and_then(Value::as_str) else {
            return json!({ "error": "createView expects a file path" });
        };
        match state.fixture.files.get(path).copied() {
            Some(ids) => {
                state.active_file = Some(ids.file);
                state.time_index = 0;
                json!({
                    "proxyId": ids.file,
                    "viewId": ids.view,
                    "repId": ids.representation,
                })
            }
            None => json!({ "error": format!("unable to open {path}") }),
        }
    }

    fn get_object(state: &mut ServerState, args: &Value) -> Value {
        let Some(id) = args.get(0).and_then(id_from_value) else {
            return json!({ "error": "proxy id expected" });
        };
        let Some(obj) = state.fixture.objects.get(&id) else {
            return json!({ "error": format!("no proxy with id {id}") });
        };
        let ui: Vec<Value> = obj
            .properties
            .iter()
            .map(|p| json!({ "name": p.name, "values": p.allowed }))
            .collect();
        let properties: Vec<Value> = obj
            .properties
            .iter()
            .map(|p| json!({ "id": id.to_string(), "name": p.name, "value": p.value }))
            .collect();
        json!({
            "id": id.to_string(),
            "data": { "time": obj.times },
            "ui": ui,
            "properties": properties,
        })
    }

    fn update(state: &mut ServerState, args: &Value) -> Value {
        if state.reject_updates {
            return json!({ "success": false, "errorList": ["updates are rejected"] });
        }
        let Some(updates) = args.get(0).and_then(Value::as_array) else {
            return json!({ "success": false, "errorList": ["update list expected"] });
        };

        let mut errors = Vec::new();
        for update in updates {
            let id = update.get("id").and_then(id_from_value);
            let name = update.get("name").and_then(Value::as_str);
            let (Some(id), Some(name)) = (id, name) else {
                errors.push(Value::String("update requires id and name".to_string()));
                continue;
            };
            let property = state
                .fixture
                .objects
                .get_mut(&id)
                .and_then(|obj| obj.properties.iter_mut().find(|p| p.name == name));
            match property {
                Some(property) => {
                    property.value = update.get("value").cloned().unwrap_or(Value::Null);
                }
                None => errors.push(Value::String(format!("no property {name} on proxy {id}"))),
            }
        }

        json!({ "success": errors.is_empty(), "errorList": errors })
    }

    fn color_by(state: &mut ServerState, args: &Value) -> Value {
        let representation = args.get(0).and_then(id_from_value);
        let mode = args
            .get(1)
            .cloned()
            .and_then(|v| serde_json::from_value::<ColorMode>(v).ok());
        let location = args
            .get(2)
            .cloned()
            .and_then(|v| serde_json::from_value::<ColorLocation>(v).ok());
        let array_name = args.get(3).and_then(Value::as_str);

        match (representation, mode, location, array_name) {
            (Some(representation), Some(mode), Some(location), Some(array_name)) => {
                state.colored_by = Some(ColorByRecord {
                    representation,
                    mode,
                    location,
                    array_name: array_name.to_string(),
                });
                json!({ "success": true })
            }
            _ => json!({ "error": "malformed color-by arguments" }),
        }
    }

    fn scalar_bar(state: &mut ServerState, args: &Value) -> Value {
        if let Some(visibilities) = args.get(0).and_then(Value::as_object) {
            for (key, visible) in visibilities {
                if let (Ok(id), Some(visible)) = (key.parse::<RemoteId>(), visible.as_bool()) {
                    state.scalar_bars.insert(id, visible);
                }
            }
        }
        json!({ "success": true })
    }

    fn vcr(state: &mut ServerState, args: &Value) -> Value {
        let Some(action) = args.get(0).and_then(Value::as_str).and_then(VcrAction::parse) else {
            return json!({ "error": "unknown vcr action" });
        };
        let times = state
            .active_file
            .and_then(|file| state.fixture.objects.get(&file))
            .map(|obj| obj.times.clone())
            .unwrap_or_default();
        let last = times.len().saturating_sub(1);
        state.time_index = match action {
            VcrAction::First => 0,
            VcrAction::Prev => state.time_index.saturating_sub(1),
            VcrAction::Next => (state.time_index + 1).min(last),
            VcrAction::Last => last,
        };
        match times.get(state.time_index) {
            Some(time) => json!({ "time": time }),
            None => json!({ "time": Value::Null }),
        }
    }
}

impl RemoteClient for MemoryServer {
    fn call(&self, method: &str, args: Value) -> Result<Value, TransportError> {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            method: method.to_string(),
            args: args.clone(),
        });
        if state.failing.contains(method) {
            debug!(method, "memory server failing request on demand");
            return Err(TransportError::Request {
                method: method.to_string(),
                message: "request failed".to_string(),
            });
        }
        Self::dispatch(&mut state, method, &args)
    }
}
