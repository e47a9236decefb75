//! Typed wrappers around the remote calls a proxy issues.
//!
//! Each wrapper builds the argument array, blocks on the reply and decodes
//! it. A reply object carrying an `error` field is reported as
//! [`ProtocolError::ErrorResponse`].

use serde_json::{Map, Value, json};
use vp_core::{Connection, ProxyIds, ProxyOptions, RemoteId};

use crate::methods;
use crate::types::{
    ColorLocation, ColorMode, PropertyUpdate, ProxyObject, UpdateReply, VcrAction, id_from_value,
};
use crate::{ProtocolError, ProtocolResult};

/// Issue a raw call and surface server-side errors.
pub fn call(connection: &Connection, method: &str, args: Value) -> ProtocolResult<Value> {
    let reply = connection.call(method, args)?;
    if let Some(error) = reply.get("error") {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(ProtocolError::ErrorResponse {
            method: method.to_string(),
            message,
        });
    }
    Ok(reply)
}

/// Open `path` on the server and create a view for it.
///
/// Fails unless the reply names all three of the file, view and
/// representation ids.
pub fn create_view(connection: &Connection, path: &str) -> ProtocolResult<ProxyIds> {
    let reply = call(connection, methods::CREATE_VIEW, json!([path]))?;
    let field = |key: &str| {
        reply
            .get(key)
            .and_then(id_from_value)
            .ok_or_else(|| ProtocolError::malformed(methods::CREATE_VIEW, format!("missing {key}")))
    };
    Ok(ProxyIds::new(field("proxyId")?, field("viewId")?, field("repId")?))
}

/// Fetch the full description of a remote object.
pub fn get_proxy(connection: &Connection, id: RemoteId) -> ProtocolResult<ProxyObject> {
    let reply = call(connection, methods::PROXY_GET, json!([id]))?;
    Ok(serde_json::from_value(reply)?)
}

/// Push property values. The reply reports success for the batch as a whole.
pub fn update_properties(
    connection: &Connection,
    updates: &[PropertyUpdate],
) -> ProtocolResult<UpdateReply> {
    let reply = call(connection, methods::PROXY_UPDATE, json!([updates]))?;
    Ok(serde_json::from_value(reply)?)
}

/// Color a representation by a data array.
///
/// An empty `array_name` clears the coloring.
pub fn color_by(
    connection: &Connection,
    representation: RemoteId,
    mode: ColorMode,
    location: ColorLocation,
    array_name: &str,
) -> ProtocolResult<Value> {
    let args = json!([
        representation.to_string(),
        mode.as_str(),
        location.as_str(),
        array_name,
        methods::COLOR_COMPONENT,
        0,
        true
    ]);
    call(connection, methods::COLOR_BY, args)
}

/// Recompute the color map range for the file's data.
pub fn rescale_transfer_function(
    connection: &Connection,
    file: RemoteId,
    options: &ProxyOptions,
) -> ProtocolResult<Value> {
    let args = json!([{ "type": options.rescale_type(), "proxyId": file.to_string() }]);
    call(connection, methods::RESCALE, args)
}

/// Show or hide the scalar bar for the file.
pub fn set_scalar_bar_visibility(
    connection: &Connection,
    file: RemoteId,
    visible: bool,
) -> ProtocolResult<Value> {
    let mut visibilities = Map::new();
    visibilities.insert(file.to_string(), Value::Bool(visible));
    call(
        connection,
        methods::SCALAR_BAR_VISIBILITY,
        json!([Value::Object(visibilities)]),
    )
}

/// Move the server's active time one step (or to either end).
pub fn vcr_action(connection: &Connection, action: VcrAction) -> ProtocolResult<Value> {
    call(connection, methods::VCR_ACTION, json!([action.as_str()]))
}
