//! The marshaling layer.
//!
//! Converts a work item's parameters (and, for process context, the whole
//! request/response exchange) into a representation valid for the
//! destination boundary:
//!
//! - **Shared context**: pass-by-reference; no conversion, handles allowed.
//! - **Isolated context**: copy-by-value across the classloader boundary;
//!   values must be representable independent of the originating
//!   environment, so handles are rejected.
//! - **Process context**: full serialization over the inter-process
//!   channel; handles are rejected and values that cannot be serialized
//!   (for example non-finite floats) fail here.
//!
//! All failures in this module are caller configuration errors surfaced as
//! [`MarshalError`]; none are retried.

use crate::daemon::protocol::{DaemonRequest, DaemonResponse};
use drover_core::{Error, Isolation, MarshalError, Param, ParamValue, Result};

/// Pass parameters by reference into the shared context.
///
/// No conversion: the shared environment sees exactly the caller's values
/// and handles.
pub fn by_reference(params: &[Param]) -> Vec<Param> {
    params.to_vec()
}

/// Copy parameters by value across the classloader boundary.
///
/// # Returns
///
/// * `Ok(params)` - Deep copies detached from the originating environment.
/// * `Err` - `MarshalError::HandleNotTransferable` if any parameter is a
///   pass-by-reference handle.
pub fn by_value(params: &[Param]) -> Result<Vec<Param>> {
    params
        .iter()
        .map(|param| match param {
            Param::Value(value) => Ok(Param::Value(value.clone())),
            Param::Handle(_) => Err(Error::Marshal(MarshalError::HandleNotTransferable(
                Isolation::Isolated.boundary_name(),
            ))),
        })
        .collect()
}

/// Extract the serializable values destined for the inter-process channel.
///
/// # Returns
///
/// * `Ok(values)` - Values safe to serialize onto the wire.
/// * `Err` - `HandleNotTransferable` for pass-by-reference handles,
///   `Unserializable` for values the wire format cannot represent.
pub fn to_wire_params(params: &[Param]) -> Result<Vec<ParamValue>> {
    params
        .iter()
        .map(|param| match param {
            Param::Value(value) => {
                check_wire_safe(value)?;
                Ok(value.clone())
            }
            Param::Handle(_) => Err(Error::Marshal(MarshalError::HandleNotTransferable(
                Isolation::Process.boundary_name(),
            ))),
        })
        .collect()
}

/// Reject values the JSON wire format cannot represent.
///
/// serde_json writes non-finite floats as `null`, which would silently
/// corrupt the value in transit; we fail the marshal instead.
fn check_wire_safe(value: &ParamValue) -> Result<()> {
    match value {
        ParamValue::Float(f) if !f.is_finite() => Err(Error::Marshal(
            MarshalError::Unserializable(format!("non-finite float {}", f)),
        )),
        ParamValue::List(items) => items.iter().try_for_each(check_wire_safe),
        ParamValue::Map(map) => map.values().try_for_each(check_wire_safe),
        _ => Ok(()),
    }
}

/// Serialize a daemon request to one line of the control channel.
pub fn encode_request(request: &DaemonRequest) -> Result<String> {
    serde_json::to_string(request)
        .map_err(|e| Error::Marshal(MarshalError::Unserializable(e.to_string())))
}

/// Decode a daemon response line received from the control channel.
pub fn decode_response(line: &str) -> Result<DaemonResponse> {
    serde_json::from_str(line)
        .map_err(|e| Error::Marshal(MarshalError::DecodeFailed(e.to_string())))
}
