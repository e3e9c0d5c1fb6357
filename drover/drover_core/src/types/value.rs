//! Parameter values.
//!
//! This module defines the value model carried by work items. A
//! [`ParamValue`] is self-contained data that can be copied or serialized
//! across any isolation boundary; a [`Param`] additionally admits opaque
//! pass-by-reference handles, which are only valid inside the shared
//! execution context.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A marshalable parameter or result value.
///
/// This enum represents the data that may cross isolation boundaries. It is
/// deliberately closed over plain data: values carry no class identity from
/// the originating environment, so a deep copy (classloader boundary) or a
/// byte-level serialization (process boundary) preserves their meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Null value.
    Null,

    /// Boolean value.
    Bool(bool),

    /// Integer value.
    Int(i64),

    /// Floating-point value.
    Float(f64),

    /// String value.
    Str(String),

    /// Array of values.
    List(Vec<ParamValue>),

    /// Map of values.
    Map(HashMap<String, ParamValue>),
}

impl ParamValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get this value as a boolean.
    ///
    /// # Returns
    ///
    /// The boolean value, or `None` if this value is not a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get this value as a floating-point number, converting integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get this value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array.
    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get this value as a map.
    pub fn as_map(&self) -> Option<&HashMap<String, ParamValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// An opaque reference shared with the in-process execution context.
///
/// Handles never cross a classloader or process boundary; they exist so
/// shared-context actions can receive live references (caches, connections)
/// without a conversion step.
pub type SharedHandle = Arc<dyn Any + Send + Sync>;

/// A parameter of a work item.
#[derive(Clone)]
pub enum Param {
    /// A self-contained value, valid across every boundary.
    Value(ParamValue),

    /// A pass-by-reference handle, valid only under shared isolation.
    Handle(SharedHandle),
}

impl Param {
    /// Check whether this parameter is a pass-by-reference handle.
    pub fn is_handle(&self) -> bool {
        matches!(self, Self::Handle(_))
    }

    /// Get the marshalable value, if this parameter carries one.
    pub fn value(&self) -> Option<&ParamValue> {
        match self {
            Self::Value(v) => Some(v),
            Self::Handle(_) => None,
        }
    }

    /// Downcast a handle parameter to a concrete shared type.
    pub fn downcast_handle<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            Self::Handle(h) => h.downcast_ref::<T>(),
            Self::Value(_) => None,
        }
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Handle(_) => f.write_str("Handle(..)"),
        }
    }
}

impl From<ParamValue> for Param {
    fn from(value: ParamValue) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Value(value.into())
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Value(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert!(ParamValue::Null.is_null());
        assert_eq!(ParamValue::Bool(true).as_bool(), Some(true));
        assert_eq!(ParamValue::Int(42).as_int(), Some(42));
        assert_eq!(ParamValue::Int(2).as_float(), Some(2.0));
        assert_eq!(ParamValue::Str("hi".into()).as_str(), Some("hi"));
        assert!(ParamValue::Str("hi".into()).as_int().is_none());
    }

    #[test]
    fn test_value_json_round_trip() {
        let value = ParamValue::List(vec![
            ParamValue::Int(1),
            ParamValue::Str("two".into()),
            ParamValue::Map(HashMap::from([("k".to_string(), ParamValue::Bool(false))])),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        let back: ParamValue = serde_json::from_str(&json).unwrap();
        assert_eq!(value, back);
    }

    #[test]
    fn test_param_handle_downcast() {
        let handle: SharedHandle = Arc::new(String::from("cache"));
        let param = Param::Handle(handle);
        assert!(param.is_handle());
        assert!(param.value().is_none());
        assert_eq!(param.downcast_handle::<String>().unwrap(), "cache");
        assert!(param.downcast_handle::<i64>().is_none());
    }

    #[test]
    fn test_param_from_value() {
        let param: Param = "payload".into();
        assert_eq!(param.value().and_then(ParamValue::as_str), Some("payload"));
    }
}
