// ABOUTME: Intermediate JSON representation used between the generic handler and typed messages.
// ABOUTME: Provides Payload, structural assignment, error-field lookup and fill-only-empty merging.

use std::any::Any;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AdapterError;

/// Field of an opaque reply that carries a handler-reported error.
pub const ERROR_FIELD: &str = "error";

/// Encode a typed message into the intermediate representation.
pub fn encode<T: Serialize>(msg: &T) -> Result<Value, AdapterError> {
    serde_json::to_value(msg).map_err(|e| AdapterError::Encode(e.to_string()))
}

/// Decode the intermediate representation into a typed message.
///
/// Fields missing from `value` keep their defaults when the message type
/// is declared with `#[serde(default)]`, which the compile step arranges.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, AdapterError> {
    serde_json::from_value(value).map_err(|e| AdapterError::Decode(e.to_string()))
}

/// Text of a non-empty `error` field on an opaque reply, if any.
pub fn reply_error(value: &Value) -> Option<String> {
    match value.get(ERROR_FIELD)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Whether a value counts as unset for fill-only-empty merging.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.values().all(is_empty),
    }
}

/// Copy fields from `source` into `target`, never overriding a field that is
/// already set. Nested objects are merged field by field.
pub fn merge_fill_empty(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, incoming) in source {
        match target.get_mut(key) {
            Some(Value::Object(existing)) if incoming.is_object() => {
                if let Value::Object(incoming) = incoming {
                    merge_fill_empty(existing, incoming);
                }
            }
            Some(existing) if !is_empty(existing) => {}
            Some(existing) => *existing = incoming.clone(),
            None => {
                target.insert(key.clone(), incoming.clone());
            }
        }
    }
}

/// A request payload as carried through the generic handler.
///
/// Holds the typed message when one is available and always its
/// intermediate form, so consumers can use whichever they understand.
pub struct Payload {
    value: Value,
    message: Option<Box<dyn Any + Send>>,
}

impl Payload {
    /// Wrap a typed message.
    pub fn new<T: Serialize + Send + 'static>(msg: T) -> Result<Self, AdapterError> {
        Ok(Self {
            value: encode(&msg)?,
            message: Some(Box::new(msg)),
        })
    }

    /// Wrap an opaque value, e.g. a body that arrived over a REST relay.
    pub fn from_value(value: Value) -> Self {
        Self {
            value,
            message: None,
        }
    }

    /// The intermediate form of the payload.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Structural assignment into `T`.
    ///
    /// Returns the typed message unchanged when it already is a `T`,
    /// otherwise decodes the intermediate form.
    pub fn assign<T: DeserializeOwned + 'static>(self) -> Result<T, AdapterError> {
        if let Some(message) = self.message {
            if let Ok(typed) = message.downcast::<T>() {
                return Ok(*typed);
            }
        }
        decode(self.value)
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("value", &self.value)
            .field("typed", &self.message.is_some())
            .finish()
    }
}
