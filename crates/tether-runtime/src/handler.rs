// ABOUTME: The generic trigger handler contract that generated server adapters call into.
// ABOUTME: Defines HandlerRequest, Reply and the TriggerHandler trait plus a closure-backed handler.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tonic::metadata::MetadataMap;

use crate::codec::{Payload, ERROR_FIELD};
use crate::error::AdapterError;
use crate::stream::StreamHandle;

/// Metadata of the call being served, passed to the handler as context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationContext {
    /// ASCII request metadata (headers), keyed by lowercase name.
    pub metadata: HashMap<String, String>,
}

impl InvocationContext {
    /// Collect the ASCII entries of a tonic metadata map.
    pub fn from_metadata(metadata: &MetadataMap) -> Self {
        let metadata = metadata
            .iter()
            .filter_map(|entry| match entry {
                tonic::metadata::KeyAndValueRef::Ascii(key, value) => value
                    .to_str()
                    .ok()
                    .map(|v| (key.as_str().to_string(), v.to_string())),
                tonic::metadata::KeyAndValueRef::Binary(_, _) => None,
            })
            .collect();
        Self { metadata }
    }
}

/// One call forwarded from a server adapter to the handler.
#[derive(Debug)]
pub struct HandlerRequest {
    /// Method name as written in the definition file.
    pub method_name: String,
    /// Service name as written in the definition file.
    pub service_name: String,
    /// Request message, for unary and server-streaming calls.
    pub payload: Option<Payload>,
    /// Streaming handle, for every streaming shape.
    pub stream: Option<StreamHandle>,
    /// Call metadata.
    pub context: InvocationContext,
}

impl HandlerRequest {
    /// Create a request carrying only routing metadata.
    pub fn new(method_name: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            service_name: service_name.into(),
            payload: None,
            stream: None,
            context: InvocationContext::default(),
        }
    }

    /// Attach the request payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Attach the streaming handle.
    pub fn with_stream(mut self, stream: StreamHandle) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Attach the call context.
    pub fn with_context(mut self, context: InvocationContext) -> Self {
        self.context = context;
        self
    }
}

/// What a handler answers with.
pub enum Reply {
    /// A typed message of the exact response type. Unary calls reject any
    /// other type, since an opaque message cannot be decoded.
    Message(Box<dyn Any + Send>),
    /// A typed message together with its intermediate form. Used as-is when
    /// it is the exact response type, otherwise decoded structurally.
    Typed(Payload),
    /// An opaque value, possibly carrying an `error` field.
    Data(Value),
    /// Nothing; streaming handlers usually answer this way.
    Empty,
}

impl Reply {
    /// Reply with a typed message.
    pub fn message<T: Send + 'static>(msg: T) -> Self {
        Self::Message(Box::new(msg))
    }

    /// Reply with a typed message that may differ from the response type.
    pub fn typed<T: Serialize + Send + 'static>(msg: T) -> Result<Self, AdapterError> {
        Ok(Self::Typed(Payload::new(msg)?))
    }

    /// Reply with an opaque value.
    pub fn data(value: Value) -> Self {
        Self::Data(value)
    }

    /// Reply with an error field, as the flow engine does on failure.
    pub fn error(text: impl Into<String>) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert(ERROR_FIELD.to_string(), Value::String(text.into()));
        Self::Data(Value::Object(fields))
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Message(_) => f.write_str("Reply::Message(..)"),
            Reply::Typed(payload) => f.debug_tuple("Reply::Typed").field(payload.value()).finish(),
            Reply::Data(value) => f.debug_tuple("Reply::Data").field(value).finish(),
            Reply::Empty => f.write_str("Reply::Empty"),
        }
    }
}

/// The generic handler a trigger dispatches served calls to.
///
/// # Example
///
/// ```ignore
/// struct EchoFlow;
///
/// #[async_trait]
/// impl TriggerHandler for EchoFlow {
///     async fn call_handler(&self, request: HandlerRequest) -> Result<Reply, AdapterError> {
///         match request.payload {
///             Some(payload) => Ok(Reply::data(payload.value().clone())),
///             None => Ok(Reply::Empty),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    /// Handle one call. Returns exactly once per call.
    async fn call_handler(&self, request: HandlerRequest) -> Result<Reply, AdapterError>;
}

/// Boxed future returned by [`FnHandler`] closures.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Reply, AdapterError>> + Send>>;

/// A closure-backed handler.
///
/// Useful when wiring a trigger to a single function rather than a full
/// flow engine.
pub struct FnHandler<F>
where
    F: Fn(HandlerRequest) -> HandlerFuture + Send + Sync,
{
    callback: F,
}

impl<F> FnHandler<F>
where
    F: Fn(HandlerRequest) -> HandlerFuture + Send + Sync,
{
    /// Create a handler from a closure returning a boxed future.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> TriggerHandler for FnHandler<F>
where
    F: Fn(HandlerRequest) -> HandlerFuture + Send + Sync,
{
    async fn call_handler(&self, request: HandlerRequest) -> Result<Reply, AdapterError> {
        (self.callback)(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::metadata::MetadataValue;

    #[test]
    fn test_handler_request_builder() {
        let request = HandlerRequest::new("GetPet", "PetStoreService")
            .with_payload(Payload::from_value(serde_json::json!({"id": 1})));
        assert_eq!(request.method_name, "GetPet");
        assert_eq!(request.service_name, "PetStoreService");
        assert!(request.payload.is_some());
        assert!(request.stream.is_none());
    }

    #[test]
    fn test_context_from_metadata_skips_binary() {
        let mut metadata = MetadataMap::new();
        metadata.insert("x-tenant", MetadataValue::from_static("acme"));
        metadata.insert_bin("trace-bin", MetadataValue::from_bytes(b"\x00\x01"));

        let ctx = InvocationContext::from_metadata(&metadata);
        assert_eq!(ctx.metadata.get("x-tenant").map(String::as_str), Some("acme"));
        assert_eq!(ctx.metadata.len(), 1);
    }

    #[test]
    fn test_reply_error_shape() {
        match Reply::error("sold out") {
            Reply::Data(value) => assert_eq!(value["error"], "sold out"),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fn_handler_dispatches() {
        let handler = FnHandler::new(|request: HandlerRequest| -> HandlerFuture {
            Box::pin(async move {
                Ok(Reply::data(
                    serde_json::json!({"method": request.method_name}),
                ))
            })
        });

        let reply = handler
            .call_handler(HandlerRequest::new("ListPets", "PetStoreService"))
            .await
            .unwrap();
        match reply {
            Reply::Data(value) => assert_eq!(value["method"], "ListPets"),
            other => panic!("unexpected reply {:?}", other),
        }
    }
}
