// ABOUTME: Client-side adapter logic called by generated activity adapters.
// ABOUTME: Turns generic invocation requests into typed stub calls and relays streams per RPC shape.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Response, Status};
use tracing::{debug, warn};

use crate::codec::{self, Payload};
use crate::error::AdapterError;
use crate::relay::{pump, relay_guarded, RelayOptions, RelayStats};
use crate::stream::{MessageSource, OutboundStream, ServerCall, StreamHandle};

/// How the invocation reached the activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelayMode {
    /// Relayed from a gRPC trigger; streams can be carried through.
    #[default]
    GrpcToGrpc,
    /// Relayed from a REST trigger; only unary calls are possible.
    RestToGrpc,
}

impl RelayMode {
    /// Whether this mode can carry streaming calls.
    pub fn allows_streaming(self) -> bool {
        matches!(self, RelayMode::GrpcToGrpc)
    }
}

impl std::str::FromStr for RelayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grpc-to-grpc" => Ok(RelayMode::GrpcToGrpc),
            "rest-to-grpc" => Ok(RelayMode::RestToGrpc),
            other => Err(format!("unknown relay mode: {other}")),
        }
    }
}

/// One invocation of a client adapter.
#[derive(Debug, Default)]
pub struct InvocationRequest {
    /// Method name as written in the definition file.
    pub method_name: String,
    /// How the invocation reached the activity.
    pub mode: RelayMode,
    /// Request payload for unary and server-streaming calls.
    pub payload: Option<Payload>,
    /// Additional fields supplied by the invocation context.
    pub fields: Map<String, Value>,
    /// Streaming handle of the served call being relayed.
    pub stream: Option<StreamHandle>,
    /// Cancellation and deadline for relayed streams.
    pub options: RelayOptions,
}

impl InvocationRequest {
    /// Create an invocation of `method_name`.
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            ..Default::default()
        }
    }

    /// Set the relay mode.
    pub fn with_mode(mut self, mode: RelayMode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach the request payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Add one context-supplied field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Attach the streaming handle of the served call.
    pub fn with_stream(mut self, stream: StreamHandle) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Set cancellation and deadline options.
    pub fn with_options(mut self, options: RelayOptions) -> Self {
        self.options = options;
        self
    }

    /// Reject streaming when relaying in a non-streaming mode.
    pub fn ensure_streaming_allowed(&self) -> Result<(), AdapterError> {
        if self.mode.allows_streaming() {
            Ok(())
        } else {
            Err(AdapterError::StreamingNotAllowed)
        }
    }

    fn take_call<Req: Send + 'static, Res: Send + 'static>(
        &mut self,
    ) -> Result<ServerCall<Req, Res>, AdapterError> {
        self.stream
            .take()
            .ok_or_else(|| AdapterError::MissingStream(self.method_name.clone()))?
            .downcast()
    }

    /// Build the request of a server-streaming call.
    ///
    /// Starts from a fresh request, fills it from the payload, then fills the
    /// fields that are still empty from the context-supplied fields.
    fn merged_request<Req>(&mut self) -> Result<Req, AdapterError>
    where
        Req: Default + Serialize + DeserializeOwned,
    {
        let mut merged = match codec::encode(&Req::default())? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(payload) = self.payload.take() {
            if let Value::Object(fields) = payload.value() {
                codec::merge_fill_empty(&mut merged, fields);
            }
        }
        codec::merge_fill_empty(&mut merged, &self.fields);
        codec::decode(Value::Object(merged))
    }
}

/// Invoke a unary stub method.
///
/// The payload is assigned structurally into `Req`, and the response is
/// returned in the intermediate representation. Stub errors pass through
/// unchanged.
pub async fn invoke_unary<Req, Res, F, Fut>(
    request: InvocationRequest,
    call: F,
) -> Result<Value, AdapterError>
where
    Req: DeserializeOwned + 'static,
    Res: Serialize,
    F: FnOnce(Req) -> Fut,
    Fut: Future<Output = Result<Response<Res>, Status>>,
{
    let typed = match request.payload {
        Some(payload) => payload.assign::<Req>()?,
        None => {
            let fields = Value::Object(request.fields);
            codec::decode(fields)?
        }
    };
    let response = call(typed).await?;
    codec::encode(response.get_ref())
}

/// Invoke a server-streaming stub method and relay its responses into the
/// served call.
pub async fn invoke_server_streaming<Req, Res, S, F, Fut>(
    mut request: InvocationRequest,
    open: F,
) -> Result<Value, AdapterError>
where
    Req: Default + Serialize + DeserializeOwned + Send + 'static,
    Res: Send + 'static,
    S: MessageSource<Res>,
    F: FnOnce(Req) -> Fut,
    Fut: Future<Output = Result<S, Status>>,
{
    request.ensure_streaming_allowed()?;
    let typed = request.merged_request::<Req>()?;
    let call = request.take_call::<Req, Res>()?;
    let (_, mut responses) = call.split();

    let guard = request.options.guard();
    let mut upstream = guard
        .guarded(async { open(typed).await.map_err(AdapterError::from) })
        .await?;
    let forwarded = pump(&mut upstream, &mut responses, &guard)
        .await
        .map_err(|e| {
            warn!(method = %request.method_name, error = %e, "server-streaming relay failed");
            e
        })?;

    debug!(method = %request.method_name, forwarded, "server-streaming relay finished");
    Ok(Value::Null)
}

/// Invoke a client-streaming stub method, feeding it from the served call.
///
/// When the served call's request stream ends the upstream call is closed,
/// and its single response is sent back while closing the served call.
pub async fn invoke_client_streaming<Req, Res, F, Fut>(
    mut request: InvocationRequest,
    open: F,
) -> Result<Value, AdapterError>
where
    Req: Send + 'static,
    Res: Send + 'static,
    F: FnOnce(ReceiverStream<Req>) -> Fut,
    Fut: Future<Output = Result<Response<Res>, Status>>,
{
    request.ensure_streaming_allowed()?;
    let call = request.take_call::<Req, Res>()?;
    let (mut inbound, responses) = call.split();
    let OutboundStream { mut sender, stream } = OutboundStream::with_default_buffer();

    let guard = request.options.guard();
    let feed = async {
        let outcome = pump(&mut inbound, &mut sender, &guard).await;
        // Dropping the sender closes the upstream request stream.
        drop(sender);
        outcome
    };
    let upstream = guard.guarded(async { open(stream).await.map_err(AdapterError::from) });

    let (forwarded, response) = tokio::try_join!(feed, upstream).map_err(|e| {
        warn!(method = %request.method_name, error = %e, "client-streaming relay failed");
        e
    })?;

    debug!(method = %request.method_name, forwarded, "client-streaming relay finished");
    ServerCall::new(inbound, responses)
        .send_and_close(response.into_inner())
        .await?;
    Ok(Value::Null)
}

/// Invoke a bidirectional stub method and relay both directions concurrently.
pub async fn invoke_bidirectional<Req, Res, S, F, Fut>(
    mut request: InvocationRequest,
    open: F,
) -> Result<RelayStats, AdapterError>
where
    Req: Send + 'static,
    Res: Send + 'static,
    S: MessageSource<Res> + 'static,
    F: FnOnce(ReceiverStream<Req>) -> Fut,
    Fut: Future<Output = Result<S, Status>>,
{
    request.ensure_streaming_allowed()?;
    let call = request.take_call::<Req, Res>()?;
    let OutboundStream { sender, stream } = OutboundStream::with_default_buffer();

    let guard = request.options.guard();
    let upstream = guard
        .guarded(async { open(stream).await.map_err(AdapterError::from) })
        .await?;
    let (inbound_rx, inbound_tx) = call.split();
    relay_guarded(inbound_rx, inbound_tx, sender, upstream, guard).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct ListPetsRequest {
        category: String,
        limit: u32,
        owner: String,
    }

    #[test]
    fn test_relay_mode_parsing() {
        assert_eq!("rest-to-grpc".parse::<RelayMode>(), Ok(RelayMode::RestToGrpc));
        assert_eq!("grpc-to-grpc".parse::<RelayMode>(), Ok(RelayMode::GrpcToGrpc));
        assert!("carrier-pigeon".parse::<RelayMode>().is_err());
        assert!(RelayMode::default().allows_streaming());
        assert!(!RelayMode::RestToGrpc.allows_streaming());
    }

    #[test]
    fn test_merged_request_fills_only_empty_fields() {
        let mut request = InvocationRequest::new("ListPets")
            .with_payload(Payload::from_value(json!({"category": "dogs", "limit": 0})))
            .with_field("category", json!("cats"))
            .with_field("limit", json!(10))
            .with_field("owner", json!("ann"));

        let merged: ListPetsRequest = request.merged_request().unwrap();
        assert_eq!(
            merged,
            ListPetsRequest {
                category: "dogs".to_string(),
                limit: 10,
                owner: "ann".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_invoke_unary_encodes_response() {
        let request = InvocationRequest::new("PetById")
            .with_payload(Payload::from_value(json!({"category": "birds", "limit": 2})));

        let value = invoke_unary(request, |req: ListPetsRequest| async move {
            assert_eq!(req.category, "birds");
            Ok(Response::new(json!({"names": ["tweety"], "limit": req.limit})))
        })
        .await
        .unwrap();

        assert_eq!(value, json!({"names": ["tweety"], "limit": 2}));
    }

    #[tokio::test]
    async fn test_invoke_unary_propagates_stub_error_unchanged() {
        let request = InvocationRequest::new("PetById");

        let err = invoke_unary(request, |_req: ListPetsRequest| async {
            Err::<Response<Value>, _>(Status::permission_denied("members only"))
        })
        .await
        .unwrap_err();

        match err {
            AdapterError::Rpc(status) => {
                assert_eq!(status.code(), tonic::Code::PermissionDenied);
                assert_eq!(status.message(), "members only");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_streaming_without_handle_fails() {
        let request = InvocationRequest::new("Chat");
        let err = invoke_bidirectional::<u32, u32, crate::stream::StreamReceiver<u32>, _, _>(
            request,
            |_stream| async { Ok(crate::stream::StreamReceiver::empty()) },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AdapterError::MissingStream(ref m) if m == "Chat"));
    }
}
