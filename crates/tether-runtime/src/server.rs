// ABOUTME: Server-side adapter logic called by generated trigger adapters.
// ABOUTME: Forwards served calls to the TriggerHandler and interprets its replies per RPC shape.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, error};

use crate::codec::{self, Payload};
use crate::error::AdapterError;
use crate::handler::{HandlerRequest, InvocationContext, Reply, TriggerHandler};
use crate::registry::ServiceInfo;
use crate::stream::{
    ResponseSender, ResponseStream, ServerCall, StreamHandle, StreamReceiver,
    DEFAULT_CHANNEL_BUFFER,
};

/// Interpret the reply to a unary call.
///
/// A reply that already is a `Res` is returned unchanged. An opaque reply
/// with a non-empty `error` field becomes an error carrying that text.
/// Anything else is decoded structurally into `Res`; a bare
/// [`Reply::Message`] of another type has no intermediate form and fails.
pub fn unary_reply<Res>(reply: Reply) -> Result<Res, AdapterError>
where
    Res: DeserializeOwned + 'static,
{
    match reply {
        Reply::Message(message) => match message.downcast::<Res>() {
            Ok(res) => Ok(*res),
            Err(_) => Err(AdapterError::Decode(format!(
                "handler replied with a message that is not {}",
                std::any::type_name::<Res>()
            ))),
        },
        Reply::Typed(payload) => {
            if let Some(text) = codec::reply_error(payload.value()) {
                return Err(AdapterError::Handler(text));
            }
            payload.assign::<Res>()
        }
        Reply::Data(value) => {
            if let Some(text) = codec::reply_error(&value) {
                return Err(AdapterError::Handler(text));
            }
            codec::decode(value)
        }
        Reply::Empty => Err(AdapterError::NoReply),
    }
}

/// Interpret the reply to a streaming call: only an error field matters.
pub fn stream_reply(reply: &Reply) -> Result<(), AdapterError> {
    match reply {
        Reply::Data(value) => match codec::reply_error(value) {
            Some(text) => Err(AdapterError::Handler(text)),
            None => Ok(()),
        },
        Reply::Typed(payload) => match codec::reply_error(payload.value()) {
            Some(text) => Err(AdapterError::Handler(text)),
            None => Ok(()),
        },
        Reply::Message(_) | Reply::Empty => Ok(()),
    }
}

fn routed(info: &ServiceInfo, method: &str, context: InvocationContext) -> HandlerRequest {
    HandlerRequest::new(method, info.service_name).with_context(context)
}

/// Serve a unary call through the handler.
pub async fn unary<Req, Res>(
    handler: &Arc<dyn TriggerHandler>,
    info: &ServiceInfo,
    method: &str,
    request: Request<Req>,
) -> Result<Response<Res>, Status>
where
    Req: Serialize + Send + 'static,
    Res: DeserializeOwned + 'static,
{
    let context = InvocationContext::from_metadata(request.metadata());
    let payload = Payload::new(request.into_inner())?;
    let forwarded = routed(info, method, context).with_payload(payload);

    debug!(service = info.service_name, method, "forwarding unary call");
    let reply = handler.call_handler(forwarded).await.map_err(|e| {
        error!(service = info.service_name, method, error = %e, "handler failed");
        e
    })?;

    let res = unary_reply::<Res>(reply).map_err(|e| {
        error!(service = info.service_name, method, error = %e, "unusable handler reply");
        e
    })?;
    Ok(Response::new(res))
}

/// Run the handler for a call whose responses are streamed back.
///
/// The handler runs in its own task so responses flow while it pumps; a
/// failure ends the response stream with the corresponding status.
fn spawn_streaming_handler<Res>(
    handler: Arc<dyn TriggerHandler>,
    info: &ServiceInfo,
    method: &str,
    forwarded: HandlerRequest,
    responses: ResponseSender<Res>,
) where
    Res: Send + 'static,
{
    let service = info.service_name;
    let method = method.to_string();
    tokio::spawn(async move {
        let outcome = match handler.call_handler(forwarded).await {
            Ok(reply) => stream_reply(&reply),
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            error!(service, method = %method, error = %err, "streaming handler failed");
            if responses.fail(err.into()).await.is_err() {
                debug!(service, method = %method, "caller went away before the error was sent");
            }
        }
    });
}

/// Serve a server-streaming call through the handler.
pub async fn server_streaming<Req, Res>(
    handler: &Arc<dyn TriggerHandler>,
    info: &ServiceInfo,
    method: &str,
    request: Request<Req>,
) -> Result<Response<ResponseStream<Res>>, Status>
where
    Req: Serialize + Send + 'static,
    Res: Send + 'static,
{
    let context = InvocationContext::from_metadata(request.metadata());
    let payload = Payload::new(request.into_inner())?;
    let (responses, stream) = ResponseSender::channel(DEFAULT_CHANNEL_BUFFER);
    let call = ServerCall::<Req, Res>::new(StreamReceiver::empty(), responses.clone());

    let forwarded = routed(info, method, context)
        .with_payload(payload)
        .with_stream(StreamHandle::new(call));

    debug!(service = info.service_name, method, "forwarding server-streaming call");
    spawn_streaming_handler(Arc::clone(handler), info, method, forwarded, responses);
    Ok(Response::new(stream))
}

/// Serve a client-streaming call through the handler.
///
/// The handler consumes the request stream and answers through the
/// handle's `send_and_close`.
pub async fn client_streaming<Req, Res>(
    handler: &Arc<dyn TriggerHandler>,
    info: &ServiceInfo,
    method: &str,
    request: Request<Streaming<Req>>,
) -> Result<Response<Res>, Status>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    let context = InvocationContext::from_metadata(request.metadata());
    let inbound = StreamReceiver::new(request.into_inner());
    let (responses, stream) = ResponseSender::channel(1);
    let call = ServerCall::<Req, Res>::new(inbound, responses);

    let forwarded = routed(info, method, context).with_stream(StreamHandle::new(call));

    debug!(service = info.service_name, method, "forwarding client-streaming call");
    let reply = handler.call_handler(forwarded).await?;
    stream_reply(&reply)?;

    match stream.into_inner().try_recv() {
        Ok(Ok(res)) => Ok(Response::new(res)),
        Ok(Err(status)) => Err(status),
        Err(_) => Err(AdapterError::NoReply.into()),
    }
}

/// Serve a bidirectional-streaming call through the handler.
pub async fn bidirectional<Req, Res>(
    handler: &Arc<dyn TriggerHandler>,
    info: &ServiceInfo,
    method: &str,
    request: Request<Streaming<Req>>,
) -> Result<Response<ResponseStream<Res>>, Status>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    let context = InvocationContext::from_metadata(request.metadata());
    let inbound = StreamReceiver::new(request.into_inner());
    let (responses, stream) = ResponseSender::channel(DEFAULT_CHANNEL_BUFFER);
    let call = ServerCall::<Req, Res>::new(inbound, responses.clone());

    let forwarded = routed(info, method, context).with_stream(StreamHandle::new(call));

    debug!(service = info.service_name, method, "forwarding bidirectional call");
    spawn_streaming_handler(Arc::clone(handler), info, method, forwarded, responses);
    Ok(Response::new(stream))
}
