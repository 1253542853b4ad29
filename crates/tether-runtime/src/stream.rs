// ABOUTME: Streaming handles shared by the server and client sides of an adapter.
// ABOUTME: Provides typed sender/receiver wrappers, the per-call ServerCall handle and its type-erased form.

use std::any::{type_name, Any};
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;

use crate::error::AdapterError;

/// Default buffer size for outbound message channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 100;

/// Stream type returned to tonic for server-streaming and bidirectional calls.
pub type ResponseStream<T> = ReceiverStream<Result<T, Status>>;

/// Anything a relay pump can pull messages from.
#[async_trait]
pub trait MessageSource<T>: Send {
    /// Receive the next message. `Ok(None)` is a clean end-of-stream.
    async fn recv(&mut self) -> Result<Option<T>, AdapterError>;
}

/// Anything a relay pump can push messages into.
#[async_trait]
pub trait MessageSink<T>: Send {
    /// Send one message.
    async fn send(&mut self, msg: T) -> Result<(), AdapterError>;
}

/// Sender half of an outbound request stream.
///
/// Wraps an mpsc sender whose receiver is handed to a tonic client call.
/// Dropping every clone half-closes the call.
#[derive(Debug)]
pub struct StreamSender<T> {
    inner: mpsc::Sender<T>,
}

impl<T> Clone for StreamSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> StreamSender<T> {
    /// Create a stream sender from an mpsc sender.
    pub fn new(sender: mpsc::Sender<T>) -> Self {
        Self { inner: sender }
    }

    /// Send a message on the stream.
    pub async fn send(&self, msg: T) -> Result<(), AdapterError> {
        self.inner
            .send(msg)
            .await
            .map_err(|_| AdapterError::StreamClosed)
    }

    /// Check if the stream is closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Get the capacity of the underlying channel.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

#[async_trait]
impl<T: Send + 'static> MessageSink<T> for StreamSender<T> {
    async fn send(&mut self, msg: T) -> Result<(), AdapterError> {
        StreamSender::send(self, msg).await
    }
}

/// Sender for the responses of a call being served.
///
/// Messages end up in the [`ResponseStream`] returned to tonic. Sending an
/// `Err` status terminates the call with that status.
#[derive(Debug)]
pub struct ResponseSender<T> {
    inner: mpsc::Sender<Result<T, Status>>,
}

impl<T> Clone for ResponseSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> ResponseSender<T> {
    /// Create a response sender from an mpsc sender.
    pub fn new(sender: mpsc::Sender<Result<T, Status>>) -> Self {
        Self { inner: sender }
    }

    /// Create a sender and the stream tonic should serve from it.
    pub fn channel(buffer_size: usize) -> (Self, ResponseStream<T>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (Self::new(tx), ReceiverStream::new(rx))
    }

    /// Send one response message.
    pub async fn send(&self, msg: T) -> Result<(), AdapterError> {
        self.inner
            .send(Ok(msg))
            .await
            .map_err(|_| AdapterError::StreamClosed)
    }

    /// Terminate the call with an error status.
    pub async fn fail(&self, status: Status) -> Result<(), AdapterError> {
        self.inner
            .send(Err(status))
            .await
            .map_err(|_| AdapterError::StreamClosed)
    }

    /// Check if the stream is closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[async_trait]
impl<T: Send + 'static> MessageSink<T> for ResponseSender<T> {
    async fn send(&mut self, msg: T) -> Result<(), AdapterError> {
        ResponseSender::send(self, msg).await
    }
}

/// Receiver half of a message stream.
///
/// Wraps a tonic `Streaming` or any other stream of results.
pub struct StreamReceiver<T> {
    inner: Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>,
}

impl<T: Send + 'static> StreamReceiver<T> {
    /// Create a stream receiver from a tonic `Streaming` or any compatible stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, Status>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// A receiver that is already at end-of-stream.
    pub fn empty() -> Self {
        Self::new(futures::stream::empty())
    }

    /// Receive the next message from the stream.
    pub async fn recv(&mut self) -> Result<Option<T>, AdapterError> {
        match self.inner.next().await {
            Some(Ok(msg)) => Ok(Some(msg)),
            Some(Err(status)) => Err(AdapterError::Rpc(status)),
            None => Ok(None),
        }
    }
}

impl<T> std::fmt::Debug for StreamReceiver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReceiver").finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: Send + 'static> MessageSource<T> for StreamReceiver<T> {
    async fn recv(&mut self) -> Result<Option<T>, AdapterError> {
        StreamReceiver::recv(self).await
    }
}

/// A pair of sender and outbound stream for initiating a streaming client call.
///
/// The stream should be passed to the gRPC client method, while the sender
/// is used to push request messages.
pub struct OutboundStream<T> {
    /// Sender for pushing messages to the stream.
    pub sender: StreamSender<T>,
    /// The stream to pass to the gRPC method.
    pub stream: ReceiverStream<T>,
}

impl<T> OutboundStream<T> {
    /// Create an outbound stream pair with the specified buffer size.
    pub fn new(buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer_size);
        Self {
            sender: StreamSender::new(tx),
            stream: ReceiverStream::new(rx),
        }
    }

    /// Create an outbound stream pair with the default buffer size.
    pub fn with_default_buffer() -> Self {
        Self::new(DEFAULT_CHANNEL_BUFFER)
    }
}

/// The serving side of one streaming call.
///
/// Requests arrive on `inbound`, responses leave through `outbound`. For
/// server-streaming calls the inbound side is empty.
#[derive(Debug)]
pub struct ServerCall<Req, Res> {
    inbound: StreamReceiver<Req>,
    outbound: ResponseSender<Res>,
}

impl<Req: Send + 'static, Res: Send + 'static> ServerCall<Req, Res> {
    /// Create a server call from its two halves.
    pub fn new(inbound: StreamReceiver<Req>, outbound: ResponseSender<Res>) -> Self {
        Self { inbound, outbound }
    }

    /// Receive the next request message.
    pub async fn recv(&mut self) -> Result<Option<Req>, AdapterError> {
        self.inbound.recv().await
    }

    /// Send one response message.
    ///
    /// Takes `&mut self` so a handler future holding the call stays `Send`.
    pub async fn send(&mut self, msg: Res) -> Result<(), AdapterError> {
        self.outbound.send(msg).await
    }

    /// Send the single response of a client-streaming call and close it.
    pub async fn send_and_close(self, msg: Res) -> Result<(), AdapterError> {
        self.outbound.send(msg).await
    }

    /// Split into receiver and sender.
    pub fn split(self) -> (StreamReceiver<Req>, ResponseSender<Res>) {
        (self.inbound, self.outbound)
    }
}

/// A type-erased [`ServerCall`], as carried through the generic handler.
pub struct StreamHandle {
    inner: Box<dyn Any + Send>,
    description: &'static str,
}

impl StreamHandle {
    /// Erase the message types of a server call.
    pub fn new<Req: Send + 'static, Res: Send + 'static>(call: ServerCall<Req, Res>) -> Self {
        Self {
            inner: Box::new(call),
            description: type_name::<ServerCall<Req, Res>>(),
        }
    }

    /// Recover the typed server call.
    pub fn downcast<Req: Send + 'static, Res: Send + 'static>(
        self,
    ) -> Result<ServerCall<Req, Res>, AdapterError> {
        self.inner
            .downcast::<ServerCall<Req, Res>>()
            .map(|call| *call)
            .map_err(|_| AdapterError::StreamTypeMismatch {
                expected: type_name::<ServerCall<Req, Res>>(),
            })
    }

    /// Type name of the erased call, for diagnostics.
    pub fn description(&self) -> &'static str {
        self.description
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("call", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outbound_stream_creation() {
        let outbound: OutboundStream<String> = OutboundStream::new(32);
        assert!(!outbound.sender.is_closed());
        assert_eq!(outbound.sender.capacity(), 32);
    }

    #[test]
    fn test_default_channel_buffer() {
        let outbound: OutboundStream<String> = OutboundStream::with_default_buffer();
        assert_eq!(outbound.sender.capacity(), DEFAULT_CHANNEL_BUFFER);
    }

    #[tokio::test]
    async fn test_stream_sender_send_closed() {
        let (tx, rx) = mpsc::channel::<String>(10);
        let sender = StreamSender::new(tx);
        drop(rx);

        let result = sender.send("hello".to_string()).await;
        assert!(matches!(result.unwrap_err(), AdapterError::StreamClosed));
    }

    #[tokio::test]
    async fn test_stream_receiver_yields_messages_then_end() {
        let items = vec![Ok(1u32), Ok(2u32)];
        let mut receiver = StreamReceiver::new(futures::stream::iter(items));

        assert_eq!(receiver.recv().await.unwrap(), Some(1));
        assert_eq!(receiver.recv().await.unwrap(), Some(2));
        assert_eq!(receiver.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stream_receiver_surfaces_status() {
        let items = vec![Ok(1u32), Err(Status::aborted("peer gone"))];
        let mut receiver = StreamReceiver::new(futures::stream::iter(items));

        assert_eq!(receiver.recv().await.unwrap(), Some(1));
        let err = receiver.recv().await.unwrap_err();
        assert!(matches!(err, AdapterError::Rpc(ref s) if s.message() == "peer gone"));
    }

    #[tokio::test]
    async fn test_empty_receiver() {
        let mut receiver: StreamReceiver<String> = StreamReceiver::empty();
        assert_eq!(receiver.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_response_sender_fail_terminates_stream() {
        let (sender, stream) = ResponseSender::<u32>::channel(4);
        sender.send(7).await.unwrap();
        sender.fail(Status::unknown("boom")).await.unwrap();
        drop(sender);

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(*items[0].as_ref().unwrap(), 7);
        assert_eq!(items[1].as_ref().unwrap_err().message(), "boom");
    }

    #[tokio::test]
    async fn test_stream_handle_round_trip() {
        let (sender, _stream) = ResponseSender::<String>::channel(4);
        let call = ServerCall::new(StreamReceiver::<u32>::empty(), sender);
        let handle = StreamHandle::new(call);
        assert!(handle.description().contains("ServerCall"));

        let mut call = handle.downcast::<u32, String>().unwrap();
        call.send("pong".to_string()).await.unwrap();
    }

    /// Message type that is deliberately not `Clone`.
    #[derive(Debug, PartialEq)]
    struct Ticket(u32);

    #[tokio::test]
    async fn test_senders_clone_without_clonable_messages() {
        let (responses, stream) = ResponseSender::<Ticket>::channel(4);
        let second = responses.clone();
        responses.send(Ticket(1)).await.unwrap();
        second.send(Ticket(2)).await.unwrap();
        drop((responses, second));
        let received: Vec<Ticket> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(received, vec![Ticket(1), Ticket(2)]);

        let (tx, mut rx) = mpsc::channel::<Ticket>(4);
        let sender = StreamSender::new(tx);
        sender.clone().send(Ticket(3)).await.unwrap();
        assert_eq!(rx.recv().await, Some(Ticket(3)));
    }

    fn assert_send<T: Send>(value: T) -> T {
        value
    }

    #[tokio::test]
    async fn test_pumping_through_a_server_call_is_send() {
        let inbound = StreamReceiver::new(futures::stream::iter(vec![Ok(Ticket(4))]));
        let (responses, stream) = ResponseSender::<Ticket>::channel(4);
        let mut call = ServerCall::new(inbound, responses);

        let echo = assert_send(async move {
            while let Some(ticket) = call.recv().await? {
                call.send(Ticket(ticket.0 * 10)).await?;
            }
            Ok::<_, AdapterError>(())
        });
        tokio::spawn(echo).await.unwrap().unwrap();

        let received: Vec<Ticket> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(received, vec![Ticket(40)]);
    }

    #[test]
    fn test_stream_handle_type_mismatch() {
        let (sender, _stream) = ResponseSender::<String>::channel(4);
        let call = ServerCall::new(StreamReceiver::<u32>::empty(), sender);
        let handle = StreamHandle::new(call);

        let err = handle.downcast::<String, String>().unwrap_err();
        assert!(matches!(err, AdapterError::StreamTypeMismatch { .. }));
    }
}
