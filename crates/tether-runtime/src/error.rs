// ABOUTME: Error types for the tether-runtime crate.
// ABOUTME: Provides AdapterError and its conversions to and from tonic::Status.

use thiserror::Error;
use tonic::Status;

/// Message used when streaming is attempted through a non-streaming relay.
pub const STREAMING_NOT_ALLOWED: &str = "streaming operation is not allowed in rest to grpc case";

/// Errors raised by generated adapters and the relay helpers they call.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Error returned by a stub or carried through unchanged from the peer.
    #[error("{}", .0.message())]
    Rpc(#[from] Status),

    /// The handler reported an error, either directly or through its reply.
    #[error("{0}")]
    Handler(String),

    /// The handler returned neither a reply nor an error.
    #[error("no reply from handler")]
    NoReply,

    /// A reply or payload could not be converted into the typed message.
    #[error("decode failed: {0}")]
    Decode(String),

    /// A typed message could not be converted into the intermediate form.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Streaming was requested while relaying in a non-streaming mode.
    #[error("{}", STREAMING_NOT_ALLOWED)]
    StreamingNotAllowed,

    /// The invocation named a method the service does not have.
    #[error("method not available: {0}")]
    MethodNotAvailable(String),

    /// A streaming method was invoked without a streaming handle.
    #[error("missing stream handle for {0}")]
    MissingStream(String),

    /// The streaming handle carries different message types than expected.
    #[error("stream handle type mismatch: expected {expected}")]
    StreamTypeMismatch { expected: &'static str },

    /// The peer side of a stream went away.
    #[error("stream closed unexpectedly")]
    StreamClosed,

    /// The relay was cancelled before both sides finished.
    #[error("relay cancelled")]
    Cancelled,

    /// The relay ran past its deadline.
    #[error("relay deadline exceeded")]
    DeadlineExceeded,

    /// A relay task panicked or was aborted.
    #[error("relay task failed: {0}")]
    Task(String),
}

impl From<AdapterError> for Status {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Rpc(status) => status,
            AdapterError::Handler(msg) => Status::unknown(msg),
            AdapterError::NoReply => Status::internal(err.to_string()),
            AdapterError::Decode(_) | AdapterError::Encode(_) => Status::internal(err.to_string()),
            AdapterError::StreamingNotAllowed => Status::failed_precondition(err.to_string()),
            AdapterError::MethodNotAvailable(_) => Status::unimplemented(err.to_string()),
            AdapterError::MissingStream(_) | AdapterError::StreamTypeMismatch { .. } => {
                Status::internal(err.to_string())
            }
            AdapterError::StreamClosed => Status::unavailable(err.to_string()),
            AdapterError::Cancelled => Status::cancelled(err.to_string()),
            AdapterError::DeadlineExceeded => Status::deadline_exceeded(err.to_string()),
            AdapterError::Task(_) => Status::internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Decode(err.to_string())
    }
}
