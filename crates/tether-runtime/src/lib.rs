// ABOUTME: Runtime support for adapters generated by tether-codegen.
// ABOUTME: Provides the handler contract, stream wrappers, relays, shape-specific adapter logic and the service registry.

pub mod client;
pub mod codec;
pub mod error;
pub mod handler;
pub mod registry;
pub mod relay;
pub mod server;
pub mod stream;

// Error types
pub use error::{AdapterError, STREAMING_NOT_ALLOWED};

// Handler contract
pub use handler::{
    FnHandler, HandlerFuture, HandlerRequest, InvocationContext, Reply, TriggerHandler,
};

// Intermediate representation
pub use codec::{Payload, ERROR_FIELD};

// Stream management
pub use stream::{
    MessageSink, MessageSource, OutboundStream, ResponseSender, ResponseStream, ServerCall,
    StreamHandle, StreamReceiver, StreamSender, DEFAULT_CHANNEL_BUFFER,
};

// Relays
pub use relay::{relay_bidirectional, RelayOptions, RelayStats};

// Client adapter support
pub use client::{InvocationRequest, RelayMode};

// Registry
pub use registry::{ClientService, ServerService, ServiceInfo, ServiceRegistry};

// Re-exports used by generated code
pub use async_trait::async_trait;
pub use serde_json;
pub use tonic;
