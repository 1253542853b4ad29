// ABOUTME: Adapter generator bridging gRPC services in a definition file to the trigger/activity contract.
// ABOUTME: Extracts services, classifies RPC shapes, runs tonic-build and renders server and client adapters.

pub mod compiler;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod extract;
pub mod generate;
pub mod naming;
pub mod render;
pub mod scanner;
pub mod shape;

// Configuration
pub use config::GenerateConfig;

// Error types
pub use error::{ExtractError, GenerateError, RenderError};

// Extraction
pub use descriptor::{MethodDescriptor, ProtoFile, ServiceDescriptor};
pub use extract::extract;
pub use shape::Shape;

// Rendering
pub use context::{file_name, GenerationContext, Role, Target};
pub use render::render;

// Orchestration
pub use compiler::{ProtoCompiler, TonicCompiler};
pub use generate::{generate, inspect, GenerateReport, Generator};
