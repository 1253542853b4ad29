// ABOUTME: Per-service, per-role generation context handed to the renderers.
// ABOUTME: Buckets methods by shape and carries the naming targets of the generated code.

use chrono::{DateTime, Utc};

use crate::descriptor::{MethodDescriptor, ServiceDescriptor};
use crate::naming;
use crate::shape::Shape;

/// Which side of the bridge an artifact implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Trigger side: serves calls and forwards them to the handler.
    Server,
    /// Activity side: invokes the service through the generated stub.
    Client,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Server, Role::Client];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Server => "server",
            Role::Client => "client",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings shared by every artifact of one run.
#[derive(Debug, Clone)]
pub struct Target {
    /// Module name recorded in the generated headers.
    pub package: String,
    /// Base name of the definition file.
    pub proto_name: String,
    /// Package declared in the definition file.
    pub proto_package: Option<String>,
    /// Path of the runtime crate.
    pub runtime_crate: String,
    /// Path from the adapter module to the tonic-build module.
    pub proto_module: String,
    pub timestamp: DateTime<Utc>,
}

impl Target {
    /// Build the context of one service and role.
    pub fn context<'a>(
        &'a self,
        service: &'a ServiceDescriptor,
        role: Role,
    ) -> GenerationContext<'a> {
        let mut ctx = GenerationContext {
            target: self,
            service,
            role,
            unary: Vec::new(),
            server_streaming: Vec::new(),
            client_streaming: Vec::new(),
            bidirectional: Vec::new(),
        };
        for method in &service.methods {
            match method.shape() {
                Shape::Unary => ctx.unary.push(method),
                Shape::ServerStreaming => ctx.server_streaming.push(method),
                Shape::ClientStreaming => ctx.client_streaming.push(method),
                Shape::Bidirectional => ctx.bidirectional.push(method),
            }
        }
        ctx
    }
}

/// Everything a renderer needs for one artifact.
#[derive(Debug, Clone)]
pub struct GenerationContext<'a> {
    pub target: &'a Target,
    pub service: &'a ServiceDescriptor,
    pub role: Role,
    pub unary: Vec<&'a MethodDescriptor>,
    pub server_streaming: Vec<&'a MethodDescriptor>,
    pub client_streaming: Vec<&'a MethodDescriptor>,
    pub bidirectional: Vec<&'a MethodDescriptor>,
}

impl<'a> GenerationContext<'a> {
    pub fn has_streaming(&self) -> bool {
        !(self.server_streaming.is_empty()
            && self.client_streaming.is_empty()
            && self.bidirectional.is_empty())
    }

    /// Whether any method answers with a stream.
    pub fn streams_responses(&self) -> bool {
        !(self.server_streaming.is_empty() && self.bidirectional.is_empty())
    }

    /// Whether any method receives a stream.
    pub fn streams_requests(&self) -> bool {
        !(self.client_streaming.is_empty() && self.bidirectional.is_empty())
    }

    /// Methods in shape order: unary, server-streaming, client-streaming,
    /// bidirectional; declaration order within each shape.
    pub fn methods_by_shape(&self) -> impl Iterator<Item = &'a MethodDescriptor> + '_ {
        self.unary
            .iter()
            .chain(&self.server_streaming)
            .chain(&self.client_streaming)
            .chain(&self.bidirectional)
            .copied()
    }

    /// Full path of a message type as seen from the adapter module.
    pub fn message_type(&self, relative: &str) -> String {
        if relative.starts_with("::") || relative.starts_with('(') {
            relative.to_string()
        } else {
            format!("{}::{}", self.target.proto_module, relative)
        }
    }

    /// Path of the tonic-build module for this role.
    pub fn stub_module(&self) -> String {
        format!(
            "{}::{}",
            self.target.proto_module,
            naming::module_name(&self.service.name, self.role.as_str())
        )
    }
}

/// Name of the file an artifact is written to.
pub fn file_name(proto_name: &str, service: &ServiceDescriptor, role: Role) -> String {
    format!("{}.{}.{}.tether.rs", proto_name, service.name, role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn target() -> Target {
        Target {
            package: "petstore".to_string(),
            proto_name: "petstore".to_string(),
            proto_package: Some("petstore".to_string()),
            runtime_crate: "tether_runtime".to_string(),
            proto_module: "super".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    fn service() -> ServiceDescriptor {
        let mut service = ServiceDescriptor::new("PetStoreService");
        service.methods = vec![
            MethodDescriptor::new("Chat", "Msg", "Msg", true, true),
            MethodDescriptor::new("PetById", "PetRequest", "Pet", false, false),
            MethodDescriptor::new("ListPets", "PetRequest", "Pet", false, true),
            MethodDescriptor::new("Upload", "Pet", "Summary", true, false),
            MethodDescriptor::new("Ping", "Empty", "Empty", false, false),
        ];
        service
    }

    #[test]
    fn test_context_buckets_methods_by_shape() {
        let target = target();
        let service = service();
        let ctx = target.context(&service, Role::Server);

        let unary: Vec<&str> = ctx.unary.iter().map(|m| m.proto_name.as_str()).collect();
        assert_eq!(unary, vec!["PetById", "Ping"]);
        assert_eq!(ctx.server_streaming.len(), 1);
        assert_eq!(ctx.client_streaming.len(), 1);
        assert_eq!(ctx.bidirectional.len(), 1);
        assert!(ctx.has_streaming());

        let ordered: Vec<&str> = ctx.methods_by_shape().map(|m| m.proto_name.as_str()).collect();
        assert_eq!(ordered, vec!["PetById", "Ping", "ListPets", "Upload", "Chat"]);
    }

    #[test]
    fn test_unary_only_service_has_no_streaming() {
        let target = target();
        let mut service = ServiceDescriptor::new("Greeter");
        service
            .methods
            .push(MethodDescriptor::new("Hello", "HelloRequest", "HelloReply", false, false));
        let ctx = target.context(&service, Role::Client);
        assert!(!ctx.has_streaming());
        assert!(!ctx.streams_requests());
        assert!(!ctx.streams_responses());
    }

    #[test]
    fn test_paths() {
        let target = target();
        let service = service();
        let ctx = target.context(&service, Role::Client);
        assert_eq!(ctx.stub_module(), "super::pet_store_service_client");
        assert_eq!(ctx.message_type("Pet"), "super::Pet");
        assert_eq!(ctx.message_type("()"), "()");
        assert_eq!(
            ctx.message_type("::prost_types::Timestamp"),
            "::prost_types::Timestamp"
        );
    }

    #[test]
    fn test_file_name() {
        let service = ServiceDescriptor::new("pet_store");
        assert_eq!(
            file_name("petstore", &service, Role::Server),
            "petstore.PetStore.server.tether.rs"
        );
        assert_eq!(
            file_name("petstore", &service, Role::Client),
            "petstore.PetStore.client.tether.rs"
        );
    }
}
