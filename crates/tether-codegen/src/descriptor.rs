// ABOUTME: Descriptors of the services and methods found in a definition file.
// ABOUTME: Built once by the extractor and read by the context builder and renderers.

use crate::naming;
use crate::shape::Shape;

/// One `rpc` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Name as written in the definition file; the routing key.
    pub proto_name: String,
    /// snake_case Rust method name, keyword-escaped.
    pub name: String,
    /// Request type as written, without the `stream` marker.
    pub input_type: String,
    /// Response type as written, without the `stream` marker.
    pub output_type: String,
    /// Rust path of the request type, relative to the package module.
    pub request_type: String,
    /// Rust path of the response type, relative to the package module.
    pub response_type: String,
    pub request_streaming: bool,
    pub response_streaming: bool,
    /// Line the declaration starts on.
    pub line: usize,
}

impl MethodDescriptor {
    pub fn new(
        proto_name: &str,
        input_type: &str,
        output_type: &str,
        request_streaming: bool,
        response_streaming: bool,
    ) -> Self {
        Self {
            proto_name: proto_name.to_string(),
            name: naming::to_snake_ident(proto_name),
            input_type: input_type.to_string(),
            output_type: output_type.to_string(),
            request_type: naming::message_path(input_type, None),
            response_type: naming::message_path(output_type, None),
            request_streaming,
            response_streaming,
            line: 0,
        }
    }

    pub fn shape(&self) -> Shape {
        Shape::classify(self.request_streaming, self.response_streaming)
    }

    /// Name of the associated stream type tonic-build declares for the
    /// method's response stream.
    pub fn stream_type_name(&self) -> String {
        format!("{}Stream", self.proto_name)
    }

    pub(crate) fn resolve_types(&mut self, package: Option<&str>) {
        self.request_type = naming::message_path(&self.input_type, package);
        self.response_type = naming::message_path(&self.output_type, package);
    }
}

/// One `service` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Name as written in the definition file.
    pub proto_name: String,
    /// UpperCamelCase name tonic-build uses for the service trait.
    pub name: String,
    /// Methods in declaration order.
    pub methods: Vec<MethodDescriptor>,
    /// Line the `service` keyword is on.
    pub line: usize,
}

impl ServiceDescriptor {
    pub fn new(proto_name: &str) -> Self {
        Self {
            proto_name: proto_name.to_string(),
            name: naming::to_upper_camel(proto_name),
            methods: Vec::new(),
            line: 0,
        }
    }

    pub fn method(&self, proto_name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.proto_name == proto_name)
    }

    pub fn has_streaming(&self) -> bool {
        self.methods.iter().any(|m| m.shape().is_streaming())
    }
}

/// Everything extracted from one definition file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtoFile {
    /// Value of the `package` declaration, if any.
    pub package: Option<String>,
    /// Services in file order.
    pub services: Vec<ServiceDescriptor>,
}

impl ProtoFile {
    pub fn service(&self, proto_name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.proto_name == proto_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_descriptor_canonical_names() {
        let method = MethodDescriptor::new("ListPets", "list_request", "Pet", false, true);
        assert_eq!(method.name, "list_pets");
        assert_eq!(method.request_type, "ListRequest");
        assert_eq!(method.shape(), Shape::ServerStreaming);
        assert_eq!(method.stream_type_name(), "ListPetsStream");
    }

    #[test]
    fn test_resolve_types_uses_package() {
        let mut method =
            MethodDescriptor::new("Convert", "petstore.Price", "common.Money", false, false);
        method.resolve_types(Some("petstore"));
        assert_eq!(method.request_type, "Price");
        assert_eq!(method.response_type, "super::common::Money");
    }

    #[test]
    fn test_service_streaming_flag() {
        let mut service = ServiceDescriptor::new("pet_store");
        assert_eq!(service.name, "PetStore");
        service
            .methods
            .push(MethodDescriptor::new("Get", "A", "B", false, false));
        assert!(!service.has_streaming());
        service
            .methods
            .push(MethodDescriptor::new("Chat", "A", "B", true, true));
        assert!(service.has_streaming());
        assert!(service.method("Chat").is_some());
    }
}
