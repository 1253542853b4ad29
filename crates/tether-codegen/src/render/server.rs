// ABOUTME: Renders the trigger (server) adapter of a service.
// ABOUTME: Implements the tonic-build server trait by forwarding each call to the trigger handler.

use super::str_literal;
use crate::context::GenerationContext;
use crate::descriptor::MethodDescriptor;
use crate::shape::Shape;

pub(super) fn render(ctx: &GenerationContext<'_>, buf: &mut String) {
    let rt = &ctx.target.runtime_crate;
    let trait_name = &ctx.service.name;
    let adapter = format!("{trait_name}Trigger");
    let has_methods = !ctx.service.methods.is_empty();

    buf.push_str("use std::sync::Arc;\n\n");
    if has_methods {
        buf.push_str(&format!("use {rt}::server;\n"));
    }
    buf.push_str(&format!("use {rt}::tonic::service::RoutesBuilder;\n"));
    if has_methods {
        let mut tonic_items = vec!["Request", "Response", "Status"];
        if ctx.streams_requests() {
            tonic_items.push("Streaming");
        }
        buf.push_str(&format!("use {rt}::tonic::{{{}}};\n", tonic_items.join(", ")));
    }
    if ctx.streams_responses() {
        buf.push_str(&format!("use {rt}::ResponseStream;\n"));
    }
    buf.push_str(&format!(
        "use {rt}::{{ServerService, ServiceInfo, ServiceRegistry, TriggerHandler}};\n\n"
    ));
    buf.push_str(&format!(
        "use {}::{{{trait_name}, {trait_name}Server}};\n\n",
        ctx.stub_module()
    ));

    buf.push_str("/// Identity of this adapter.\n");
    buf.push_str(&format!(
        "pub const SERVICE_INFO: ServiceInfo = ServiceInfo::new({}, {});\n\n",
        str_literal(&ctx.target.proto_name),
        str_literal(&ctx.service.proto_name)
    ));

    buf.push_str(&format!(
        "/// Serves `{}` by forwarding every call to a trigger handler.\n",
        ctx.service.proto_name
    ));
    buf.push_str("#[derive(Clone)]\n");
    buf.push_str(&format!("pub struct {adapter} {{\n"));
    buf.push_str("    handler: Arc<dyn TriggerHandler>,\n");
    buf.push_str("}\n\n");

    buf.push_str(&format!("impl {adapter} {{\n"));
    buf.push_str("    pub fn new(handler: Arc<dyn TriggerHandler>) -> Self {\n");
    buf.push_str("        Self { handler }\n");
    buf.push_str("    }\n\n");
    buf.push_str("    /// Wrap the adapter in the tonic service.\n");
    buf.push_str(&format!(
        "    pub fn into_service(self) -> {trait_name}Server<Self> {{\n"
    ));
    buf.push_str(&format!("        {trait_name}Server::new(self)\n"));
    buf.push_str("    }\n");
    buf.push_str("}\n\n");

    buf.push_str(&format!("#[{rt}::async_trait]\n"));
    buf.push_str(&format!("impl {trait_name} for {adapter} {{\n"));
    let mut first = true;
    for method in ctx.methods_by_shape() {
        if !first {
            buf.push('\n');
        }
        first = false;
        method_impl(ctx, method, buf);
    }
    buf.push_str("}\n\n");

    buf.push_str(&format!("/// Registry entry mounting [`{adapter}`].\n"));
    buf.push_str("#[derive(Debug, Clone, Copy, Default)]\n");
    buf.push_str(&format!("pub struct {trait_name}ServerAdapter;\n\n"));
    buf.push_str(&format!("impl ServerService for {trait_name}ServerAdapter {{\n"));
    buf.push_str("    fn service_info(&self) -> &ServiceInfo {\n");
    buf.push_str("        &SERVICE_INFO\n");
    buf.push_str("    }\n\n");
    buf.push_str(
        "    fn add_to(&self, routes: &mut RoutesBuilder, handler: Arc<dyn TriggerHandler>) {\n",
    );
    buf.push_str(&format!(
        "        routes.add_service({adapter}::new(handler).into_service());\n"
    ));
    buf.push_str("    }\n");
    buf.push_str("}\n\n");

    buf.push_str("/// Register the trigger adapter.\n");
    buf.push_str("pub fn register(registry: &mut ServiceRegistry) {\n");
    buf.push_str(&format!(
        "    registry.register_server(Arc::new({trait_name}ServerAdapter));\n"
    ));
    buf.push_str("}\n");
}

fn method_impl(ctx: &GenerationContext<'_>, method: &MethodDescriptor, buf: &mut String) {
    let request = ctx.message_type(&method.request_type);
    let response = ctx.message_type(&method.response_type);
    let shape = method.shape();

    let request_param = if shape.streams_requests() {
        format!("Request<Streaming<{request}>>")
    } else {
        format!("Request<{request}>")
    };
    let response_body = if shape.streams_responses() {
        let stream_type = method.stream_type_name();
        buf.push_str(&format!(
            "    type {stream_type} = ResponseStream<{response}>;\n\n"
        ));
        format!("Self::{stream_type}")
    } else {
        response
    };
    let forward = match shape {
        Shape::Unary => "unary",
        Shape::ServerStreaming => "server_streaming",
        Shape::ClientStreaming => "client_streaming",
        Shape::Bidirectional => "bidirectional",
    };

    buf.push_str(&format!("    async fn {}(\n", method.name));
    buf.push_str("        &self,\n");
    buf.push_str(&format!("        request: {request_param},\n"));
    buf.push_str(&format!(
        "    ) -> Result<Response<{response_body}>, Status> {{\n"
    ));
    buf.push_str(&format!(
        "        server::{forward}(&self.handler, &SERVICE_INFO, {}, request).await\n",
        str_literal(&method.proto_name)
    ));
    buf.push_str("    }\n");
}

#[cfg(test)]
mod tests {
    use super::super::render;
    use super::super::tests::{pet_store, target};
    use crate::context::Role;
    use crate::descriptor::{MethodDescriptor, ServiceDescriptor};

    #[test]
    fn test_server_imports_and_identity() {
        let target = target();
        let service = pet_store();
        let out = render(&target.context(&service, Role::Server)).unwrap();

        assert!(out.contains(
            "use tether_runtime::tonic::{Request, Response, Status, Streaming};\n"
        ));
        assert!(out.contains("use tether_runtime::ResponseStream;\n"));
        assert!(out.contains(
            "use super::pet_store_service_server::{PetStoreService, PetStoreServiceServer};\n"
        ));
        assert!(out.contains(
            "pub const SERVICE_INFO: ServiceInfo = ServiceInfo::new(\"petstore\", \"PetStoreService\");"
        ));
        assert!(out.contains("impl PetStoreService for PetStoreServiceTrigger {"));
    }

    #[test]
    fn test_server_unary_method() {
        let target = target();
        let service = pet_store();
        let out = render(&target.context(&service, Role::Server)).unwrap();
        assert!(out.contains(
            "    async fn pet_by_id(\n        &self,\n        request: Request<super::PetRequest>,\n    ) -> Result<Response<super::Pet>, Status> {\n        server::unary(&self.handler, &SERVICE_INFO, \"PetById\", request).await\n    }\n"
        ));
    }

    #[test]
    fn test_server_streaming_shapes() {
        let target = target();
        let service = pet_store();
        let out = render(&target.context(&service, Role::Server)).unwrap();

        assert!(out.contains("    type ListPetsStream = ResponseStream<super::Pet>;\n"));
        assert!(out.contains(") -> Result<Response<Self::ListPetsStream>, Status> {"));
        assert!(out.contains(
            "server::server_streaming(&self.handler, &SERVICE_INFO, \"ListPets\", request)"
        ));

        assert!(out.contains(
            "        request: Request<Streaming<super::Pet>>,\n    ) -> Result<Response<super::UploadSummary>, Status> {"
        ));
        assert!(out.contains(
            "server::client_streaming(&self.handler, &SERVICE_INFO, \"UploadPets\", request)"
        ));

        assert!(out.contains("    type BulkUsersStream = ResponseStream<super::User>;\n"));
        assert!(out.contains(
            "        request: Request<Streaming<super::User>>,\n    ) -> Result<Response<Self::BulkUsersStream>, Status> {"
        ));
        assert!(out.contains(
            "server::bidirectional(&self.handler, &SERVICE_INFO, \"BulkUsers\", request)"
        ));
    }

    #[test]
    fn test_server_registration() {
        let target = target();
        let service = pet_store();
        let out = render(&target.context(&service, Role::Server)).unwrap();
        assert!(out.contains("impl ServerService for PetStoreServiceServerAdapter {"));
        assert!(out.contains(
            "routes.add_service(PetStoreServiceTrigger::new(handler).into_service());"
        ));
        assert!(out.contains("registry.register_server(Arc::new(PetStoreServiceServerAdapter));"));
    }

    #[test]
    fn test_unary_only_server_skips_stream_imports() {
        let target = target();
        let mut service = ServiceDescriptor::new("Greeter");
        service
            .methods
            .push(MethodDescriptor::new("type", "HelloRequest", "HelloReply", false, false));
        let out = render(&target.context(&service, Role::Server)).unwrap();

        assert!(out.contains("use tether_runtime::tonic::{Request, Response, Status};\n"));
        assert!(!out.contains("ResponseStream"));
        assert!(!out.contains("Streaming"));
        assert!(out.contains("    async fn r#type(\n"));
        assert!(out.contains("\"type\", request).await"));
    }
}
