// ABOUTME: Renders the activity (client) adapter of a service.
// ABOUTME: Dispatches invocations by method name to shape-specific relays around the tonic-build stub.

use super::str_literal;
use crate::context::GenerationContext;
use crate::descriptor::MethodDescriptor;
use crate::shape::Shape;

pub(super) fn render(ctx: &GenerationContext<'_>, buf: &mut String) {
    let rt = &ctx.target.runtime_crate;
    let service = &ctx.service.name;
    let adapter = format!("{service}Activity");
    let has_methods = !ctx.service.methods.is_empty();

    buf.push_str("use std::sync::Arc;\n\n");
    if has_methods {
        buf.push_str(&format!("use {rt}::client;\n"));
    }
    buf.push_str(&format!("use {rt}::serde_json::Value;\n"));
    buf.push_str(&format!("use {rt}::tonic::transport::Channel;\n"));
    if ctx.streams_responses() {
        buf.push_str(&format!("use {rt}::StreamReceiver;\n"));
    }
    buf.push_str(&format!(
        "use {rt}::{{AdapterError, ClientService, InvocationRequest, ServiceInfo, ServiceRegistry}};\n\n"
    ));
    if has_methods {
        buf.push_str(&format!("use {}::{service}Client;\n\n", ctx.stub_module()));
    }

    buf.push_str("/// Identity of this adapter.\n");
    buf.push_str(&format!(
        "pub const SERVICE_INFO: ServiceInfo = ServiceInfo::new({}, {});\n\n",
        str_literal(&ctx.target.proto_name),
        str_literal(&ctx.service.proto_name)
    ));

    buf.push_str(&format!(
        "/// Invokes `{}` on behalf of activities.\n",
        ctx.service.proto_name
    ));
    buf.push_str("#[derive(Debug, Clone, Copy, Default)]\n");
    buf.push_str(&format!("pub struct {adapter};\n\n"));

    buf.push_str(&format!("#[{rt}::async_trait]\n"));
    buf.push_str(&format!("impl ClientService for {adapter} {{\n"));
    buf.push_str("    fn service_info(&self) -> &ServiceInfo {\n");
    buf.push_str("        &SERVICE_INFO\n");
    buf.push_str("    }\n\n");
    buf.push_str("    async fn invoke(\n");
    buf.push_str("        &self,\n");
    let channel = if has_methods { "channel" } else { "_channel" };
    buf.push_str(&format!("        {channel}: Channel,\n"));
    buf.push_str("        request: InvocationRequest,\n");
    buf.push_str("    ) -> Result<Value, AdapterError> {\n");
    if has_methods {
        buf.push_str(&format!("        let mut stub = {service}Client::new(channel);\n"));
    }
    buf.push_str("        let method = request.method_name.clone();\n");
    buf.push_str("        match method.as_str() {\n");
    for method in ctx.methods_by_shape() {
        dispatch_arm(ctx, method, buf);
    }
    buf.push_str(
        "            other => Err(AdapterError::MethodNotAvailable(other.to_string())),\n",
    );
    buf.push_str("        }\n");
    buf.push_str("    }\n");
    buf.push_str("}\n\n");

    buf.push_str("/// Register the activity adapter.\n");
    buf.push_str("pub fn register(registry: &mut ServiceRegistry) {\n");
    buf.push_str(&format!(
        "    registry.register_client(Arc::new({adapter}));\n"
    ));
    buf.push_str("}\n");
}

fn dispatch_arm(ctx: &GenerationContext<'_>, method: &MethodDescriptor, buf: &mut String) {
    let request = ctx.message_type(&method.request_type);
    let response = ctx.message_type(&method.response_type);
    let stub_call = &method.name;

    buf.push_str(&format!(
        "            {} => {{\n",
        str_literal(&method.proto_name)
    ));
    match method.shape() {
        Shape::Unary => {
            buf.push_str(&format!(
                "                client::invoke_unary::<{request}, {response}, _, _>(request, move |req| async move {{\n"
            ));
            buf.push_str(&format!("                    stub.{stub_call}(req).await\n"));
            buf.push_str("                })\n");
            buf.push_str("                .await\n");
        }
        Shape::ServerStreaming => {
            buf.push_str(&format!(
                "                client::invoke_server_streaming::<{request}, {response}, _, _, _>(request, move |req| async move {{\n"
            ));
            buf.push_str(&format!("                    stub.{stub_call}(req)\n"));
            buf.push_str("                        .await\n");
            buf.push_str(
                "                        .map(|response| StreamReceiver::new(response.into_inner()))\n",
            );
            buf.push_str("                })\n");
            buf.push_str("                .await\n");
        }
        Shape::ClientStreaming => {
            buf.push_str(&format!(
                "                client::invoke_client_streaming::<{request}, {response}, _, _>(request, move |outbound| async move {{\n"
            ));
            buf.push_str(&format!("                    stub.{stub_call}(outbound).await\n"));
            buf.push_str("                })\n");
            buf.push_str("                .await\n");
        }
        Shape::Bidirectional => {
            buf.push_str(&format!(
                "                client::invoke_bidirectional::<{request}, {response}, _, _, _>(request, move |outbound| async move {{\n"
            ));
            buf.push_str(&format!("                    stub.{stub_call}(outbound)\n"));
            buf.push_str("                        .await\n");
            buf.push_str(
                "                        .map(|response| StreamReceiver::new(response.into_inner()))\n",
            );
            buf.push_str("                })\n");
            buf.push_str("                .await\n");
            buf.push_str("                .map(|_| Value::Null)\n");
        }
    }
    buf.push_str("            }\n");
}
