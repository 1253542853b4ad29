// ABOUTME: Source rendering for generated adapters.
// ABOUTME: Validates the context, writes the shared header and dispatches to the per-role renderer.

mod client;
mod server;

use crate::context::{GenerationContext, Role};
use crate::error::RenderError;

/// Render the adapter source for one context.
pub fn render(ctx: &GenerationContext<'_>) -> Result<String, RenderError> {
    validate(ctx)?;
    let mut buf = String::new();
    header(ctx, &mut buf);
    match ctx.role {
        Role::Server => server::render(ctx, &mut buf),
        Role::Client => client::render(ctx, &mut buf),
    }
    Ok(buf)
}

fn validate(ctx: &GenerationContext<'_>) -> Result<(), RenderError> {
    let required = [
        (&ctx.target.package, "package"),
        (&ctx.target.proto_name, "proto name"),
        (&ctx.target.runtime_crate, "runtime crate"),
        (&ctx.target.proto_module, "proto module"),
        (&ctx.service.proto_name, "service name"),
        (&ctx.service.name, "service name"),
    ];
    for (value, field) in required {
        if value.trim().is_empty() {
            return Err(RenderError::MissingField(field));
        }
    }

    for method in &ctx.service.methods {
        let fields = [
            (&method.proto_name, "name"),
            (&method.name, "name"),
            (&method.request_type, "request type"),
            (&method.response_type, "response type"),
        ];
        for (value, field) in fields {
            if value.trim().is_empty() {
                return Err(RenderError::MissingMethodField {
                    method: method.proto_name.clone(),
                    field,
                });
            }
        }
    }
    Ok(())
}

fn header(ctx: &GenerationContext<'_>, buf: &mut String) {
    let side = match ctx.role {
        Role::Server => "Trigger",
        Role::Client => "Activity",
    };
    buf.push_str(&format!(
        "// @generated by tether-codegen from {}.proto. Do not edit.\n",
        ctx.target.proto_name
    ));
    buf.push_str(&format!(
        "// {side} adapter for service {} in package {}.\n",
        ctx.service.proto_name, ctx.target.package
    ));
    buf.push_str(&format!(
        "// Generated at {}.\n",
        ctx.target.timestamp.format("%Y-%m-%d %H:%M:%S%.f UTC")
    ));
    buf.push_str("//\n");
    buf.push_str("// Include this file in its own module, next to the tonic-build output:\n");
    buf.push_str(&format!(
        "// `{}` must resolve to the module holding the generated messages.\n\n",
        ctx.target.proto_module
    ));
}

/// Rust string literal for `value`.
fn str_literal(value: &str) -> String {
    format!("{value:?}")
}
