// ABOUTME: Protocol compiler invocation through tonic-build.
// ABOUTME: Writes the message types, client stubs and server traits the adapters build on.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::GenerateError;

/// Derives added to every generated message and enum so adapters can move
/// them through the JSON intermediate representation.
pub const SERDE_DERIVE: &str = "#[derive(serde::Serialize, serde::Deserialize)]";

/// Lets partial JSON decode into a message.
pub const SERDE_DEFAULT: &str = "#[serde(default)]";

/// Something that turns a definition file into Rust stubs.
pub trait ProtoCompiler {
    /// Compile `proto` into `out_dir`, resolving imports against `includes`.
    fn compile(&self, proto: &Path, includes: &[PathBuf], out_dir: &Path)
        -> Result<(), GenerateError>;
}

/// Compiler backed by tonic-build, which drives `protoc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TonicCompiler;

impl ProtoCompiler for TonicCompiler {
    fn compile(
        &self,
        proto: &Path,
        includes: &[PathBuf],
        out_dir: &Path,
    ) -> Result<(), GenerateError> {
        info!(proto = %proto.display(), out_dir = %out_dir.display(), "compiling definition file");
        tonic_build::configure()
            .build_server(true)
            .build_client(true)
            .out_dir(out_dir)
            .emit_rerun_if_changed(false)
            .type_attribute(".", SERDE_DERIVE)
            .message_attribute(".", SERDE_DEFAULT)
            .compile_protos(&[proto], includes)
            .map_err(|e| GenerateError::Compiler(e.to_string()))
    }
}
