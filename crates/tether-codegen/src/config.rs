// ABOUTME: Generation settings threaded through every step of a run
// ABOUTME: Supports TOML config files with sensible defaults and CLI overrides

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::GenerateError;

/// Default path of the runtime crate in generated `use` statements.
pub const DEFAULT_RUNTIME_CRATE: &str = "tether_runtime";

/// Default path from an adapter module to the tonic-build module.
pub const DEFAULT_PROTO_MODULE: &str = "super";

/// Settings for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Directory receiving the compiled stubs and the adapter files
    pub output_dir: PathBuf,
    /// Definition file to generate adapters for
    pub proto_path: Option<PathBuf>,
    /// Module name recorded in the generated headers; defaults to the
    /// definition file's package, then to its base name
    pub package: Option<String>,
    /// Extra include directories handed to the compiler
    pub include_paths: Vec<PathBuf>,
    /// Emit adapters only, without running the compiler
    pub skip_compile: bool,
    /// Path of the runtime crate used by generated code
    pub runtime_crate: String,
    /// Path from the adapter module to the tonic-build module
    pub proto_module: String,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("generated"),
            proto_path: None,
            package: None,
            include_paths: Vec::new(),
            skip_compile: false,
            runtime_crate: DEFAULT_RUNTIME_CRATE.to_string(),
            proto_module: DEFAULT_PROTO_MODULE.to_string(),
        }
    }
}

impl GenerateConfig {
    /// Create settings for one definition file and output directory.
    pub fn new(proto_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            proto_path: Some(proto_path.into()),
            ..Self::default()
        }
    }

    /// Load settings from a TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, GenerateError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| GenerateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
            .map_err(|e| GenerateError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, GenerateError> {
        toml::from_str(content).map_err(|e| GenerateError::Config(e.to_string()))
    }

    /// The definition file, or a config error when none was given.
    pub fn proto_path(&self) -> Result<&Path, GenerateError> {
        self.proto_path
            .as_deref()
            .ok_or_else(|| GenerateError::Config("no definition file given".to_string()))
    }

    /// Base name of the definition file: its file name up to the first `.`.
    pub fn proto_base_name(&self) -> Result<String, GenerateError> {
        let path = self.proto_path()?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                GenerateError::Config(format!("invalid file name: {}", path.display()))
            })?;
        let base = file_name.split('.').next().unwrap_or(file_name);
        if base.is_empty() {
            return Err(GenerateError::Config(format!(
                "invalid file name: {}",
                path.display()
            )));
        }
        Ok(base.to_string())
    }

    /// Directories searched for imports: the file's own directory first,
    /// then the configured include paths.
    pub fn includes(&self) -> Result<Vec<PathBuf>, GenerateError> {
        let path = self.proto_path()?;
        let own_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut includes = vec![own_dir];
        for extra in &self.include_paths {
            if !includes.contains(extra) {
                includes.push(extra.clone());
            }
        }
        Ok(includes)
    }

    /// Check settings before a run.
    pub fn validate(&self) -> Result<(), GenerateError> {
        self.proto_path()?;
        if self.output_dir.as_os_str().is_empty() {
            return Err(GenerateError::Config("output directory is empty".to_string()));
        }
        if self.runtime_crate.trim().is_empty() {
            return Err(GenerateError::Config("runtime_crate is empty".to_string()));
        }
        if self.proto_module.trim().is_empty() {
            return Err(GenerateError::Config("proto_module is empty".to_string()));
        }
        Ok(())
    }

    /// Generate a commented default config file.
    pub fn default_toml() -> String {
        format!(
            r#"# tether configuration

# Directory receiving the compiled stubs and the adapter files
output_dir = "generated"

# Definition file to generate adapters for
# proto_path = "proto/petstore.proto"

# Module name recorded in generated headers (defaults to the file's package)
# package = "petstore"

# Extra include directories handed to the compiler
include_paths = []

# Emit adapters only, without running the compiler
skip_compile = false

# Path of the runtime crate used by generated code
runtime_crate = "{DEFAULT_RUNTIME_CRATE}"

# Path from the adapter module to the tonic-build module
proto_module = "{DEFAULT_PROTO_MODULE}"
"#
        )
    }
}
