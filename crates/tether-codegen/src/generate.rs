// ABOUTME: Orchestrates a generation run: extract, compile, render and write adapter files.
// ABOUTME: Extraction happens before anything touches the output directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::compiler::{ProtoCompiler, TonicCompiler};
use crate::config::GenerateConfig;
use crate::context::{file_name, Role, Target};
use crate::descriptor::ProtoFile;
use crate::error::GenerateError;
use crate::extract::extract;
use crate::render::render;

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    /// Services found, in file order.
    pub services: Vec<String>,
    /// Adapter files written, in emission order.
    pub files: Vec<PathBuf>,
    /// Whether the protocol compiler ran.
    pub compiled: bool,
}

/// Read a definition file and extract its services.
pub fn inspect(path: &Path) -> Result<ProtoFile, GenerateError> {
    let source = fs::read_to_string(path).map_err(|source| GenerateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(extract(&source)?)
}

/// Run a generation with the tonic-build compiler.
pub fn generate(config: &GenerateConfig) -> Result<GenerateReport, GenerateError> {
    Generator::new(config.clone()).run()
}

/// A configured generation run.
pub struct Generator<C = TonicCompiler> {
    config: GenerateConfig,
    compiler: C,
}

impl Generator<TonicCompiler> {
    pub fn new(config: GenerateConfig) -> Self {
        Self::with_compiler(config, TonicCompiler)
    }
}

impl<C: ProtoCompiler> Generator<C> {
    /// Use a different protocol compiler.
    pub fn with_compiler(config: GenerateConfig, compiler: C) -> Self {
        Self { config, compiler }
    }

    pub fn config(&self) -> &GenerateConfig {
        &self.config
    }

    /// Run, stamping the artifacts with the current time.
    pub fn run(&self) -> Result<GenerateReport, GenerateError> {
        self.run_at(Utc::now())
    }

    /// Run, stamping the artifacts with `timestamp`.
    pub fn run_at(&self, timestamp: DateTime<Utc>) -> Result<GenerateReport, GenerateError> {
        self.config.validate()?;
        let proto_path = self.config.proto_path()?;
        let proto_name = self.config.proto_base_name()?;

        info!(proto = %proto_path.display(), "extracting services");
        let file = inspect(proto_path)?;
        info!(services = file.services.len(), "extraction finished");

        let out_dir = &self.config.output_dir;
        let created = !out_dir.exists();
        fs::create_dir_all(out_dir).map_err(|source| GenerateError::Io {
            path: out_dir.clone(),
            source,
        })?;

        let mut report = GenerateReport {
            services: file.services.iter().map(|s| s.proto_name.clone()).collect(),
            ..Default::default()
        };

        if self.config.skip_compile {
            debug!("skipping protocol compiler");
        } else {
            let includes = self.config.includes()?;
            if let Err(err) = self.compiler.compile(proto_path, &includes, out_dir) {
                if created {
                    remove_created_dir(out_dir);
                }
                return Err(err);
            }
            report.compiled = true;
        }

        let target = Target {
            package: self.package_name(&file, &proto_name),
            proto_name,
            proto_package: file.package.clone(),
            runtime_crate: self.config.runtime_crate.clone(),
            proto_module: self.config.proto_module.clone(),
            timestamp,
        };

        for service in &file.services {
            for role in Role::ALL {
                let source =
                    render(&target.context(service, role)).map_err(|source| GenerateError::Render {
                        service: service.proto_name.clone(),
                        source,
                    })?;
                let path = out_dir.join(file_name(&target.proto_name, service, role));
                fs::write(&path, source).map_err(|source| GenerateError::Io {
                    path: path.clone(),
                    source,
                })?;
                debug!(
                    service = %service.proto_name,
                    %role,
                    path = %path.display(),
                    "wrote adapter"
                );
                report.files.push(path);
            }
        }

        info!(
            services = report.services.len(),
            files = report.files.len(),
            out_dir = %out_dir.display(),
            "adapters generated"
        );
        Ok(report)
    }

    /// Configured package, else the file's package, else its base name.
    fn package_name(&self, file: &ProtoFile, proto_name: &str) -> String {
        self.config
            .package
            .clone()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| file.package.clone())
            .unwrap_or_else(|| proto_name.to_string())
    }
}

fn remove_created_dir(dir: &Path) {
    match fs::remove_dir_all(dir) {
        Ok(()) => info!(dir = %dir.display(), "removed output directory after compiler failure"),
        Err(e) => warn!(dir = %dir.display(), error = %e, "could not remove output directory"),
    }
}
