// ABOUTME: Entry point of the `tether` binary.
// ABOUTME: Parses flags, merges them over the optional config file and runs generation or inspection.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tether_codegen::{GenerateConfig, Generator};
use tracing::info;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "tether.toml";

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Generate adapters bridging gRPC services to trigger and activity handlers")]
#[command(version)]
struct Cli {
    /// Log at DEBUG level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a definition file and emit server and client adapters
    Generate(GenerateArgs),

    /// Print the services, methods and shapes found in a definition file
    Inspect {
        /// Definition file to read
        #[arg(short, long)]
        proto: PathBuf,
    },

    /// Write a commented default config file
    Init {
        /// Where to write the config
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args, Debug, Default)]
struct GenerateArgs {
    /// Definition file to generate adapters for
    #[arg(short, long)]
    proto: Option<PathBuf>,

    /// Output directory for compiled stubs and adapters
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Package name written into adapter headers
    #[arg(long)]
    package: Option<String>,

    /// Config file (defaults to ./tether.toml when present)
    #[arg(short, long, env = "TETHER_CONFIG")]
    config: Option<PathBuf>,

    /// Extra import directory for the compiler (repeatable)
    #[arg(short = 'I', long = "include")]
    include: Vec<PathBuf>,

    /// Emit adapters only, without running the compiler
    #[arg(long)]
    skip_compile: bool,
}

impl GenerateArgs {
    /// Settings for this run: the config file (if any) with flags applied on top.
    fn resolve(&self) -> Result<GenerateConfig> {
        let mut config = match &self.config {
            Some(path) => GenerateConfig::load_from(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                GenerateConfig::load_from(DEFAULT_CONFIG_FILE)
                    .with_context(|| format!("Failed to load config {DEFAULT_CONFIG_FILE}"))?
            }
            None => GenerateConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut GenerateConfig) {
        if let Some(proto) = &self.proto {
            config.proto_path = Some(proto.clone());
        }
        if let Some(out) = &self.out {
            config.output_dir = out.clone();
        }
        if let Some(package) = &self.package {
            config.package = Some(package.clone());
        }
        for dir in &self.include {
            if !config.include_paths.contains(dir) {
                config.include_paths.push(dir.clone());
            }
        }
        if self.skip_compile {
            config.skip_compile = true;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tether_log::init_with_level(tracing::Level::DEBUG);
    } else {
        tether_log::init();
    }

    match cli.command {
        Commands::Generate(args) => run_generate(&args),
        Commands::Inspect { proto } => run_inspect(&proto),
        Commands::Init { path, force } => run_init(&path, force),
    }
}

fn run_generate(args: &GenerateArgs) -> Result<()> {
    let config = args.resolve()?;
    let report = Generator::new(config)
        .run()
        .context("Adapter generation failed")?;

    info!(
        services = report.services.len(),
        files = report.files.len(),
        compiled = report.compiled,
        "generation finished"
    );
    for file in &report.files {
        println!("{}", file.display());
    }
    Ok(())
}

fn run_inspect(proto: &Path) -> Result<()> {
    let file = tether_codegen::inspect(proto)
        .with_context(|| format!("Failed to inspect {}", proto.display()))?;

    if let Some(package) = &file.package {
        println!("package {package}");
    }
    if file.services.is_empty() {
        println!("(no services)");
    }
    for service in &file.services {
        println!("service {} (line {})", service.proto_name, service.line);
        for method in &service.methods {
            println!(
                "  {:<24} {:<16} {} -> {}",
                method.proto_name,
                method.shape(),
                method.input_type,
                method.output_type
            );
        }
    }
    Ok(())
}

fn run_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    std::fs::write(path, GenerateConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
