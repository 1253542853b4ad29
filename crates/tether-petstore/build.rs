// ABOUTME: Build script compiling petstore.proto and generating its tether adapters.
// ABOUTME: Uses the bundled protoc so the build does not depend on a system install.

use tether_codegen::{GenerateConfig, Generator};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    let out_dir = std::env::var("OUT_DIR")?;
    let config = GenerateConfig::new("proto/petstore.proto", out_dir);
    Generator::new(config).run()?;

    println!("cargo:rerun-if-changed=proto/petstore.proto");
    Ok(())
}
