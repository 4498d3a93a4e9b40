// ABOUTME: Build script for generating Rust code from ember.proto.
// ABOUTME: Uses tonic-build to compile the certificate authority service definitions.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto-src/ember.proto"], &["proto-src"])?;

    println!("cargo:rerun-if-changed=proto-src/ember.proto");

    Ok(())
}
