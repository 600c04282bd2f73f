fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_prost_build::compile_protos("proto/status.proto")?;
    println!("cargo:rerun-if-changed=proto/status.proto");
    Ok(())
}
