fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure().compile_protos(&["proto/ext_proc.proto"], &["proto"])?;
    Ok(())
}
