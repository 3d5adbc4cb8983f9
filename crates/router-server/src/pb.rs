//! Generated external-processor protocol types.

tonic::include_proto!("router.ext_proc.v3");
