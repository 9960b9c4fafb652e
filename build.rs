// Code generation for the metrics gRPC service.
//
// Messages are plain prost structs defined in `src/infrastructure/rpc.rs`, so the
// service stubs are generated with the manual builder and no .proto/protoc step.

fn main() {
    let set_metrics = tonic_build::manual::Method::builder()
        .name("set_metrics")
        .route_name("SetMetrics")
        .input_type("crate::infrastructure::rpc::SetMetricsRequest")
        .output_type("crate::infrastructure::rpc::SetMetricsResponse")
        .codec_path("tonic::codec::ProstCodec")
        .build();

    let get_metrics = tonic_build::manual::Method::builder()
        .name("get_metrics")
        .route_name("GetMetrics")
        .input_type("crate::infrastructure::rpc::GetMetricsRequest")
        .output_type("crate::infrastructure::rpc::GetMetricsResponse")
        .codec_path("tonic::codec::ProstCodec")
        .build();

    let service = tonic_build::manual::Service::builder()
        .name("Metrics")
        .package("metrics")
        .method(set_metrics)
        .method(get_metrics)
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);

    println!("cargo:rerun-if-changed=build.rs");
}
