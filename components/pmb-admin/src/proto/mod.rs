//! Generated coordinator protocol types and gRPC stubs.

#[allow(missing_docs, missing_debug_implementations, clippy::all)]
pub mod api {
    tonic::include_proto!("api");
}
#[allow(missing_docs, missing_debug_implementations, clippy::all)]
pub mod messages {
    tonic::include_proto!("messages");
}
