//! Cancellation-aware wrapper shared by every coordinator call.

// External crates
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tonic::{Response, Status};

/// A coordinator call failed or was interrupted.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("{operation}: {source}")]
    Status {
        operation: &'static str,
        #[source]
        source: Status,
    },
    #[error("{operation}: cancelled")]
    Cancelled { operation: &'static str },
}

impl RpcError {
    /// Whether the failure came from the shared cancellation token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Await a unary call (or the opening of a server stream) unless the token
/// fires first.
pub async fn cancellable<T, F>(
    cancel: &CancellationToken,
    operation: &'static str,
    call: F,
) -> Result<T, RpcError>
where
    F: Future<Output = Result<Response<T>, Status>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RpcError::Cancelled { operation }),
        res = call => res
            .map(Response::into_inner)
            .map_err(|source| RpcError::Status { operation, source }),
    }
}
