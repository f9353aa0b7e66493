//! Interrupt handling for the admin client.
//!
//! One background task waits for Ctrl+C and cancels the process-wide
//! [`CancellationToken`]. Every blocking RPC call selects on that token so an
//! interrupted stream returns promptly instead of hanging.
//!
//! The token is also cancelled when the bridge is shut down at the end of a
//! normal run. Cancelling twice is a no-op.

// External crates
use std::future::Future;
use std::io;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Owns the shared cancellation token and the interrupt listener task.
#[derive(Debug)]
pub struct CancellationBridge {
    token: CancellationToken,
    listener: Option<JoinHandle<()>>,
}

impl CancellationBridge {
    /// Start listening for the OS interrupt signal.
    pub fn start() -> Self {
        Self::start_with(tokio::signal::ctrl_c())
    }

    /// Start listening on an arbitrary one-shot signal future. The token is
    /// cancelled once the future resolves successfully.
    #[instrument(
        name = "pmb_admin_cancellation::start",
        target = "helpers::shutdown",
        level = "trace",
        skip_all
    )]
    pub fn start_with<F>(signal: F) -> Self
    where
        F: Future<Output = io::Result<()>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let listener_token = token.clone();

        tracing::trace!("Spawning interrupt listener task");
        let listener = tokio::spawn(async move {
            tokio::select! {
                res = signal => match res {
                    Ok(()) => {
                        tracing::warn!("Interrupt received, cancelling in-flight requests");
                        listener_token.cancel();
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to listen for interrupt signal");
                    }
                },
                _ = listener_token.cancelled() => {
                    tracing::trace!("Cancellation token released before any interrupt");
                }
            }
        });

        Self {
            token,
            listener: Some(listener),
        }
    }

    /// Clone of the shared token, handed to every RPC call.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token and wait for the listener task to finish.
    #[instrument(
        name = "pmb_admin_cancellation::shutdown",
        target = "helpers::shutdown",
        level = "trace",
        skip_all
    )]
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(listener) = self.listener.take() {
            let _ = listener.await;
        }
        tracing::trace!("Interrupt listener stopped");
    }
}

impl Drop for CancellationBridge {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
