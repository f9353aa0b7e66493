//! Connection - responsibility and behavior
//!
//! Opens the single gRPC channel the admin client uses for its whole run.
//!
//! - Plain HTTP/2 unless TLS is requested.
//! - With TLS the coordinator certificate is verified against the CA file the
//! operator supplied. There is no fallback certificate: TLS without a CA file
//! is refused.
//! - Dialing is eager, so an unreachable coordinator is reported before any
//! command runs.
//! - The channel is released when the [`Connection`] is dropped, on every exit
//! path.

// Local crates
use crate::{helpers::load_config::ResolvedOptions, proto::api::api_client::ApiClient};

// External crates
use std::path::{Path, PathBuf};
use std::time::Duration;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tracing::instrument;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection setup errors. All of them are fatal startup errors.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("TLS requested but no CA file supplied: a CA file is required (--ca-file)")]
    CaFileRequired,
    #[error("cannot read CA file {path}: {source}")]
    ReadCaFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid server address {addr}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("failed to create TLS credentials: {0}")]
    Tls(#[source] tonic::transport::Error),
    #[error("fail to dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: tonic::transport::Error,
    },
}

/// The process-lifetime channel to the coordinator.
#[derive(Debug)]
pub struct Connection {
    channel: Channel,
    server_addr: String,
}

impl Connection {
    /// Dial the coordinator described by the resolved options.
    #[instrument(
        name = "pmb_admin_connection::open",
        target = "connection::connection",
        level = "debug",
        skip_all
    )]
    pub async fn open(opts: &ResolvedOptions) -> Result<Self, ConnectionError> {
        let tls = if opts.use_tls {
            let ca_file = opts
                .ca_file
                .as_deref()
                .ok_or(ConnectionError::CaFileRequired)?;
            Some(load_tls_config(ca_file).await?)
        } else {
            None
        };

        Self::dial(&opts.server_addr, tls).await
    }

    /// Dial a plaintext channel, used by short-lived helper paths.
    pub async fn open_plaintext(server_addr: &str) -> Result<Self, ConnectionError> {
        Self::dial(server_addr, None).await
    }

    async fn dial(
        server_addr: &str,
        tls: Option<ClientTlsConfig>,
    ) -> Result<Self, ConnectionError> {
        let uri = endpoint_uri(server_addr, tls.is_some());
        let mut endpoint = Endpoint::from_shared(uri).map_err(|source| {
            ConnectionError::InvalidAddress {
                addr: server_addr.to_string(),
                source,
            }
        })?;
        endpoint = endpoint.connect_timeout(CONNECT_TIMEOUT);

        if let Some(tls) = tls {
            tracing::debug!("Configuring TLS for coordinator channel");
            endpoint = endpoint.tls_config(tls).map_err(ConnectionError::Tls)?;
        }

        tracing::debug!(
            server_addr = %server_addr,
            "Creating HTTP/2 connection channel to coordinator"
        );
        match endpoint.connect().await {
            Ok(channel) => {
                tracing::info!(server_addr = %server_addr, "Connected to coordinator");
                Ok(Self {
                    channel,
                    server_addr: server_addr.to_string(),
                })
            }
            Err(source) => {
                tracing::error!(error = %source, server_addr = %server_addr, "Failed to dial coordinator");
                Err(ConnectionError::Dial {
                    addr: server_addr.to_string(),
                    source,
                })
            }
        }
    }

    /// API stub bound to this channel. Stubs are cheap clones of the channel.
    pub fn client(&self) -> ApiClient<Channel> {
        ApiClient::new(self.channel.clone())
    }

    /// Address this connection was dialed with.
    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    /// Release the channel.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        tracing::debug!(server_addr = %self.server_addr, "Closing coordinator channel");
    }
}

async fn load_tls_config(ca_file: &Path) -> Result<ClientTlsConfig, ConnectionError> {
    let pem = tokio::fs::read(ca_file)
        .await
        .map_err(|source| ConnectionError::ReadCaFile {
            path: ca_file.to_path_buf(),
            source,
        })?;
    Ok(ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem)))
}

/// `host:port` -> `http://host:port` (or `https://` with TLS). Addresses that
/// already carry a scheme are kept as they are.
pub fn endpoint_uri(server_addr: &str, tls: bool) -> String {
    if server_addr.contains("://") {
        server_addr.to_string()
    } else if tls {
        format!("https://{server_addr}")
    } else {
        format!("http://{server_addr}")
    }
}
