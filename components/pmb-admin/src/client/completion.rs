//! Shell completion hints for `run restore <metadata-file>`.
//!
//! Completion runs before any regular command, so it dials its own plaintext
//! connection, uses it for one catalog listing and drops it on return. Any
//! failure yields an empty candidate list.

// Local crates
use crate::{client::aggregator::available_backups, connection::connection::Connection};

// External crates
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// One restore candidate: catalog filename and its description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHint {
    pub filename: String,
    pub description: String,
}

/// Every catalog entry, sorted by filename.
#[instrument(
    name = "pmb_admin_completion::backup_hints",
    target = "client::completion",
    level = "debug",
    skip(cancel)
)]
pub async fn backup_hints(server_addr: &str, cancel: &CancellationToken) -> Vec<BackupHint> {
    let conn = match Connection::open_plaintext(server_addr).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!(error = %e, "No completion hints, coordinator unreachable");
            return Vec::new();
        }
    };

    let backups = match available_backups(&mut conn.client(), cancel).await {
        Ok(backups) => backups,
        Err(e) => {
            tracing::debug!(error = %e, "No completion hints, catalog listing failed");
            return Vec::new();
        }
    };

    let mut hints: Vec<BackupHint> = backups
        .into_iter()
        .map(|(filename, md)| BackupHint {
            filename,
            description: md.description,
        })
        .collect();
    hints.sort_by(|a, b| a.filename.cmp(&b.filename));
    hints
}

/// Blocking variant for the shell completion engine, which calls candidate
/// providers synchronously. The lookup runs on its own thread and runtime so
/// it works whether or not the caller is already inside one.
pub fn backup_hints_blocking(server_addr: &str) -> Vec<BackupHint> {
    let server_addr = server_addr.to_string();
    let lookup = std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .ok()?;
        Some(runtime.block_on(backup_hints(&server_addr, &CancellationToken::new())))
    });

    match lookup.join() {
        Ok(Some(hints)) => hints,
        Ok(None) | Err(_) => Vec::new(),
    }
}
