//! Command dispatch.
//!
//! Exactly one handler runs per process. Handlers share the single coordinator
//! channel and the process-wide cancellation token, and issue their RPC calls
//! strictly one after another.
//!
//! Failure policy:
//! - `run backup` / `run restore`: RPC failures are returned, the process exits non-zero.
//! - `list nodes` / `list backups`: RPC failures are logged and nothing is rendered.
//! - Template failures are always returned.

// Local crates
use crate::{
    client::{
        aggregator::{available_backups, connected_agents},
        requests::{RequestError, run_backup, run_restore},
    },
    connection::connection::Connection,
    helpers::load_config::{BackupOptions, CommandOptions, ResolvedOptions, RestoreOptions},
    render::renderer::{OutputRenderer, RenderError},
};

// External crates
use std::fmt;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// The finite set of command paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPath {
    RunBackup,
    RunRestore,
    ListNodes,
    ListBackups,
}

const COMMAND_PATHS: [(&str, CommandPath); 4] = [
    ("run backup", CommandPath::RunBackup),
    ("run restore", CommandPath::RunRestore),
    ("list nodes", CommandPath::ListNodes),
    ("list backups", CommandPath::ListBackups),
];

impl CommandPath {
    /// Path of the command the options were resolved for.
    pub fn of(command: &CommandOptions) -> Self {
        match command {
            CommandOptions::Backup(_) => Self::RunBackup,
            CommandOptions::Restore(_) => Self::RunRestore,
            CommandOptions::ListNodes { .. } => Self::ListNodes,
            CommandOptions::ListBackups => Self::ListBackups,
        }
    }

    /// Space separated path, e.g. `run backup`.
    pub fn as_str(self) -> &'static str {
        COMMAND_PATHS
            .iter()
            .find(|(_, path)| *path == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }
}

impl fmt::Display for CommandPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("command {0} was dispatched with options for another command")]
    OptionsMismatch(CommandPath),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("cannot write output: {0}")]
    Output(#[from] std::io::Error),
}

/// Run the command the options were resolved for.
pub async fn dispatch<W: Write>(
    opts: &ResolvedOptions,
    conn: &Connection,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<(), DispatchError> {
    dispatch_path(CommandPath::of(&opts.command), opts, conn, cancel, out).await
}

/// Look up the handler for `path` and run it.
#[instrument(
    name = "pmb_admin_dispatch::dispatch",
    target = "dispatch::dispatcher",
    level = "debug",
    skip(opts, conn, cancel, out)
)]
pub async fn dispatch_path<W: Write>(
    path: CommandPath,
    opts: &ResolvedOptions,
    conn: &Connection,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<(), DispatchError> {
    tracing::debug!(
        command = %path,
        server_addr = conn.server_addr(),
        "Dispatching command"
    );

    match (path, &opts.command) {
        (CommandPath::RunBackup, CommandOptions::Backup(backup)) => {
            backup_command(conn, cancel, backup, out).await
        }
        (CommandPath::RunRestore, CommandOptions::Restore(restore)) => {
            restore_command(conn, cancel, restore, out).await
        }
        (CommandPath::ListNodes, CommandOptions::ListNodes { verbose }) => {
            list_nodes_command(conn, cancel, *verbose, out).await
        }
        (CommandPath::ListBackups, CommandOptions::ListBackups) => {
            list_backups_command(conn, cancel, out).await
        }
        (path, _) => Err(DispatchError::OptionsMismatch(path)),
    }
}

//
// ------------------------ Command Implementations ------------------------------
//

async fn backup_command<W: Write>(
    conn: &Connection,
    cancel: &CancellationToken,
    opts: &BackupOptions,
    out: &mut W,
) -> Result<(), DispatchError> {
    run_backup(&mut conn.client(), cancel, opts).await?;
    writeln!(out, "Backup started: {}", opts.description)?;
    Ok(())
}

async fn restore_command<W: Write>(
    conn: &Connection,
    cancel: &CancellationToken,
    opts: &RestoreOptions,
    out: &mut W,
) -> Result<(), DispatchError> {
    writeln!(out, "restoring")?;
    run_restore(&mut conn.client(), cancel, opts).await?;
    writeln!(out, "Restore started from {}", opts.metadata_file)?;
    Ok(())
}

async fn list_nodes_command<W: Write>(
    conn: &Connection,
    cancel: &CancellationToken,
    verbose: bool,
    out: &mut W,
) -> Result<(), DispatchError> {
    let agents = match connected_agents(&mut conn.client(), cancel).await {
        Ok(agents) => agents,
        Err(e) if e.is_cancelled() => {
            tracing::warn!(error = %e, "Listing of connected agents interrupted");
            return Ok(());
        }
        Err(e) => {
            tracing::error!(error = %e, "Cannot get the list of connected agents");
            return Ok(());
        }
    };

    let rendered = OutputRenderer::new()?.render_nodes(&agents, verbose)?;
    out.write_all(rendered.as_bytes())?;
    Ok(())
}

async fn list_backups_command<W: Write>(
    conn: &Connection,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<(), DispatchError> {
    let backups = match available_backups(&mut conn.client(), cancel).await {
        Ok(backups) => backups,
        Err(e) if e.is_cancelled() => {
            tracing::warn!(error = %e, "Listing of available backups interrupted");
            return Ok(());
        }
        Err(e) => {
            tracing::error!(error = %e, "Cannot get the list of available backups");
            return Ok(());
        }
    };

    let rendered = OutputRenderer::new()?.render_backups(&backups)?;
    out.write_all(rendered.as_bytes())?;
    Ok(())
}
