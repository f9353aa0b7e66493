// Local crates
use crate::{
    client::completion::backup_hints_blocking,
    connection::connection::Connection,
    dispatch::dispatcher::{CommandPath, dispatch},
    helpers::{
        load_config::{
            BackupOptions, CommandOptions, DEFAULT_SERVER_ADDR, GlobalFlags, ResolvedOptions,
            RestoreOptions,
        },
        shutdown::CancellationBridge,
    },
};

// External crates
use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{
    Shell,
    engine::{ArgValueCandidates, CompletionCandidate},
};

#[derive(Debug, Parser)]
#[command(
    name = "pmb-admin",
    about = "MongoDB backup admin",
    long_about = "Administrative client for the backup coordinator: start backups and restores, list connected agents and the backup catalog.",
    version,
    term_width = 100,
    after_help = "\
    EXAMPLES:
        pmb-admin list nodes --verbose
        pmb-admin run backup --backup-type=logical --description='before upgrade'
        pmb-admin --server-addr=10.0.0.5:10001 run restore 2024-01-01T00:00:00Z.json
        pmb-admin completions bash > /etc/bash_completion.d/pmb-admin
        source <(COMPLETE=bash pmb-admin)"
)]
pub struct Cli {
    /// Connection uses TLS if true, else plain TCP
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub tls: Option<bool>,

    /// The file containing the CA root cert file
    #[arg(long = "ca-file", global = true)]
    pub ca_file: Option<String>,

    /// The server address in the format of host:port [default: 127.0.0.1:10001]
    #[arg(long = "server-addr", global = true)]
    pub server_addr: Option<String>,

    /// Config file name [default: ~/.pmb-admin.yml]
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a new backup or restore process
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },

    /// List objects (connected nodes, backups, etc)
    List {
        #[command(subcommand)]
        command: ListCommands,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum RunCommands {
    /// Start a backup
    Backup {
        /// Backup type
        #[arg(long = "backup-type", value_parser = ["logical", "hot"])]
        backup_type: Option<String>,

        /// Backup destination type
        #[arg(long = "destination-type", value_parser = ["file", "aws"])]
        destination_type: Option<String>,

        /// Compression algorithm used for the backup
        #[arg(long = "compression-algorithm")]
        compression_algorithm: Option<String>,

        /// Encryption algorithm used for the backup
        #[arg(long = "encryption-algorithm")]
        encryption_algorithm: Option<String>,

        /// Backup description
        #[arg(long, required = true)]
        description: String,
    },

    /// Restore a backup given a metadata file name
    Restore {
        /// Metadata file having the backup info for restore
        #[arg(
            value_name = "METADATA_FILE",
            required = true,
            add = ArgValueCandidates::new(metadata_file_candidates)
        )]
        metadata_file: String,

        /// Do not restore users and roles
        #[arg(
            long = "skip-users-and-roles",
            num_args = 0..=1,
            require_equals = true,
            default_value_t = true,
            default_missing_value = "true",
            action = ArgAction::Set
        )]
        skip_users_and_roles: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ListCommands {
    /// List connected nodes
    Nodes {
        /// Include extra node info
        #[arg(long)]
        verbose: bool,
    },

    /// List backups
    Backups,
}

/// What the operator asked for once flags are split off.
#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    Command(CommandOptions),
    Completions(Shell),
}

impl Cli {
    /// Split parsed arguments into global flags and the invoked command.
    pub fn into_parts(self) -> (GlobalFlags, Invocation) {
        let flags = GlobalFlags {
            tls: self.tls,
            ca_file: self.ca_file,
            server_addr: self.server_addr,
            config_file: self.config,
        };

        let invocation = match self.command {
            Commands::Run {
                command:
                    RunCommands::Backup {
                        backup_type,
                        destination_type,
                        compression_algorithm,
                        encryption_algorithm,
                        description,
                    },
            } => Invocation::Command(CommandOptions::Backup(BackupOptions {
                backup_type: backup_type.unwrap_or_default(),
                destination_type: destination_type.unwrap_or_default(),
                compression_algorithm: compression_algorithm.unwrap_or_default(),
                encryption_algorithm: encryption_algorithm.unwrap_or_default(),
                description,
            })),
            Commands::Run {
                command:
                    RunCommands::Restore {
                        metadata_file,
                        skip_users_and_roles,
                    },
            } => Invocation::Command(CommandOptions::Restore(RestoreOptions {
                metadata_file,
                skip_users_and_roles,
            })),
            Commands::List {
                command: ListCommands::Nodes { verbose },
            } => Invocation::Command(CommandOptions::ListNodes { verbose }),
            Commands::List {
                command: ListCommands::Backups,
            } => Invocation::Command(CommandOptions::ListBackups),
            Commands::Completions { shell } => Invocation::Completions(shell),
        };

        (flags, invocation)
    }
}

/// Entry function for CLI
pub async fn run(cli: Cli) -> Result<()> {
    let (flags, invocation) = cli.into_parts();

    match invocation {
        Invocation::Command(command) => run_command(flags, command).await,
        Invocation::Completions(shell) => {
            generate_completions(shell, &mut std::io::stdout());
            Ok(())
        }
    }
}

//
// ------------------------ Command Implementations ------------------------------
//

/// Resolve options, open the channel, run one command, release everything.
async fn run_command(flags: GlobalFlags, command: CommandOptions) -> Result<()> {
    let opts = ResolvedOptions::resolve(flags, command).context("invalid configuration")?;
    let path = CommandPath::of(&opts.command);

    let conn = Connection::open(&opts)
        .await
        .context("cannot connect to the coordinator")?;

    let bridge = CancellationBridge::start();
    let cancel = bridge.token();

    let mut stdout = std::io::stdout();
    let result = dispatch(&opts, &conn, &cancel, &mut stdout).await;

    bridge.shutdown().await;
    conn.close();

    result.with_context(|| format!("{path} failed"))
}

/// Static completion script for `shell`. `run restore` candidates come from
/// the dynamic engine (`COMPLETE=<shell> pmb-admin`), which calls
/// [`metadata_file_candidates`].
fn generate_completions<W: std::io::Write>(shell: Shell, out: &mut W) {
    clap_complete::generate(shell, &mut Cli::command(), "pmb-admin", out);
}

/// Catalog entries offered for `run restore <METADATA_FILE>`, with the backup
/// description as help text. The completion engine sees no parsed flags, so
/// the address comes from the config file or the built-in default.
fn metadata_file_candidates() -> Vec<CompletionCandidate> {
    let server_addr = ResolvedOptions::resolve(GlobalFlags::default(), CommandOptions::ListBackups)
        .map(|opts| opts.server_addr)
        .unwrap_or_else(|_| DEFAULT_SERVER_ADDR.to_string());

    backup_hints_blocking(&server_addr)
        .into_iter()
        .map(|hint| CompletionCandidate::new(hint.filename).help(Some(hint.description.into())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("pmb-admin").chain(args.iter().copied()))
    }

    #[test]
    fn backup_requires_description() {
        let err = parse(&["run", "backup", "--backup-type=logical"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn restore_requires_metadata_file() {
        let err = parse(&["run", "restore"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn backup_type_is_restricted() {
        let err = parse(&["run", "backup", "--backup-type=full", "--description=x"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn backup_flags_become_options() {
        let cli = parse(&[
            "run",
            "backup",
            "--backup-type=hot",
            "--destination-type=aws",
            "--compression-algorithm=gzip",
            "--description=nightly",
        ])
        .unwrap();

        let (_, invocation) = cli.into_parts();
        assert_eq!(
            invocation,
            Invocation::Command(CommandOptions::Backup(BackupOptions {
                backup_type: "hot".to_string(),
                destination_type: "aws".to_string(),
                compression_algorithm: "gzip".to_string(),
                encryption_algorithm: String::new(),
                description: "nightly".to_string(),
            }))
        );
    }

    #[test]
    fn skip_users_and_roles_defaults_to_true() {
        let (_, invocation) = parse(&["run", "restore", "md.json"]).unwrap().into_parts();
        assert_eq!(
            invocation,
            Invocation::Command(CommandOptions::Restore(RestoreOptions {
                metadata_file: "md.json".to_string(),
                skip_users_and_roles: true,
            }))
        );

        let (_, invocation) = parse(&["run", "restore", "md.json", "--skip-users-and-roles=false"])
            .unwrap()
            .into_parts();
        assert_eq!(
            invocation,
            Invocation::Command(CommandOptions::Restore(RestoreOptions {
                metadata_file: "md.json".to_string(),
                skip_users_and_roles: false,
            }))
        );
    }

    #[test]
    fn global_flags_are_optional_and_accepted_anywhere() {
        let (flags, _) = parse(&["list", "backups"]).unwrap().into_parts();
        assert!(flags.tls.is_none());
        assert!(flags.server_addr.is_none());
        assert!(flags.config_file.is_none());

        let (flags, invocation) = parse(&["--tls", "list", "nodes", "--server-addr=10.0.0.1:1"])
            .unwrap()
            .into_parts();
        assert_eq!(flags.tls, Some(true));
        assert_eq!(flags.server_addr.as_deref(), Some("10.0.0.1:1"));
        assert_eq!(
            invocation,
            Invocation::Command(CommandOptions::ListNodes { verbose: false })
        );
    }

    #[test]
    fn completions_takes_a_shell() {
        let (_, invocation) = parse(&["completions", "zsh"]).unwrap().into_parts();
        assert_eq!(invocation, Invocation::Completions(Shell::Zsh));

        let err = parse(&["completions", "cmd.exe"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn bash_script_covers_subcommands() {
        let mut out = Vec::new();
        generate_completions(Shell::Bash, &mut out);
        let script = String::from_utf8(out).unwrap();
        assert!(script.contains("pmb-admin"));
        assert!(script.contains("restore"));
        assert!(script.contains("--server-addr"));
    }

    #[test]
    fn metadata_file_has_dynamic_candidates() {
        let cmd = Cli::command();
        let restore = cmd
            .find_subcommand("run")
            .and_then(|run| run.find_subcommand("restore"))
            .unwrap();
        let metadata_file = restore
            .get_arguments()
            .find(|arg| arg.get_id() == "metadata_file")
            .unwrap();
        assert!(metadata_file.get::<ArgValueCandidates>().is_some());
    }

    #[test]
    fn missing_subcommand_is_rejected() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["list"]).is_err());
    }
}
