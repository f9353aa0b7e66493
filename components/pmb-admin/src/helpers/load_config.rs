//! Option resolution for the admin client.
//!
//! Every connection setting is resolved from three layers, highest first:
//!
//! ```text
//! command-line flag  >  config file (YAML)  >  built-in default
//! ```
//!
//! The result is a single [`ResolvedOptions`] value that is built once at
//! startup and never mutated afterwards.

// Local crates
use crate::client::requests;

// External crates
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Coordinator address used when neither a flag nor the config file sets one.
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:10001";

/// Config file consulted when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "~/.pmb-admin.yml";

/// Option resolution errors. All of them are fatal startup errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot load configuration from file {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },
    #[error("config file {0} does not exist")]
    NotFound(PathBuf),
    #[error("cannot expand `~` in {0}: home directory is unknown")]
    HomeDirUnavailable(String),
    #[error("a backup description is required (--description)")]
    MissingDescription,
    #[error("a metadata file is required to run a restore")]
    MissingMetadataFile,
    #[error("encryption algorithm {0:?} is not yet supported")]
    UnsupportedCipher(String),
}

/// Keys accepted in the YAML config file. Unknown keys are ignored.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub tls: Option<bool>,
    pub ca_file: Option<String>,
    pub server_addr: Option<String>,
}

impl FileConfig {
    /// Load and decode a YAML config file.
    #[instrument(
        name = "pmb_admin_config::load",
        target = "helpers::load_config",
        level = "trace",
        skip_all
    )]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        tracing::trace!(
            configuration_file_path = %path_ref.display(),
            "Loading admin client configuration file"
        );

        let settings = config::Config::builder()
            .add_source(
                config::File::from(path_ref)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize::<FileConfig>());

        match settings {
            Ok(cfg) => {
                tracing::trace!(
                    configuration_file_path = %path_ref.display(),
                    "Admin client configuration file loaded successfully"
                );
                Ok(cfg)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load YAML configuration");
                Err(ConfigError::Load {
                    path: path_ref.to_path_buf(),
                    source: e,
                })
            }
        }
    }
}

/// Raw global flag values as typed by the operator. `None` means the flag was
/// not given, which lets the lower layers fill it in.
#[derive(Debug, Clone, Default)]
pub struct GlobalFlags {
    pub tls: Option<bool>,
    pub ca_file: Option<String>,
    pub server_addr: Option<String>,
    pub config_file: Option<String>,
}

/// `run backup` options, still in their symbolic form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupOptions {
    pub backup_type: String,
    pub destination_type: String,
    pub compression_algorithm: String,
    pub encryption_algorithm: String,
    pub description: String,
}

/// `run restore` options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOptions {
    pub metadata_file: String,
    pub skip_users_and_roles: bool,
}

/// Per-command part of the resolved options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOptions {
    Backup(BackupOptions),
    Restore(RestoreOptions),
    ListNodes { verbose: bool },
    ListBackups,
}

/// Fully merged options for one process run.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub use_tls: bool,
    pub ca_file: Option<PathBuf>,
    pub server_addr: String,
    pub config_file: Option<PathBuf>,
    pub command: CommandOptions,
}

impl ResolvedOptions {
    /// Resolve options, loading the config file named by the flags (or the
    /// default one) when the path is non-empty.
    #[instrument(
        name = "pmb_admin_config::resolve",
        target = "helpers::load_config",
        level = "debug",
        skip_all
    )]
    pub fn resolve(flags: GlobalFlags, command: CommandOptions) -> Result<Self, ConfigError> {
        Self::resolve_with_default(flags, command, DEFAULT_CONFIG_FILE)
    }

    /// [`resolve`](Self::resolve) with `default_config` standing in for
    /// [`DEFAULT_CONFIG_FILE`]. A missing file at that path is skipped; a
    /// missing file named by `--config` is an error.
    pub fn resolve_with_default(
        flags: GlobalFlags,
        command: CommandOptions,
        default_config: &str,
    ) -> Result<Self, ConfigError> {
        let explicit = flags.config_file.is_some();
        let raw_path = flags
            .config_file
            .clone()
            .unwrap_or_else(|| default_config.to_string());

        let (config_file, file_config) = if raw_path.is_empty() {
            (None, None)
        } else {
            let path = expand_home(&raw_path)?;
            if path.exists() {
                let loaded = FileConfig::load(&path)?;
                (Some(path), Some(loaded))
            } else if explicit {
                return Err(ConfigError::NotFound(path));
            } else {
                tracing::debug!(
                    configuration_file_path = %path.display(),
                    "Default config file not present, using flags and built-in defaults"
                );
                (None, None)
            }
        };

        let mut resolved = Self::merge(flags, file_config.unwrap_or_default(), command)?;
        resolved.config_file = config_file;
        Ok(resolved)
    }

    /// Merge already-loaded layers. Flags win over the file, the file wins
    /// over built-in defaults.
    pub fn merge(
        flags: GlobalFlags,
        file: FileConfig,
        command: CommandOptions,
    ) -> Result<Self, ConfigError> {
        validate_command(&command)?;

        let server_addr = non_empty(flags.server_addr)
            .or_else(|| non_empty(file.server_addr))
            .unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string());

        let ca_file = non_empty(flags.ca_file)
            .or_else(|| non_empty(file.ca_file))
            .map(PathBuf::from);

        let use_tls = flags.tls.or(file.tls).unwrap_or(false);

        tracing::debug!(
            server_addr = %server_addr,
            use_tls,
            ca_file = ?ca_file,
            "Resolved connection options"
        );

        Ok(Self {
            use_tls,
            ca_file,
            server_addr,
            config_file: None,
            command,
        })
    }
}

/// Required command options must be present, and the cipher supported,
/// before anything touches the network.
fn validate_command(command: &CommandOptions) -> Result<(), ConfigError> {
    match command {
        CommandOptions::Backup(backup) if backup.description.trim().is_empty() => {
            Err(ConfigError::MissingDescription)
        }
        CommandOptions::Backup(backup)
            if requests::cipher(&backup.encryption_algorithm).is_err() =>
        {
            Err(ConfigError::UnsupportedCipher(
                backup.encryption_algorithm.clone(),
            ))
        }
        CommandOptions::Restore(restore) if restore.metadata_file.trim().is_empty() => {
            Err(ConfigError::MissingMetadataFile)
        }
        _ => Ok(()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Expand a leading `~/` to the current user's home directory.
pub fn expand_home(raw: &str) -> Result<PathBuf, ConfigError> {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .ok_or_else(|| ConfigError::HomeDirUnavailable(raw.to_string())),
        None => Ok(PathBuf::from(raw)),
    }
}
