//! Backup and restore request construction.
//!
//! Symbolic option values are translated through the lookup tables below.
//! Unrecognized or empty values fall back to the protobuf default of each
//! enumeration (logical, file, no compression). Encryption is different:
//! only "no cipher" exists today, so any other algorithm name is rejected
//! as unsupported instead of being silently dropped.

// Local crates
use crate::{
    client::rpc::{RpcError, cancellable},
    helpers::load_config::{BackupOptions, RestoreOptions},
    proto::{
        api::{RunBackupParams, RunRestoreParams, api_client::ApiClient},
        messages::{BackupType, Cipher, CompressionType, DestinationType},
    },
};

// External crates
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tracing::instrument;

/// `--backup-type` values.
pub const BACKUP_TYPES: &[(&str, BackupType)] = &[
    ("logical", BackupType::Logical),
    ("hot", BackupType::Hotbackup),
];

/// `--destination-type` values.
pub const DESTINATION_TYPES: &[(&str, DestinationType)] = &[
    ("file", DestinationType::File),
    ("aws", DestinationType::Aws),
];

/// `--compression-algorithm` values.
pub const COMPRESSION_TYPES: &[(&str, CompressionType)] = &[
    ("none", CompressionType::NoCompression),
    ("gzip", CompressionType::Gzip),
];

/// `--encryption-algorithm` values.
pub const CIPHERS: &[(&str, Cipher)] = &[("none", Cipher::NoCipher)];

/// Request errors. Both backup and restore treat them as fatal.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("encryption algorithm {0:?} is not yet supported")]
    UnsupportedCipher(String),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

fn lookup<E: Copy>(table: &[(&str, E)], value: &str) -> Option<E> {
    table
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, variant)| *variant)
}

/// Backup type for a symbolic name, `LOGICAL` when unknown or unset.
pub fn backup_type(value: &str) -> BackupType {
    lookup(BACKUP_TYPES, value).unwrap_or(BackupType::Logical)
}

/// Destination for a symbolic name, `FILE` when unknown or unset.
pub fn destination_type(value: &str) -> DestinationType {
    lookup(DESTINATION_TYPES, value).unwrap_or(DestinationType::File)
}

/// Compression for a symbolic name, `NO_COMPRESSION` when unknown or unset.
pub fn compression_type(value: &str) -> CompressionType {
    lookup(COMPRESSION_TYPES, value).unwrap_or(CompressionType::NoCompression)
}

/// Cipher for a symbolic name. Unset means no cipher; any name not in
/// [`CIPHERS`] is unsupported.
pub fn cipher(value: &str) -> Result<Cipher, RequestError> {
    if value.is_empty() {
        return Ok(Cipher::NoCipher);
    }
    lookup(CIPHERS, value).ok_or_else(|| RequestError::UnsupportedCipher(value.to_string()))
}

/// Build the `RunBackup` message from resolved options.
pub fn build_backup_request(opts: &BackupOptions) -> Result<RunBackupParams, RequestError> {
    let mut msg = RunBackupParams {
        description: opts.description.clone(),
        ..Default::default()
    };
    msg.set_backup_type(backup_type(&opts.backup_type));
    msg.set_destination_type(destination_type(&opts.destination_type));
    msg.set_compression_type(compression_type(&opts.compression_algorithm));
    msg.set_cipher(cipher(&opts.encryption_algorithm)?);
    Ok(msg)
}

/// Build the `RunRestore` message from resolved options.
pub fn build_restore_request(opts: &RestoreOptions) -> RunRestoreParams {
    RunRestoreParams {
        metadata_file: opts.metadata_file.clone(),
        skip_users_and_roles: opts.skip_users_and_roles,
    }
}

/// Send `RunBackup` and wait for the coordinator's acknowledgement.
#[instrument(
    name = "pmb_admin_requests::run_backup",
    target = "client::requests",
    level = "debug",
    skip_all
)]
pub async fn run_backup(
    client: &mut ApiClient<Channel>,
    cancel: &CancellationToken,
    opts: &BackupOptions,
) -> Result<(), RequestError> {
    let msg = build_backup_request(opts)?;
    tracing::info!(
        backup_type = msg.backup_type().as_str_name(),
        destination_type = msg.destination_type().as_str_name(),
        compression_type = msg.compression_type().as_str_name(),
        "Sending RunBackup to coordinator"
    );
    cancellable(
        cancel,
        "cannot send the RunBackup command to the gRPC server",
        client.run_backup(msg),
    )
    .await?;
    Ok(())
}

/// Send `RunRestore` and wait for the coordinator's acknowledgement.
#[instrument(
    name = "pmb_admin_requests::run_restore",
    target = "client::requests",
    level = "debug",
    skip_all
)]
pub async fn run_restore(
    client: &mut ApiClient<Channel>,
    cancel: &CancellationToken,
    opts: &RestoreOptions,
) -> Result<(), RequestError> {
    let msg = build_restore_request(opts);
    tracing::info!(
        metadata_file = %msg.metadata_file,
        skip_users_and_roles = msg.skip_users_and_roles,
        "Sending RunRestore to coordinator"
    );
    cancellable(
        cancel,
        "cannot send the RunRestore command to the gRPC server",
        client.run_restore(msg),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_type_mapping() {
        assert_eq!(backup_type("logical"), BackupType::Logical);
        assert_eq!(backup_type("hot"), BackupType::Hotbackup);
        assert_eq!(backup_type(""), BackupType::Logical);
        assert_eq!(backup_type("incremental"), BackupType::Logical);
    }

    #[test]
    fn destination_type_mapping() {
        assert_eq!(destination_type("file"), DestinationType::File);
        assert_eq!(destination_type("aws"), DestinationType::Aws);
        assert_eq!(destination_type(""), DestinationType::File);
        assert_eq!(destination_type("gcs"), DestinationType::File);
    }

    #[test]
    fn compression_defaults_to_none() {
        assert_eq!(compression_type("gzip"), CompressionType::Gzip);
        for value in ["", "none", "zstd", "GZIP", "gz", " gzip"] {
            assert_eq!(
                compression_type(value),
                CompressionType::NoCompression,
                "value {value:?}"
            );
        }
    }

    #[test]
    fn every_table_entry_round_trips_through_lookup() {
        for (name, variant) in BACKUP_TYPES {
            assert_eq!(backup_type(name), *variant);
        }
        for (name, variant) in DESTINATION_TYPES {
            assert_eq!(destination_type(name), *variant);
        }
        for (name, variant) in COMPRESSION_TYPES {
            assert_eq!(compression_type(name), *variant);
        }
        for (name, variant) in CIPHERS {
            assert_eq!(cipher(name).unwrap(), *variant);
        }
    }

    #[test]
    fn unknown_cipher_is_unsupported() {
        assert_eq!(cipher("").unwrap(), Cipher::NoCipher);
        let err = cipher("aes-256-gcm").unwrap_err();
        assert!(matches!(err, RequestError::UnsupportedCipher(ref v) if v == "aes-256-gcm"));
        assert!(err.to_string().contains("not yet supported"));
    }

    #[test]
    fn backup_request_carries_mapped_values() {
        let opts = BackupOptions {
            backup_type: "hot".to_string(),
            destination_type: "aws".to_string(),
            compression_algorithm: "gzip".to_string(),
            encryption_algorithm: String::new(),
            description: "before upgrade".to_string(),
        };

        let msg = build_backup_request(&opts).unwrap();
        assert_eq!(msg.backup_type(), BackupType::Hotbackup);
        assert_eq!(msg.destination_type(), DestinationType::Aws);
        assert_eq!(msg.compression_type(), CompressionType::Gzip);
        assert_eq!(msg.cipher(), Cipher::NoCipher);
        assert_eq!(msg.description, "before upgrade");
    }

    #[test]
    fn restore_request_copies_options() {
        let msg = build_restore_request(&RestoreOptions {
            metadata_file: "2024-01-01T00:00:00Z.json".to_string(),
            skip_users_and_roles: false,
        });
        assert_eq!(msg.metadata_file, "2024-01-01T00:00:00Z.json");
        assert!(!msg.skip_users_and_roles);
    }
}
