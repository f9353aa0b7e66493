//! Conversions from protobuf messages into the flat views the templates render.
//!
//! These conversions are total. Unknown enum values fall back to the protobuf
//! default and missing timestamps render as `-`.

// Local crates
use crate::proto::api::Client;
use crate::proto::messages::BackupMetadata;

// External crates
use chrono::{DateTime, SecondsFormat, Utc};
use prost_types::Timestamp;
use serde::Serialize;

/// One connected agent as shown by `list nodes`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NodeView {
    pub id: String,
    pub node_name: String,
    pub node_type: String,
    pub cluster_id: String,
    pub replicaset_name: String,
    pub replicaset_id: String,
    pub version: i32,
    pub backup_running: bool,
    pub restore_running: bool,
    pub last_command_sent: i64,
    pub last_seen: String,
}

/// One catalog entry as shown by `list backups`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BackupView {
    pub filename: String,
    pub description: String,
    pub backup_type: String,
    pub destination_type: String,
    pub compression_type: String,
    pub cipher: String,
    pub start_ts: String,
    pub end_ts: String,
    pub replicasets: Vec<String>,
}

/// Convert `Client` (from proto::api) -> `NodeView`.
impl From<&Client> for NodeView {
    fn from(client: &Client) -> Self {
        let status = client.status.as_ref();
        Self {
            id: client.id.clone(),
            node_name: client.node_name.clone(),
            node_type: enum_label(client.node_type().as_str_name(), "NODE_TYPE_"),
            cluster_id: client.cluster_id.clone(),
            replicaset_name: client.replicaset_name.clone(),
            replicaset_id: client.replicaset_id.clone(),
            version: client.version,
            backup_running: status.is_some_and(|s| s.backup_running),
            restore_running: status.is_some_and(|s| s.restore_running),
            last_command_sent: client.last_command_sent,
            last_seen: format_timestamp(client.last_seen.as_ref()),
        }
    }
}

impl BackupView {
    /// Build the view for one `(filename, metadata)` catalog entry.
    pub fn new(filename: &str, metadata: &BackupMetadata) -> Self {
        let mut replicasets: Vec<String> = metadata.replicasets.keys().cloned().collect();
        replicasets.sort();

        Self {
            filename: filename.to_string(),
            description: metadata.description.clone(),
            backup_type: enum_label(metadata.backup_type().as_str_name(), "BACKUP_TYPE_"),
            destination_type: enum_label(
                metadata.destination_type().as_str_name(),
                "DESTINATION_TYPE_",
            ),
            compression_type: enum_label(
                metadata.compression_type().as_str_name(),
                "COMPRESSION_TYPE_",
            ),
            cipher: enum_label(metadata.cipher().as_str_name(), "CIPHER_"),
            start_ts: format_timestamp(metadata.start_ts.as_ref()),
            end_ts: format_timestamp(metadata.end_ts.as_ref()),
            replicasets,
        }
    }
}

/// `BACKUP_TYPE_HOTBACKUP` -> `hotbackup`
fn enum_label(name: &str, prefix: &str) -> String {
    name.strip_prefix(prefix).unwrap_or(name).to_lowercase()
}

/// Convert prost_types::Timestamp -> RFC 3339 string in UTC.
pub fn format_timestamp(ts: Option<&Timestamp>) -> String {
    ts.and_then(|ts| {
        let nanos = u32::try_from(ts.nanos).ok()?;
        DateTime::<Utc>::from_timestamp(ts.seconds, nanos)
    })
    .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
    .unwrap_or_else(|| "-".to_string())
}
