//! Draining of server-streamed coordinator replies.
//!
//! A stream is read one message at a time until the coordinator signals end
//! of data. End of data is the normal way out and is never reported as an
//! error. Any other receive failure is wrapped with the operation name and
//! handed back to the caller. Each receive also watches the shared
//! cancellation token so an interrupt ends the loop promptly.

// Local crates
use crate::{
    client::rpc::{RpcError, cancellable},
    proto::{
        api::{BackupsMetadataParams, Client, Empty, MetadataFile, api_client::ApiClient},
        messages::BackupMetadata,
    },
};

// External crates
use std::collections::HashMap;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::{Status, transport::Channel};
use tracing::instrument;

const LIST_AGENTS: &str = "cannot get the connected agents list";
const LIST_BACKUPS: &str = "cannot get the backups metadata list";

/// Receive every message of `stream` into `sink` until end of data.
pub async fn drain_stream<S, T, F>(
    stream: S,
    cancel: &CancellationToken,
    operation: &'static str,
    mut sink: F,
) -> Result<usize, RpcError>
where
    S: Stream<Item = Result<T, Status>>,
    F: FnMut(T),
{
    tokio::pin!(stream);
    let mut received = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(operation, received, "Stream receive cancelled");
                return Err(RpcError::Cancelled { operation });
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(msg)) => {
                received += 1;
                sink(msg);
            }
            Some(Err(source)) => return Err(RpcError::Status { operation, source }),
            None => {
                tracing::debug!(operation, received, "Stream reached end of data");
                return Ok(received);
            }
        }
    }
}

/// Collect connected agents, sorted by node name. The sort is stable, so
/// agents sharing a node name keep their arrival order.
pub async fn collect_agents<S>(stream: S, cancel: &CancellationToken) -> Result<Vec<Client>, RpcError>
where
    S: Stream<Item = Result<Client, Status>>,
{
    let mut agents = Vec::new();
    drain_stream(stream, cancel, LIST_AGENTS, |agent| agents.push(agent)).await?;
    agents.sort_by(|a, b| a.node_name.cmp(&b.node_name));
    Ok(agents)
}

/// Collect catalog entries keyed by filename. A repeated filename replaces
/// the earlier entry.
pub async fn collect_backups<S>(
    stream: S,
    cancel: &CancellationToken,
) -> Result<HashMap<String, BackupMetadata>, RpcError>
where
    S: Stream<Item = Result<MetadataFile, Status>>,
{
    let mut backups = HashMap::new();
    drain_stream(stream, cancel, LIST_BACKUPS, |entry: MetadataFile| {
        backups.insert(entry.filename, entry.metadata.unwrap_or_default());
    })
    .await?;
    Ok(backups)
}

/// `GetClients`, drained and sorted.
#[instrument(
    name = "pmb_admin_aggregator::connected_agents",
    target = "client::aggregator",
    level = "debug",
    skip_all
)]
pub async fn connected_agents(
    client: &mut ApiClient<Channel>,
    cancel: &CancellationToken,
) -> Result<Vec<Client>, RpcError> {
    let stream = cancellable(cancel, LIST_AGENTS, client.get_clients(Empty {})).await?;
    collect_agents(stream, cancel).await
}

/// `BackupsMetadata`, drained into a filename map.
#[instrument(
    name = "pmb_admin_aggregator::available_backups",
    target = "client::aggregator",
    level = "debug",
    skip_all
)]
pub async fn available_backups(
    client: &mut ApiClient<Channel>,
    cancel: &CancellationToken,
) -> Result<HashMap<String, BackupMetadata>, RpcError> {
    let stream = cancellable(
        cancel,
        LIST_BACKUPS,
        client.backups_metadata(BackupsMetadataParams {}),
    )
    .await?;
    collect_backups(stream, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn agent(node_name: &str, id: &str) -> Client {
        Client {
            node_name: node_name.to_string(),
            id: id.to_string(),
            ..Default::default()
        }
    }

    fn entry(filename: &str, description: &str) -> MetadataFile {
        MetadataFile {
            filename: filename.to_string(),
            metadata: Some(BackupMetadata {
                description: description.to_string(),
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn agents_are_sorted_by_node_name() {
        let cancel = CancellationToken::new();
        let stream = tokio_stream::iter(vec![
            Ok(agent("rs2:27017", "a")),
            Ok(agent("cfg:27019", "b")),
            Ok(agent("rs1:27017", "c")),
        ]);

        let agents = collect_agents(stream, &cancel).await.unwrap();
        let names: Vec<_> = agents.iter().map(|a| a.node_name.as_str()).collect();
        assert_eq!(names, vec!["cfg:27019", "rs1:27017", "rs2:27017"]);
    }

    #[tokio::test]
    async fn duplicate_node_names_keep_arrival_order() {
        let cancel = CancellationToken::new();
        let stream = tokio_stream::iter(vec![
            Ok(agent("rs1", "first")),
            Ok(agent("a", "x")),
            Ok(agent("rs1", "second")),
            Ok(agent("rs1", "third")),
        ]);

        let agents = collect_agents(stream, &cancel).await.unwrap();
        let ids: Vec<_> = agents.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "first", "second", "third"]);
    }

    #[tokio::test]
    async fn empty_stream_is_not_an_error() {
        let cancel = CancellationToken::new();
        let agents = collect_agents(tokio_stream::empty(), &cancel).await.unwrap();
        assert!(agents.is_empty());

        let backups = collect_backups(tokio_stream::empty(), &cancel).await.unwrap();
        assert!(backups.is_empty());
    }

    #[tokio::test]
    async fn receive_error_is_wrapped_with_operation() {
        let cancel = CancellationToken::new();
        let stream = tokio_stream::iter(vec![
            Ok(agent("rs1", "a")),
            Err(Status::unavailable("coordinator went away")),
        ]);

        let err = collect_agents(stream, &cancel).await.unwrap_err();
        assert!(!err.is_cancelled());
        let msg = err.to_string();
        assert!(msg.starts_with(LIST_AGENTS), "{msg}");
        assert!(msg.contains("coordinator went away"), "{msg}");
    }

    #[tokio::test]
    async fn repeated_filename_keeps_last_entry() {
        let cancel = CancellationToken::new();
        let stream = tokio_stream::iter(vec![
            Ok(entry("b1.json", "old")),
            Ok(entry("b2.json", "other")),
            Ok(entry("b1.json", "new")),
        ]);

        let backups = collect_backups(stream, &cancel).await.unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(backups["b1.json"].description, "new");
    }

    #[tokio::test]
    async fn entry_without_metadata_gets_defaults() {
        let cancel = CancellationToken::new();
        let stream = tokio_stream::iter(vec![Ok(MetadataFile {
            filename: "bare.json".to_string(),
            metadata: None,
        })]);

        let backups = collect_backups(stream, &cancel).await.unwrap();
        assert_eq!(backups["bare.json"], BackupMetadata::default());
    }

    #[tokio::test]
    async fn cancellation_interrupts_blocked_receive() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let stream = tokio_stream::pending::<Result<Client, Status>>();
        let err = tokio::time::timeout(Duration::from_secs(2), collect_agents(stream, &cancel))
            .await
            .expect("aggregator should return once cancelled")
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
