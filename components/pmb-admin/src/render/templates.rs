//! Output templates.

/// One line per agent.
pub const CONNECTED_NODES: &str = "\
{{pad \"Node Name\" 32}} {{pad \"Node Type\" 20}} {{pad \"Replicaset\" 20}} Cluster ID
{{#each nodes}}{{pad node_name 32}} {{pad node_type 20}} {{pad replicaset_name 20}} {{cluster_id}}
{{/each}}";

/// One block per agent with identifiers, status and liveness.
pub const CONNECTED_NODES_VERBOSE: &str = "\
{{#each nodes}}Node Name:          {{node_name}}
  ID:               {{id}}
  Node Type:        {{node_type}}
  Cluster ID:       {{cluster_id}}
  Replicaset:       {{replicaset_name}} ({{replicaset_id}})
  Agent Version:    {{version}}
  Backup Running:   {{backup_running}}
  Restore Running:  {{restore_running}}
  Last Command:     {{last_command_sent}}
  Last Seen:        {{last_seen}}

{{/each}}";

/// One block per catalog entry.
pub const AVAILABLE_BACKUPS: &str = "\
{{#each backups}}{{filename}}
  Description:      {{description}}
  Backup Type:      {{backup_type}}
  Destination:      {{destination_type}}
  Compression:      {{compression_type}}
  Cipher:           {{cipher}}
  Started:          {{start_ts}}
  Finished:         {{end_ts}}
  Replicasets:      {{join replicasets \", \"}}

{{/each}}";
