//! Rendering of aggregated results for the operator.
//!
//! Node listings pick the compact or verbose template, the backup catalog
//! always uses the same one. A template failure means the template and the
//! data disagree, so it is returned as an error and never swallowed.

// Local crates
use crate::{
    helpers::converters::{BackupView, NodeView},
    proto::{api::Client, messages::BackupMetadata},
    render::templates,
};

// External crates
use handlebars::{Handlebars, handlebars_helper};
use serde_json::json;
use std::collections::HashMap;
use tracing::instrument;

/// Printed instead of the catalog template when there are no backups.
pub const NO_BACKUPS: &str = "No backups found";

/// Printed instead of the node templates when no agent is connected.
pub const NO_NODES: &str = "No connected nodes found";

const NODES: &str = "connected_nodes";
const NODES_VERBOSE: &str = "connected_nodes_verbose";
const BACKUPS: &str = "available_backups";

handlebars_helper!(pad: |value: str, width: u64| {
    format!("{value:<width$}", width = usize::try_from(width).unwrap_or(0))
});

handlebars_helper!(join: |items: array, sep: str| {
    items
        .iter()
        .filter_map(|item| item.as_str())
        .collect::<Vec<_>>()
        .join(sep)
});

/// Template rendering errors. Fatal.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid output template: {0}")]
    Template(#[from] handlebars::TemplateError),
    #[error("cannot render output: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Registry of the output templates.
#[derive(Debug)]
pub struct OutputRenderer {
    registry: Handlebars<'static>,
}

impl OutputRenderer {
    /// Compile all templates.
    pub fn new() -> Result<Self, RenderError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_helper("pad", Box::new(pad));
        registry.register_helper("join", Box::new(join));

        registry.register_template_string(NODES, templates::CONNECTED_NODES)?;
        registry.register_template_string(NODES_VERBOSE, templates::CONNECTED_NODES_VERBOSE)?;
        registry.register_template_string(BACKUPS, templates::AVAILABLE_BACKUPS)?;

        Ok(Self { registry })
    }

    /// Render the agent list with the compact or verbose template.
    #[instrument(
        name = "pmb_admin_render::nodes",
        target = "render::renderer",
        level = "trace",
        skip(self, agents)
    )]
    pub fn render_nodes(&self, agents: &[Client], verbose: bool) -> Result<String, RenderError> {
        if agents.is_empty() {
            return Ok(format!("{NO_NODES}\n"));
        }

        let nodes: Vec<NodeView> = agents.iter().map(NodeView::from).collect();
        let template = if verbose { NODES_VERBOSE } else { NODES };
        Ok(self.registry.render(template, &json!({ "nodes": nodes }))?)
    }

    /// Render the backup catalog. Entries are listed in filename order.
    #[instrument(
        name = "pmb_admin_render::backups",
        target = "render::renderer",
        level = "trace",
        skip_all
    )]
    pub fn render_backups(
        &self,
        backups: &HashMap<String, BackupMetadata>,
    ) -> Result<String, RenderError> {
        if backups.is_empty() {
            return Ok(format!("{NO_BACKUPS}\n"));
        }

        let mut views: Vec<BackupView> = backups
            .iter()
            .map(|(filename, metadata)| BackupView::new(filename, metadata))
            .collect();
        views.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(self.registry.render(BACKUPS, &json!({ "backups": views }))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(node_name: &str, replicaset: &str) -> Client {
        Client {
            id: format!("id-{node_name}"),
            node_name: node_name.to_string(),
            replicaset_name: replicaset.to_string(),
            cluster_id: "cluster-1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn compact_nodes_have_header_and_one_line_each() {
        let renderer = OutputRenderer::new().unwrap();
        let out = renderer
            .render_nodes(&[agent("a:27017", "rs1"), agent("b:27017", "rs1")], false)
            .unwrap();

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3, "{out}");
        assert!(lines[0].starts_with("Node Name"));
        assert!(lines[1].starts_with("a:27017 "));
        assert!(lines[2].starts_with("b:27017 "));
        assert!(lines[1].ends_with("cluster-1"));
    }

    #[test]
    fn verbose_nodes_include_identifiers() {
        let renderer = OutputRenderer::new().unwrap();
        let out = renderer.render_nodes(&[agent("a:27017", "rs1")], true).unwrap();

        assert!(out.contains("Node Name:          a:27017"), "{out}");
        assert!(out.contains("ID:               id-a:27017"), "{out}");
        assert!(out.contains("Last Seen:        -"), "{out}");
    }

    #[test]
    fn no_agents_renders_neutral_message() {
        let renderer = OutputRenderer::new().unwrap();
        assert_eq!(renderer.render_nodes(&[], true).unwrap(), "No connected nodes found\n");
    }

    #[test]
    fn empty_catalog_renders_no_backups_found() {
        let renderer = OutputRenderer::new().unwrap();
        assert_eq!(
            renderer.render_backups(&HashMap::new()).unwrap(),
            "No backups found\n"
        );
    }

    #[test]
    fn catalog_is_listed_by_filename() {
        let renderer = OutputRenderer::new().unwrap();
        let mut backups = HashMap::new();
        backups.insert(
            "b.json".to_string(),
            BackupMetadata {
                description: "second".to_string(),
                ..Default::default()
            },
        );
        backups.insert(
            "a.json".to_string(),
            BackupMetadata {
                description: "first".to_string(),
                ..Default::default()
            },
        );

        let out = renderer.render_backups(&backups).unwrap();
        let a = out.find("a.json").unwrap();
        let b = out.find("b.json").unwrap();
        assert!(a < b, "{out}");
        assert!(out.contains("Description:      first"), "{out}");
        assert!(out.contains("Compression:      no_compression"), "{out}");
    }
}
