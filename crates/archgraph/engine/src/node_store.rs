//! Node lifecycle: create, read, list, copy-on-write update, delete, history.

use crate::error::{GraphError, GraphResult};
use crate::graph::GraphContext;
use crate::relationships::{current_edges, plan_migration};
use archgraph_store::{NodeQuery, QueryWindow, WriteBatch};
use archgraph_types::{
    Layer, LogicalId, Node, NodeAttributes, NodeId, NodeStatus, NodeType, Temporal, Versioned,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Filters for [`NodeStore::list`]. Every populated field narrows the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeFilter {
    #[serde(default)]
    pub node_type: Option<NodeType>,
    #[serde(default)]
    pub layer: Option<Layer>,
    #[serde(default)]
    pub status: Option<NodeStatus>,
    /// Any-of tag membership.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Case-insensitive substring over name and description.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl NodeFilter {
    pub fn of_type(node_type: NodeType) -> Self {
        Self {
            node_type: Some(node_type),
            ..Self::default()
        }
    }
}

/// One page of nodes plus the size of the full result under the same filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePage {
    pub nodes: Vec<Node>,
    pub total: usize,
}

/// Node Store.
#[derive(Clone)]
pub struct NodeStore {
    ctx: Arc<GraphContext>,
}

impl NodeStore {
    pub(crate) fn new(ctx: Arc<GraphContext>) -> Self {
        Self { ctx }
    }

    /// Create the first version of a new entity.
    ///
    /// `type_tag` names a node type; `attributes` is a flat bag of base and
    /// type-specific attributes.
    pub async fn create(&self, type_tag: &str, attributes: &Value) -> GraphResult<Node> {
        let node_type: NodeType = type_tag.parse()?;
        let attributes = NodeAttributes::from_json(node_type, attributes)?;
        let ctx = &self.ctx;
        let node = ctx
            .commit("create_node", move |now| plan_create(ctx, attributes.clone(), now))
            .await?;

        info!(
            node_id = %node.id,
            node_type = %node.node_type(),
            name = node.name(),
            "node created"
        );
        Ok(node)
    }

    /// The row with exactly `id`, provided it is current (or, with `as_of`,
    /// was active at that instant).
    pub async fn get(&self, id: NodeId, as_of: Option<DateTime<Utc>>) -> GraphResult<Node> {
        let scope = Temporal::from_as_of(as_of);
        let node = self
            .ctx
            .backend
            .node(&id)
            .await?
            .filter(|n| n.is_active(scope))
            .ok_or_else(|| GraphError::not_found("node", id))?;
        debug!(node_id = %id, ?as_of, "node read");
        Ok(node)
    }

    /// One page of nodes. The temporal predicate applies before every other
    /// filter and `total` counts the same predicate set.
    pub async fn list(&self, filter: &NodeFilter) -> GraphResult<NodePage> {
        let listing = &self.ctx.config.listing;
        let limit = match filter.limit {
            Some(0) => return Err(GraphError::Validation("limit must be positive".into())),
            Some(limit) => limit.min(listing.max_limit),
            None => listing.default_limit,
        };

        let mut query = NodeQuery::scoped(Temporal::from_as_of(filter.as_of));
        query.node_types = filter.node_type.map(|t| vec![t]);
        query.layer = filter.layer;
        query.status = filter.status;
        query.tags_any = filter.tags.clone();
        query.search = filter.search.clone();

        let total = self.ctx.backend.count_nodes(&query).await?;
        let nodes = self
            .ctx
            .backend
            .nodes(&query.with_window(QueryWindow::new(limit, filter.offset)))
            .await?;
        debug!(returned = nodes.len(), total, "nodes listed");
        Ok(NodePage { nodes, total })
    }

    /// Copy-on-write update.
    ///
    /// Closes the current row for `id`, opens a successor with the merged
    /// attributes and migrates every current relationship onto it, all in one
    /// batch stamped with a single instant.
    pub async fn update(&self, id: NodeId, patch: &Value) -> GraphResult<Node> {
        let ctx = &self.ctx;
        let (node, migrated) = ctx
            .commit("update_node", move |now| plan_update(ctx, id, patch, now))
            .await?;

        info!(
            previous_id = %id,
            node_id = %node.id,
            version = node.version,
            migrated,
            "node updated"
        );
        Ok(node)
    }

    /// Close the current row for `id` and every relationship touching it.
    /// Returns `false` when `id` is not current.
    pub async fn delete(&self, id: NodeId) -> GraphResult<bool> {
        let ctx = &self.ctx;
        let closed = ctx
            .commit("delete_node", move |now| plan_delete(ctx, id, now))
            .await?;

        match closed {
            Some(relationships) => {
                info!(node_id = %id, relationships, "node deleted");
                Ok(true)
            }
            None => {
                debug!(node_id = %id, "delete ignored, node not current");
                Ok(false)
            }
        }
    }

    /// Every version of the entity `id` belongs to, newest first.
    pub async fn history(&self, id: NodeId) -> GraphResult<Vec<Node>> {
        let node = self
            .ctx
            .backend
            .node(&id)
            .await?
            .ok_or_else(|| GraphError::not_found("node", id))?;
        let mut versions = self
            .ctx
            .backend
            .nodes(&NodeQuery::all_versions().with_logical_id(node.logical_id))
            .await?;
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        debug!(
            node_id = %id,
            logical_id = %node.logical_id,
            versions = versions.len(),
            "history read"
        );
        Ok(versions)
    }
}

async fn plan_create(
    ctx: &GraphContext,
    attributes: NodeAttributes,
    now: DateTime<Utc>,
) -> GraphResult<(WriteBatch, Node)> {
    ensure_name_available(ctx, attributes.node_type(), &attributes.name, None).await?;
    let node = Node::first_version(attributes, now);
    let mut batch = WriteBatch::new();
    batch.insert_node(node.clone());
    Ok((batch, node))
}

/// Close, succeed and migrate in one batch. Yields the successor and the
/// number of relationships carried over.
async fn plan_update(
    ctx: &GraphContext,
    id: NodeId,
    patch: &Value,
    now: DateTime<Utc>,
) -> GraphResult<(WriteBatch, (Node, usize))> {
    let old = ctx
        .backend
        .node(&id)
        .await?
        .filter(Versioned::is_current)
        .ok_or_else(|| GraphError::not_found("node", id))?;
    let attributes = old.attributes.merged(patch)?;
    if attributes.name != old.attributes.name {
        ensure_name_available(ctx, old.node_type(), &attributes.name, Some(old.logical_id)).await?;
    }

    let touching = current_edges(ctx, old.id).await?;
    let successor = old.successor(attributes, now);
    let mut batch = WriteBatch::new();
    batch.close_node(old.id, now).insert_node(successor.clone());
    let migrated = plan_migration(ctx, old.id, successor.id, touching, now, &mut batch).await?;
    Ok((batch, (successor, migrated.len())))
}

/// `None` when `id` is not current; otherwise the number of relationships closed.
async fn plan_delete(
    ctx: &GraphContext,
    id: NodeId,
    now: DateTime<Utc>,
) -> GraphResult<(WriteBatch, Option<usize>)> {
    let mut batch = WriteBatch::new();
    let Some(node) = ctx.backend.node(&id).await?.filter(Versioned::is_current) else {
        return Ok((batch, None));
    };
    batch.close_node(node.id, now);
    let touching = current_edges(ctx, node.id).await?;
    for rel in &touching {
        batch.close_relationship(rel.id, now);
    }
    batch.require_detached(node.id);
    Ok((batch, Some(touching.len())))
}

/// Fail with `Validation` when another entity currently holds `(node_type, name)`.
async fn ensure_name_available(
    ctx: &GraphContext,
    node_type: NodeType,
    name: &str,
    owner: Option<LogicalId>,
) -> GraphResult<()> {
    let holders = ctx
        .backend
        .nodes(&NodeQuery::current().with_types([node_type]).with_name(name))
        .await?;
    if holders.iter().any(|n| Some(n.logical_id) != owner) {
        return Err(GraphError::Validation(format!(
            "a current {node_type} named '{name}' already exists"
        )));
    }
    Ok(())
}
