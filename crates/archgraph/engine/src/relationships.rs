//! Relationship Manager: typed edges, the matrix gate, and migration onto
//! successor node versions.

use crate::error::{GraphError, GraphResult};
use crate::graph::GraphContext;
use archgraph_store::{NodeQuery, RelationshipQuery, WriteBatch};
use archgraph_types::{
    Direction, Node, NodeId, NodeSummary, Relationship, RelationshipId, RelationshipProps,
    RelationshipType, Temporal, Versioned,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A relationship with both endpoints resolved for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipView {
    #[serde(flatten)]
    pub relationship: Relationship,
    pub source: NodeSummary,
    pub target: NodeSummary,
}

/// Relationship Manager.
#[derive(Clone)]
pub struct RelationshipManager {
    ctx: Arc<GraphContext>,
}

impl RelationshipManager {
    pub(crate) fn new(ctx: Arc<GraphContext>) -> Self {
        Self { ctx }
    }

    /// Create a current edge between two current nodes.
    ///
    /// Fails with `NotFound` if either endpoint is not current and with
    /// `InvalidRelationship` if the matrix does not allow the triple.
    pub async fn create(
        &self,
        rel_type: RelationshipType,
        source_id: NodeId,
        target_id: NodeId,
        props: RelationshipProps,
    ) -> GraphResult<Relationship> {
        let ctx = &self.ctx;
        let props = &props;
        let rel = ctx
            .commit("create_relationship", move |now| {
                plan_create(ctx, rel_type, source_id, target_id, props, now)
            })
            .await?;

        info!(
            relationship_id = %rel.id,
            rel_type = %rel.rel_type,
            source_id = %rel.source_id,
            target_id = %rel.target_id,
            "relationship created"
        );
        Ok(rel)
    }

    /// The relationship with exactly `id`, if current (or active at `as_of`).
    pub async fn get(
        &self,
        id: RelationshipId,
        as_of: Option<DateTime<Utc>>,
    ) -> GraphResult<Relationship> {
        let scope = Temporal::from_as_of(as_of);
        let rel = self
            .ctx
            .backend
            .relationship(&id)
            .await?
            .filter(|r| r.is_active(scope))
            .ok_or_else(|| GraphError::not_found("relationship", id))?;
        debug!(relationship_id = %id, ?as_of, "relationship read");
        Ok(rel)
    }

    /// Close the relationship. Returns `false` when it is not current.
    pub async fn delete(&self, id: RelationshipId) -> GraphResult<bool> {
        let ctx = &self.ctx;
        let closed = ctx
            .commit("delete_relationship", move |now| plan_delete(ctx, id, now))
            .await?;
        if closed {
            info!(relationship_id = %id, "relationship deleted");
        } else {
            debug!(relationship_id = %id, "delete ignored, relationship not current");
        }
        Ok(closed)
    }

    /// Edges touching `node_id` in `direction`, current or as of an instant,
    /// each with its endpoints summarised.
    pub async fn list_for_node(
        &self,
        node_id: NodeId,
        direction: Direction,
        as_of: Option<DateTime<Utc>>,
    ) -> GraphResult<Vec<RelationshipView>> {
        let scope = Temporal::from_as_of(as_of);
        let rels = self
            .ctx
            .backend
            .relationships(&RelationshipQuery::scoped(scope).touching([node_id], direction))
            .await?;

        let endpoint_ids: HashSet<NodeId> = rels
            .iter()
            .flat_map(|r| [r.source_id, r.target_id])
            .collect();
        let endpoints: HashMap<NodeId, Node> = self
            .ctx
            .backend
            .nodes(&NodeQuery::all_versions().with_ids(endpoint_ids))
            .await?
            .into_iter()
            .map(|n| (n.id, n))
            .collect();

        let mut views = Vec::with_capacity(rels.len());
        for rel in rels {
            match (endpoints.get(&rel.source_id), endpoints.get(&rel.target_id)) {
                (Some(source), Some(target)) => views.push(RelationshipView {
                    source: source.summary(),
                    target: target.summary(),
                    relationship: rel,
                }),
                _ => warn!(
                    relationship_id = %rel.id,
                    "skipping relationship with missing endpoint"
                ),
            }
        }
        debug!(node_id = %node_id, ?direction, count = views.len(), "relationships listed");
        Ok(views)
    }

    /// Move every current edge of `old_id` onto `new_id`, stamped at `now`.
    ///
    /// Safe to repeat: once migrated, `old_id` has no current edges left.
    pub async fn migrate(
        &self,
        old_id: NodeId,
        new_id: NodeId,
        now: DateTime<Utc>,
    ) -> GraphResult<Vec<Relationship>> {
        let ctx = &self.ctx;
        let created = ctx
            .commit("migrate_relationships", move |_| plan_migrate(ctx, old_id, new_id, now))
            .await?;
        info!(
            old_id = %old_id,
            new_id = %new_id,
            migrated = created.len(),
            "relationships migrated"
        );
        Ok(created)
    }
}

async fn current_node(ctx: &GraphContext, id: NodeId) -> GraphResult<Node> {
    ctx.backend
        .node(&id)
        .await?
        .filter(Versioned::is_current)
        .ok_or_else(|| GraphError::not_found("node", id))
}

async fn plan_create(
    ctx: &GraphContext,
    rel_type: RelationshipType,
    source_id: NodeId,
    target_id: NodeId,
    props: &RelationshipProps,
    now: DateTime<Utc>,
) -> GraphResult<(WriteBatch, Relationship)> {
    let source = current_node(ctx, source_id).await?;
    let target = current_node(ctx, target_id).await?;
    let (source_type, target_type) = (source.node_type(), target.node_type());
    if !ctx.matrix.allows(rel_type, source_type, target_type) {
        return Err(GraphError::InvalidRelationship {
            rel_type,
            source_type,
            target_type,
        });
    }

    let rel = Relationship::new(rel_type, source_id, target_id, props.clone(), now);
    let mut batch = WriteBatch::new();
    batch
        .require_current(source_id)
        .require_current(target_id)
        .insert_relationship(rel.clone());
    Ok((batch, rel))
}

async fn plan_delete(
    ctx: &GraphContext,
    id: RelationshipId,
    now: DateTime<Utc>,
) -> GraphResult<(WriteBatch, bool)> {
    let mut batch = WriteBatch::new();
    let current = ctx.backend.relationship(&id).await?.filter(Versioned::is_current);
    if current.is_some() {
        batch.close_relationship(id, now);
    }
    Ok((batch, current.is_some()))
}

async fn plan_migrate(
    ctx: &GraphContext,
    old_id: NodeId,
    new_id: NodeId,
    now: DateTime<Utc>,
) -> GraphResult<(WriteBatch, Vec<Relationship>)> {
    let touching = current_edges(ctx, old_id).await?;
    if let Some(rel) = touching.iter().find(|r| r.valid_from > now) {
        return Err(GraphError::Validation(format!(
            "cannot migrate {} at {now}: it opened at {}",
            rel.id, rel.valid_from
        )));
    }
    let mut batch = WriteBatch::new();
    batch.require_current(new_id);
    let created = plan_migration(ctx, old_id, new_id, touching, now, &mut batch).await?;
    Ok((batch, created))
}

/// Current relationships touching `id` in either direction.
pub(crate) async fn current_edges(
    ctx: &GraphContext,
    id: NodeId,
) -> GraphResult<Vec<Relationship>> {
    Ok(ctx
        .backend
        .relationships(&RelationshipQuery::current().touching([id], Direction::Both))
        .await?)
}

/// Append to `batch` the steps that move `touching`, the current edges of
/// `old_id`, onto `new_id`, returning the replacement edges.
///
/// Each edge is closed; a replacement with identical type and properties is
/// opened only when the far endpoint is still current, and the batch re-checks
/// that endpoint's currency when it applies. Self-loops move both ends. The
/// batch ends by requiring `old_id` to have no current edges left, so an edge
/// created after `touching` was read fails the batch with a conflict.
pub(crate) async fn plan_migration(
    ctx: &GraphContext,
    old_id: NodeId,
    new_id: NodeId,
    touching: Vec<Relationship>,
    now: DateTime<Utc>,
    batch: &mut WriteBatch,
) -> GraphResult<Vec<Relationship>> {
    let far_ids: HashSet<NodeId> = touching
        .iter()
        .map(|r| r.other_end(old_id))
        .filter(|id| *id != old_id)
        .collect();
    let live: HashSet<NodeId> = if far_ids.is_empty() {
        HashSet::new()
    } else {
        ctx.backend
            .nodes(&NodeQuery::current().with_ids(far_ids))
            .await?
            .into_iter()
            .map(|n| n.id)
            .collect()
    };

    let mut created = Vec::new();
    for rel in touching {
        batch.close_relationship(rel.id, now);
        let far = rel.other_end(old_id);
        if far != old_id {
            if !live.contains(&far) {
                warn!(
                    relationship_id = %rel.id,
                    endpoint = %far,
                    "dropping relationship to non-current node"
                );
                continue;
            }
            batch.require_current(far);
        }
        let replacement = rel.repointed(old_id, new_id, now);
        batch.insert_relationship(replacement.clone());
        created.push(replacement);
    }
    batch.require_detached(old_id);
    Ok(created)
}
