//! Bounded, time-aware subgraph extraction.

use crate::error::{GraphError, GraphResult};
use crate::graph::GraphContext;
use archgraph_store::{NodeQuery, RelationshipQuery};
use archgraph_types::{Direction, Node, NodeId, Relationship, Temporal, Versioned};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Nodes reached from a root plus every relationship among them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    /// Root first, then breadth-first by hop.
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl Subgraph {
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn node_ids(&self) -> HashSet<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }
}

/// Traversal Engine.
#[derive(Clone)]
pub struct TraversalEngine {
    ctx: Arc<GraphContext>,
}

impl TraversalEngine {
    pub(crate) fn new(ctx: Arc<GraphContext>) -> Self {
        Self { ctx }
    }

    /// Everything within `depth` undirected hops of `root_id`.
    ///
    /// Every node and relationship on a connecting path must be active under
    /// the scope (`as_of`, or current). The relationship set is closed over the
    /// node set: it holds every active edge whose endpoints were both reached,
    /// not only the edges that discovered them. `depth` 0 yields the root alone.
    pub async fn traverse_subgraph(
        &self,
        root_id: NodeId,
        depth: u32,
        as_of: Option<DateTime<Utc>>,
    ) -> GraphResult<Subgraph> {
        let max_depth = self.ctx.config.traversal.max_depth;
        if depth > max_depth {
            return Err(GraphError::Validation(format!(
                "depth {depth} is outside 0..={max_depth}"
            )));
        }

        let scope = Temporal::from_as_of(as_of);
        let backend = &self.ctx.backend;
        let root = backend
            .node(&root_id)
            .await?
            .filter(|n| n.is_active(scope))
            .ok_or_else(|| GraphError::not_found("node", root_id))?;

        let mut seen: HashSet<NodeId> = HashSet::from([root.id]);
        let mut frontier = vec![root.id];
        let mut nodes = vec![root];

        for hop in 1..=depth {
            let query =
                RelationshipQuery::scoped(scope).touching(frontier.clone(), Direction::Both);
            let edges = backend.relationships(&query).await?;
            let candidates: HashSet<NodeId> = edges
                .iter()
                .flat_map(|r| [r.source_id, r.target_id])
                .filter(|id| !seen.contains(id))
                .collect();
            if candidates.is_empty() {
                debug!(hop, "traversal frontier exhausted");
                break;
            }

            let reached = backend
                .nodes(&NodeQuery::scoped(scope).with_ids(candidates))
                .await?;
            debug!(hop, frontier = frontier.len(), reached = reached.len(), "traversal hop");
            frontier = reached.iter().map(|n| n.id).collect();
            seen.extend(frontier.iter().copied());
            nodes.extend(reached);
            if frontier.is_empty() {
                break;
            }
        }

        let relationships = if depth == 0 {
            Vec::new()
        } else {
            let query =
                RelationshipQuery::scoped(scope).touching(seen.iter().copied(), Direction::Both);
            backend
                .relationships(&query)
                .await?
                .into_iter()
                .filter(|r| seen.contains(&r.source_id) && seen.contains(&r.target_id))
                .collect()
        };

        debug!(
            root_id = %root_id,
            depth,
            nodes = nodes.len(),
            relationships = relationships.len(),
            "subgraph traversed"
        );
        Ok(Subgraph { nodes, relationships })
    }
}
