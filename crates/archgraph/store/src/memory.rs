//! In-memory adjacency backend.
//!
//! Deterministic and test-friendly. Production deployments should use the
//! transactional PostgreSQL backend as source of truth.

use crate::batch::{Mutation, WriteBatch};
use crate::query::{NodeQuery, RelationshipQuery};
use crate::traits::GraphBackend;
use crate::{StorageError, StorageResult};
use archgraph_types::{LogicalId, Node, NodeId, NodeType, Relationship, RelationshipId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

type NameKey = (NodeType, String);

#[derive(Default)]
struct GraphState {
    nodes: HashMap<NodeId, Node>,
    current_by_logical: HashMap<LogicalId, NodeId>,
    current_by_name: HashMap<NameKey, LogicalId>,
    relationships: HashMap<RelationshipId, Relationship>,
    adjacency: HashMap<NodeId, HashSet<RelationshipId>>,
}

/// Prior value of one index slot, restored when a batch aborts.
enum Undo {
    Node(NodeId, Option<Node>),
    Logical(LogicalId, Option<NodeId>),
    Name(NameKey, Option<LogicalId>),
    Relationship(RelationshipId, Option<Relationship>),
    Adjacency(NodeId, RelationshipId),
}

impl GraphState {
    fn name_key(node: &Node) -> NameKey {
        (node.node_type(), node.name().to_string())
    }

    fn insert_node(&mut self, node: Node, undo: &mut Vec<Undo>) -> StorageResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(StorageError::Conflict(format!("{} already exists", node.id)));
        }
        if node.valid_to.is_none() {
            if let Some(existing) = self.current_by_logical.get(&node.logical_id) {
                return Err(StorageError::Conflict(format!(
                    "{} already has current version {}",
                    node.logical_id, existing
                )));
            }
            let key = Self::name_key(&node);
            if let Some(holder) = self.current_by_name.get(&key) {
                if *holder != node.logical_id {
                    return Err(StorageError::Conflict(format!(
                        "a current {} named '{}' already exists",
                        key.0, key.1
                    )));
                }
            }
            undo.push(Undo::Logical(
                node.logical_id,
                self.current_by_logical.insert(node.logical_id, node.id),
            ));
            let prior = self.current_by_name.insert(key.clone(), node.logical_id);
            undo.push(Undo::Name(key, prior));
        }
        undo.push(Undo::Node(node.id, None));
        self.nodes.insert(node.id, node);
        Ok(())
    }

    fn close_node(
        &mut self,
        id: NodeId,
        at: DateTime<Utc>,
        undo: &mut Vec<Undo>,
    ) -> StorageResult<()> {
        let node = self
            .nodes
            .get_mut(&id)
            .filter(|n| n.valid_to.is_none())
            .ok_or_else(|| StorageError::Conflict(format!("{} is not current", id)))?;
        undo.push(Undo::Node(id, Some(node.clone())));
        node.valid_to = Some(at);
        let logical_id = node.logical_id;
        let key = Self::name_key(node);

        undo.push(Undo::Logical(logical_id, self.current_by_logical.remove(&logical_id)));
        if self.current_by_name.get(&key) == Some(&logical_id) {
            let prior = self.current_by_name.remove(&key);
            undo.push(Undo::Name(key, prior));
        }
        Ok(())
    }

    fn require_current(&self, id: NodeId) -> StorageResult<()> {
        match self.nodes.get(&id) {
            Some(node) if node.valid_to.is_none() => Ok(()),
            _ => Err(StorageError::Conflict(format!("{} is not current", id))),
        }
    }

    fn require_detached(&self, id: NodeId) -> StorageResult<()> {
        let live = self
            .adjacency
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|rel_id| self.relationships.get(rel_id))
            .find(|rel| rel.valid_to.is_none());
        match live {
            Some(rel) => Err(StorageError::Conflict(format!("{} still touches {}", rel.id, id))),
            None => Ok(()),
        }
    }

    fn insert_relationship(
        &mut self,
        rel: Relationship,
        undo: &mut Vec<Undo>,
    ) -> StorageResult<()> {
        if self.relationships.contains_key(&rel.id) {
            return Err(StorageError::Conflict(format!("{} already exists", rel.id)));
        }
        for end in [rel.source_id, rel.target_id] {
            if self.adjacency.entry(end).or_default().insert(rel.id) {
                undo.push(Undo::Adjacency(end, rel.id));
            }
        }
        undo.push(Undo::Relationship(rel.id, None));
        self.relationships.insert(rel.id, rel);
        Ok(())
    }

    fn close_relationship(
        &mut self,
        id: RelationshipId,
        at: DateTime<Utc>,
        undo: &mut Vec<Undo>,
    ) -> StorageResult<()> {
        let rel = self
            .relationships
            .get_mut(&id)
            .filter(|r| r.valid_to.is_none())
            .ok_or_else(|| StorageError::Conflict(format!("{} is not current", id)))?;
        undo.push(Undo::Relationship(id, Some(rel.clone())));
        rel.valid_to = Some(at);
        Ok(())
    }

    fn apply(&mut self, mutation: Mutation, undo: &mut Vec<Undo>) -> StorageResult<()> {
        match mutation {
            Mutation::InsertNode(node) => self.insert_node(node, undo),
            Mutation::CloseNode { id, at } => self.close_node(id, at, undo),
            Mutation::RequireCurrentNode(id) => self.require_current(id),
            Mutation::RequireNoCurrentEdges(id) => self.require_detached(id),
            Mutation::InsertRelationship(rel) => self.insert_relationship(rel, undo),
            Mutation::CloseRelationship { id, at } => self.close_relationship(id, at, undo),
        }
    }

    fn rollback(&mut self, undo: Vec<Undo>) {
        for step in undo.into_iter().rev() {
            match step {
                Undo::Node(id, Some(node)) => {
                    self.nodes.insert(id, node);
                }
                Undo::Node(id, None) => {
                    self.nodes.remove(&id);
                }
                Undo::Logical(key, Some(id)) => {
                    self.current_by_logical.insert(key, id);
                }
                Undo::Logical(key, None) => {
                    self.current_by_logical.remove(&key);
                }
                Undo::Name(key, Some(logical_id)) => {
                    self.current_by_name.insert(key, logical_id);
                }
                Undo::Name(key, None) => {
                    self.current_by_name.remove(&key);
                }
                Undo::Relationship(id, Some(rel)) => {
                    self.relationships.insert(id, rel);
                }
                Undo::Relationship(id, None) => {
                    self.relationships.remove(&id);
                }
                Undo::Adjacency(node_id, rel_id) => {
                    if let Some(set) = self.adjacency.get_mut(&node_id) {
                        set.remove(&rel_id);
                        if set.is_empty() {
                            self.adjacency.remove(&node_id);
                        }
                    }
                }
            }
        }
    }
}

/// In-memory graph backend. All state sits behind one async lock so a batch
/// is applied without interleaving.
#[derive(Default)]
pub struct InMemoryGraphBackend {
    state: RwLock<GraphState>,
}

impl InMemoryGraphBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphBackend for InMemoryGraphBackend {
    async fn node(&self, id: &NodeId) -> StorageResult<Option<Node>> {
        Ok(self.state.read().await.nodes.get(id).cloned())
    }

    async fn nodes(&self, query: &NodeQuery) -> StorageResult<Vec<Node>> {
        let state = self.state.read().await;
        let mut rows: Vec<Node> = match &query.ids {
            Some(ids) => ids
                .iter()
                .filter_map(|id| state.nodes.get(id))
                .filter(|n| query.matches(n))
                .cloned()
                .collect(),
            None => state.nodes.values().filter(|n| query.matches(n)).cloned().collect(),
        };
        drop(state);

        rows.sort_by(NodeQuery::ordering);
        rows.dedup_by_key(|n| n.id);
        Ok(match query.window {
            Some(window) => window.apply(rows),
            None => rows,
        })
    }

    async fn count_nodes(&self, query: &NodeQuery) -> StorageResult<usize> {
        let state = self.state.read().await;
        Ok(state.nodes.values().filter(|n| query.matches(n)).count())
    }

    async fn relationship(&self, id: &RelationshipId) -> StorageResult<Option<Relationship>> {
        Ok(self.state.read().await.relationships.get(id).cloned())
    }

    async fn relationships(&self, query: &RelationshipQuery) -> StorageResult<Vec<Relationship>> {
        let state = self.state.read().await;
        let mut rows: Vec<Relationship> = match &query.touching {
            Some(node_ids) => {
                let candidates: HashSet<RelationshipId> = node_ids
                    .iter()
                    .filter_map(|id| state.adjacency.get(id))
                    .flatten()
                    .copied()
                    .collect();
                candidates
                    .iter()
                    .filter_map(|id| state.relationships.get(id))
                    .filter(|r| query.matches(r))
                    .cloned()
                    .collect()
            }
            None => state
                .relationships
                .values()
                .filter(|r| query.matches(r))
                .cloned()
                .collect(),
        };
        rows.sort_by(RelationshipQuery::ordering);
        Ok(rows)
    }

    async fn apply(&self, batch: WriteBatch) -> StorageResult<()> {
        let steps = batch.len();
        let mut state = self.state.write().await;
        let mut undo = Vec::new();
        for mutation in batch.into_mutations() {
            if let Err(err) = state.apply(mutation, &mut undo) {
                state.rollback(undo);
                tracing::debug!(error = %err, steps, "write batch rejected");
                return Err(err);
            }
        }
        tracing::trace!(steps, "write batch applied");
        Ok(())
    }
}
