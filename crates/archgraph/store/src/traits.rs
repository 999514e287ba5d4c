use crate::batch::WriteBatch;
use crate::query::{NodeQuery, RelationshipQuery};
use crate::StorageResult;
use archgraph_types::{Node, NodeId, Relationship, RelationshipId};
use async_trait::async_trait;

/// Pluggable storage backend for the knowledge graph.
///
/// Rows are never deleted: closing a row sets its `valid_to`. Reads are
/// read-committed snapshots; writes go through [`GraphBackend::apply`].
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Any version of a node, by exact id.
    async fn node(&self, id: &NodeId) -> StorageResult<Option<Node>>;

    /// Nodes matching `query`, ordered by name, then version descending, then id.
    async fn nodes(&self, query: &NodeQuery) -> StorageResult<Vec<Node>>;

    /// Number of nodes matching `query`, ignoring its window.
    async fn count_nodes(&self, query: &NodeQuery) -> StorageResult<usize>;

    /// Any version of a relationship, by exact id.
    async fn relationship(&self, id: &RelationshipId) -> StorageResult<Option<Relationship>>;

    /// Relationships matching `query`, ordered by `valid_from`, then id.
    async fn relationships(&self, query: &RelationshipQuery) -> StorageResult<Vec<Relationship>>;

    /// Apply every mutation in `batch` atomically.
    ///
    /// Fails with `StorageError::Conflict` and applies nothing when any
    /// precondition does not hold at apply time.
    async fn apply(&self, batch: WriteBatch) -> StorageResult<()>;
}
