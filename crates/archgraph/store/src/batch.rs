use archgraph_types::{Node, NodeId, Relationship, RelationshipId};
use chrono::{DateTime, Utc};

/// One step of a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert a new row. A current row conflicts with any other current row
    /// of the same logical id, or of the same (type, name) under another
    /// logical id.
    InsertNode(Node),
    /// Close a node row. Precondition: the row is current.
    CloseNode { id: NodeId, at: DateTime<Utc> },
    /// Precondition only: the node row is current.
    RequireCurrentNode(NodeId),
    /// Precondition only: no current relationship touches the node row.
    RequireNoCurrentEdges(NodeId),
    InsertRelationship(Relationship),
    /// Close a relationship row. Precondition: the row is current.
    CloseRelationship { id: RelationshipId, at: DateTime<Utc> },
}

/// Ordered mutations applied all-or-nothing.
///
/// Preconditions are evaluated in order against the state produced by the
/// mutations before them, so `CloseNode(a)` followed by an insert of `a`'s
/// successor is valid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    mutations: Vec<Mutation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) -> &mut Self {
        self.mutations.push(mutation);
        self
    }

    pub fn insert_node(&mut self, node: Node) -> &mut Self {
        self.push(Mutation::InsertNode(node))
    }

    pub fn close_node(&mut self, id: NodeId, at: DateTime<Utc>) -> &mut Self {
        self.push(Mutation::CloseNode { id, at })
    }

    pub fn require_current(&mut self, id: NodeId) -> &mut Self {
        self.push(Mutation::RequireCurrentNode(id))
    }

    /// Fail the batch if any current relationship still touches `id` once
    /// the mutations before this one have applied.
    pub fn require_detached(&mut self, id: NodeId) -> &mut Self {
        self.push(Mutation::RequireNoCurrentEdges(id))
    }

    pub fn insert_relationship(&mut self, rel: Relationship) -> &mut Self {
        self.push(Mutation::InsertRelationship(rel))
    }

    pub fn close_relationship(&mut self, id: RelationshipId, at: DateTime<Utc>) -> &mut Self {
        self.push(Mutation::CloseRelationship { id, at })
    }

    pub fn extend(&mut self, other: WriteBatch) -> &mut Self {
        self.mutations.extend(other.mutations);
        self
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter()
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}
