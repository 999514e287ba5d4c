use archgraph_types::{
    Direction, Layer, LogicalId, Node, NodeId, NodeStatus, NodeType, Relationship, RelationshipId,
    RelationshipType, Temporal, Versioned,
};
use std::cmp::Ordering;

/// Generic query window for paged reads. A `limit` of 0 means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        if self.limit == 0 {
            iter.collect()
        } else {
            iter.take(self.limit).collect()
        }
    }
}

/// Node selection. Every populated field narrows the result.
///
/// `scope: None` selects every version; otherwise only rows admitted by the
/// temporal predicate. The temporal predicate is always evaluated first.
#[derive(Debug, Clone, Default)]
pub struct NodeQuery {
    pub ids: Option<Vec<NodeId>>,
    pub logical_id: Option<LogicalId>,
    pub node_types: Option<Vec<NodeType>>,
    /// Exact name match.
    pub name: Option<String>,
    pub layer: Option<Layer>,
    pub status: Option<NodeStatus>,
    /// Matches nodes carrying at least one of these tags.
    pub tags_any: Vec<String>,
    /// Case-insensitive substring over name and description.
    pub search: Option<String>,
    pub scope: Option<Temporal>,
    pub window: Option<QueryWindow>,
}

impl NodeQuery {
    /// Every version of every node.
    pub fn all_versions() -> Self {
        Self::default()
    }

    pub fn current() -> Self {
        Self::scoped(Temporal::Current)
    }

    pub fn scoped(scope: Temporal) -> Self {
        Self {
            scope: Some(scope),
            ..Self::default()
        }
    }

    pub fn with_ids(mut self, ids: impl IntoIterator<Item = NodeId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn with_logical_id(mut self, logical_id: LogicalId) -> Self {
        self.logical_id = Some(logical_id);
        self
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = NodeType>) -> Self {
        self.node_types = Some(types.into_iter().collect());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_window(mut self, window: QueryWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Evaluate every predicate except the window against one row.
    pub fn matches(&self, node: &Node) -> bool {
        if let Some(scope) = self.scope {
            if !node.is_active(scope) {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&node.id) {
                return false;
            }
        }
        if let Some(logical_id) = self.logical_id {
            if node.logical_id != logical_id {
                return false;
            }
        }
        if let Some(types) = &self.node_types {
            if !types.contains(&node.node_type()) {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if node.name() != name {
                return false;
            }
        }
        if let Some(layer) = self.layer {
            if node.layer() != layer {
                return false;
            }
        }
        if let Some(status) = self.status {
            if node.status() != status {
                return false;
            }
        }
        if !self.tags_any.is_empty() && !self.tags_any.iter().any(|t| node.tags().contains(t)) {
            return false;
        }
        if let Some(needle) = self.search.as_deref().map(str::to_lowercase) {
            if !needle.is_empty()
                && !node.name().to_lowercase().contains(&needle)
                && !node.description().to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }

    /// Canonical result ordering shared by every backend.
    pub fn ordering(a: &Node, b: &Node) -> Ordering {
        a.name()
            .cmp(b.name())
            .then_with(|| b.version.cmp(&a.version))
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Relationship selection.
#[derive(Debug, Clone, Default)]
pub struct RelationshipQuery {
    pub ids: Option<Vec<RelationshipId>>,
    /// Relationships touching any of these nodes, per `direction`.
    pub touching: Option<Vec<NodeId>>,
    pub direction: Direction,
    pub rel_types: Option<Vec<RelationshipType>>,
    pub scope: Option<Temporal>,
}

impl RelationshipQuery {
    pub fn current() -> Self {
        Self::scoped(Temporal::Current)
    }

    pub fn scoped(scope: Temporal) -> Self {
        Self {
            scope: Some(scope),
            ..Self::default()
        }
    }

    pub fn touching(mut self, ids: impl IntoIterator<Item = NodeId>, direction: Direction) -> Self {
        self.touching = Some(ids.into_iter().collect());
        self.direction = direction;
        self
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = RelationshipType>) -> Self {
        self.rel_types = Some(types.into_iter().collect());
        self
    }

    pub fn matches(&self, rel: &Relationship) -> bool {
        if let Some(scope) = self.scope {
            if !rel.is_active(scope) {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&rel.id) {
                return false;
            }
        }
        if let Some(touching) = &self.touching {
            if !touching
                .iter()
                .any(|id| rel.matches_direction(*id, self.direction))
            {
                return false;
            }
        }
        if let Some(types) = &self.rel_types {
            if !types.contains(&rel.rel_type) {
                return false;
            }
        }
        true
    }

    pub fn ordering(a: &Relationship, b: &Relationship) -> Ordering {
        a.valid_from.cmp(&b.valid_from).then_with(|| a.id.cmp(&b.id))
    }
}
