//! The allowed-relationship matrix.
//!
//! A static table from relationship type to the `(source, target)` node type
//! pairs it may connect. It is consulted when an edge is written and again by
//! the validator to detect edges that drifted out of conformance.

use crate::node::NodeType;
use crate::relationship::RelationshipType;
use std::collections::{HashMap, HashSet};

use NodeType::*;

const COMPOSES: &[(NodeType, NodeType)] = &[
    (Capability, Capability),
    (Process, ProcessStep),
    (Application, ApplicationComponent),
];

const REALIZES: &[(NodeType, NodeType)] = &[
    (Service, Capability),
    (Process, Capability),
    (Application, Service),
    (ApplicationComponent, Service),
    (Api, Service),
];

const SERVES: &[(NodeType, NodeType)] = &[
    (Service, Process),
    (Service, ProcessStep),
    (Api, Application),
    (Api, ApplicationComponent),
];

const ACCESSES: &[(NodeType, NodeType)] = &[
    (Application, DataEntity),
    (ApplicationComponent, DataEntity),
    (Api, DataEntity),
    (ProcessStep, DataEntity),
];

const FLOWS_TO: &[(NodeType, NodeType)] = &[
    (ProcessStep, ProcessStep),
    (Process, Process),
    (DataEntity, DataEntity),
];

const TRIGGERS: &[(NodeType, NodeType)] = &[
    (ProcessStep, ProcessStep),
    (ProcessStep, Process),
    (Process, Process),
];

const DEPENDS_ON: &[(NodeType, NodeType)] = &[
    (Service, Service),
    (Application, Application),
    (Application, Api),
    (ApplicationComponent, ApplicationComponent),
    (ApplicationComponent, Api),
];

/// Lookup table of well-formed `(type, source, target)` triples.
#[derive(Clone, Debug)]
pub struct RelationshipMatrix {
    allowed: HashMap<RelationshipType, HashSet<(NodeType, NodeType)>>,
}

impl RelationshipMatrix {
    /// The reference enterprise-architecture matrix.
    pub fn standard() -> Self {
        let mut allowed: HashMap<RelationshipType, HashSet<(NodeType, NodeType)>> = HashMap::new();
        let narrow = [
            (RelationshipType::Composes, COMPOSES),
            (RelationshipType::Realizes, REALIZES),
            (RelationshipType::Serves, SERVES),
            (RelationshipType::Accesses, ACCESSES),
            (RelationshipType::FlowsTo, FLOWS_TO),
            (RelationshipType::Triggers, TRIGGERS),
            (RelationshipType::DependsOn, DEPENDS_ON),
        ];
        for (rel_type, pairs) in narrow {
            allowed.insert(rel_type, pairs.iter().copied().collect());
        }

        // Attach-anything types: any non-spec node onto a spec document.
        for rel_type in RelationshipType::ALL.into_iter().filter(RelationshipType::attaches_spec) {
            let pairs = NodeType::ALL
                .into_iter()
                .filter(|t| !t.is_spec())
                .map(|source| (source, SpecDocument))
                .collect();
            allowed.insert(rel_type, pairs);
        }

        Self { allowed }
    }

    /// A matrix holding exactly `triples`.
    pub fn from_triples(
        triples: impl IntoIterator<Item = (RelationshipType, NodeType, NodeType)>,
    ) -> Self {
        let mut allowed: HashMap<RelationshipType, HashSet<(NodeType, NodeType)>> = HashMap::new();
        for (rel_type, source, target) in triples {
            allowed.entry(rel_type).or_default().insert((source, target));
        }
        Self { allowed }
    }

    pub fn allows(&self, rel_type: RelationshipType, source: NodeType, target: NodeType) -> bool {
        self.allowed
            .get(&rel_type)
            .is_some_and(|pairs| pairs.contains(&(source, target)))
    }

    /// Allowed `(source, target)` pairs for one relationship type, sorted.
    pub fn pairs(&self, rel_type: RelationshipType) -> Vec<(NodeType, NodeType)> {
        let mut pairs: Vec<_> = self
            .allowed
            .get(&rel_type)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default();
        pairs.sort();
        pairs
    }

    /// Relationship types that may connect `source` to `target`.
    pub fn types_between(&self, source: NodeType, target: NodeType) -> Vec<RelationshipType> {
        RelationshipType::ALL
            .into_iter()
            .filter(|t| self.allows(*t, source, target))
            .collect()
    }

    /// Number of allowed triples.
    pub fn len(&self) -> usize {
        self.allowed.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RelationshipMatrix {
    fn default() -> Self {
        Self::standard()
    }
}
