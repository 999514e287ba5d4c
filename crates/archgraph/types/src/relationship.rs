use crate::error::SchemaError;
use crate::ids::{NodeId, RelationshipId};
use crate::temporal::Versioned;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of relationship types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Composes,
    Realizes,
    Serves,
    Accesses,
    FlowsTo,
    Triggers,
    DependsOn,
    SpecifiedBy,
    TestedBy,
    ImplementedBy,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 10] = [
        RelationshipType::Composes,
        RelationshipType::Realizes,
        RelationshipType::Serves,
        RelationshipType::Accesses,
        RelationshipType::FlowsTo,
        RelationshipType::Triggers,
        RelationshipType::DependsOn,
        RelationshipType::SpecifiedBy,
        RelationshipType::TestedBy,
        RelationshipType::ImplementedBy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Composes => "COMPOSES",
            Self::Realizes => "REALIZES",
            Self::Serves => "SERVES",
            Self::Accesses => "ACCESSES",
            Self::FlowsTo => "FLOWS_TO",
            Self::Triggers => "TRIGGERS",
            Self::DependsOn => "DEPENDS_ON",
            Self::SpecifiedBy => "SPECIFIED_BY",
            Self::TestedBy => "TESTED_BY",
            Self::ImplementedBy => "IMPLEMENTED_BY",
        }
    }

    /// Types that may attach any non-spec node to a spec document.
    pub fn attaches_spec(&self) -> bool {
        matches!(self, Self::SpecifiedBy | Self::TestedBy | Self::ImplementedBy)
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = SchemaError;

    /// Case-insensitive; `-` and ` ` are treated as `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| SchemaError::UnknownRelationshipType(s.to_string()))
    }
}

/// Access mode carried by `ACCESSES` edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Read,
    Write,
    ReadWrite,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "read_write",
        }
    }
}

impl FromStr for AccessType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "read_write" | "readwrite" | "read-write" => Ok(Self::ReadWrite),
            other => Err(SchemaError::malformed(
                "access_type",
                format!("unknown access type {other}"),
            )),
        }
    }
}

/// Direction of edges relative to a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
    #[default]
    Both,
}

impl Direction {
    pub fn includes_out(&self) -> bool {
        matches!(self, Self::Out | Self::Both)
    }

    pub fn includes_in(&self) -> bool {
        matches!(self, Self::In | Self::Both)
    }
}

/// Non-identity, non-temporal properties of a relationship.
///
/// Migration copies these verbatim onto the replacement edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipProps {
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Meaningful for `ACCESSES`; accepted on any type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_type: Option<AccessType>,
}

impl Default for RelationshipProps {
    fn default() -> Self {
        Self {
            created_by: crate::node::DEFAULT_AUTHOR.to_string(),
            notes: None,
            access_type: None,
        }
    }
}

impl RelationshipProps {
    pub fn by(created_by: impl Into<String>) -> Self {
        Self {
            created_by: created_by.into(),
            ..Self::default()
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_access(mut self, access_type: AccessType) -> Self {
        self.access_type = Some(access_type);
        self
    }
}

/// One version of a directed, typed edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub rel_type: RelationshipType,
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub props: RelationshipProps,
}

impl Relationship {
    pub fn new(
        rel_type: RelationshipType,
        source_id: NodeId,
        target_id: NodeId,
        props: RelationshipProps,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RelationshipId::new(),
            rel_type,
            source_id,
            target_id,
            valid_from: now,
            valid_to: None,
            props,
        }
    }

    /// A current copy of this edge with endpoints re-pointed from `old` to `new`.
    /// Both endpoints move when the edge is a self-loop.
    pub fn repointed(&self, old: NodeId, new: NodeId, now: DateTime<Utc>) -> Self {
        let swap = |id: NodeId| if id == old { new } else { id };
        Self::new(
            self.rel_type,
            swap(self.source_id),
            swap(self.target_id),
            self.props.clone(),
            now,
        )
    }

    pub fn touches(&self, node_id: NodeId) -> bool {
        self.source_id == node_id || self.target_id == node_id
    }

    /// The endpoint opposite `node_id`; `node_id` itself for a self-loop.
    pub fn other_end(&self, node_id: NodeId) -> NodeId {
        if self.source_id == node_id {
            self.target_id
        } else {
            self.source_id
        }
    }

    /// Whether this edge touches `node_id` in `direction`.
    pub fn matches_direction(&self, node_id: NodeId, direction: Direction) -> bool {
        (direction.includes_out() && self.source_id == node_id)
            || (direction.includes_in() && self.target_id == node_id)
    }
}

impl Versioned for Relationship {
    fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.valid_to
    }
}
