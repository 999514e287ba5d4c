//! Advisory rule registry.
//!
//! Rules are plain data so a deployment can replace the registry from
//! configuration without touching the evaluator.

use archgraph_types::{Direction, NodeType, RelationshipType, SpecKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How loudly a finding is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a current node must look like to pass a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    /// The node has no current relationships at all.
    NoRelationships,
    /// The node lacks a current `rel_type` edge in `direction` whose far end
    /// matches the counterpart filters. Empty filters match anything.
    MissingRelationship {
        rel_type: RelationshipType,
        direction: Direction,
        #[serde(default)]
        counterpart_types: Vec<NodeType>,
        #[serde(default)]
        counterpart_spec_kinds: Vec<SpecKind>,
    },
    /// The node has not been modified for `after_days` days.
    Stale { after_days: i64 },
    /// The attribute `field` is absent or blank.
    MissingText { field: String },
}

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub severity: Severity,
    pub description: String,
    /// Node types the rule inspects; empty means every type.
    #[serde(default)]
    pub applies_to: Vec<NodeType>,
    pub condition: RuleCondition,
}

impl RuleDefinition {
    pub fn new(
        id: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        applies_to: impl IntoIterator<Item = NodeType>,
        condition: RuleCondition,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            description: description.into(),
            applies_to: applies_to.into_iter().collect(),
            condition,
        }
    }

    pub fn applies(&self, node_type: NodeType) -> bool {
        self.applies_to.is_empty() || self.applies_to.contains(&node_type)
    }
}

pub const ORPHAN_RULE: &str = "orphan";

/// Nodes with no current relationships, of any type.
pub fn orphan_rule() -> RuleDefinition {
    RuleDefinition::new(
        ORPHAN_RULE,
        Severity::Warning,
        "Node has no relationships",
        Vec::<NodeType>::new(),
        RuleCondition::NoRelationships,
    )
}

/// The reference registry.
pub fn builtin_rules(stale_after_days: i64) -> Vec<RuleDefinition> {
    use NodeType::*;

    vec![
        orphan_rule(),
        RuleDefinition::new(
            "api-missing-spec",
            Severity::Warning,
            "API has no attached OpenAPI, AsyncAPI or GraphQL specification",
            [Api],
            RuleCondition::MissingRelationship {
                rel_type: RelationshipType::SpecifiedBy,
                direction: Direction::Out,
                counterpart_types: vec![SpecDocument],
                counterpart_spec_kinds: vec![
                    SpecKind::Openapi,
                    SpecKind::Asyncapi,
                    SpecKind::GraphqlSchema,
                ],
            },
        ),
        RuleDefinition::new(
            "capability-without-service",
            Severity::Warning,
            "Capability is not realized by any service",
            [Capability],
            RuleCondition::MissingRelationship {
                rel_type: RelationshipType::Realizes,
                direction: Direction::In,
                counterpart_types: vec![Service],
                counterpart_spec_kinds: Vec::new(),
            },
        ),
        RuleDefinition::new(
            "service-without-application",
            Severity::Warning,
            "Service is not realized by any application",
            [Service],
            RuleCondition::MissingRelationship {
                rel_type: RelationshipType::Realizes,
                direction: Direction::In,
                counterpart_types: vec![Application, ApplicationComponent],
                counterpart_spec_kinds: Vec::new(),
            },
        ),
        RuleDefinition::new(
            "process-without-steps",
            Severity::Warning,
            "Process has no steps",
            [Process],
            RuleCondition::MissingRelationship {
                rel_type: RelationshipType::Composes,
                direction: Direction::Out,
                counterpart_types: vec![ProcessStep],
                counterpart_spec_kinds: Vec::new(),
            },
        ),
        RuleDefinition::new(
            "data-entity-without-model",
            Severity::Warning,
            "Data entity has no attached data model or ERD",
            [DataEntity],
            RuleCondition::MissingRelationship {
                rel_type: RelationshipType::SpecifiedBy,
                direction: Direction::Out,
                counterpart_types: vec![SpecDocument],
                counterpart_spec_kinds: vec![SpecKind::DataModel, SpecKind::Erd],
            },
        ),
        RuleDefinition::new(
            "stale",
            Severity::Info,
            "Node has not been modified recently",
            Vec::<NodeType>::new(),
            RuleCondition::Stale {
                after_days: stale_after_days,
            },
        ),
        RuleDefinition::new(
            "missing-acceptance-criteria",
            Severity::Warning,
            "Node has no acceptance criteria",
            [Capability, Service, Application],
            RuleCondition::MissingText {
                field: "acceptance_criteria".into(),
            },
        ),
    ]
}
