//! Advisory structural validation.
//!
//! Findings never block a write. Each registry rule is evaluated on its own
//! and a rule whose reads fail is skipped, so one broken rule cannot hide the
//! findings of the others. Every full run also re-checks current
//! relationships against the [`RelationshipMatrix`](archgraph_types::RelationshipMatrix).

mod rules;

pub use rules::{builtin_rules, orphan_rule, RuleCondition, RuleDefinition, Severity, ORPHAN_RULE};

use crate::error::{GraphError, GraphResult};
use crate::graph::GraphContext;
use archgraph_store::{NodeQuery, RelationshipQuery};
use archgraph_types::{
    Direction, Node, NodeId, NodeType, Relationship, RelationshipId, RelationshipType, SpecKind,
};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MATRIX_RULE: &str = "matrix-conformance";
pub const DANGLING_RULE: &str = "dangling-relationship";

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub node_id: NodeId,
    pub node_name: String,
    /// Absent when the offending node could not be resolved.
    pub node_type: Option<NodeType>,
    /// Set by the relationship checks.
    pub relationship_id: Option<RelationshipId>,
}

impl Warning {
    fn for_node(rule: &RuleDefinition, node: &Node) -> Self {
        Self {
            rule_id: rule.id.clone(),
            severity: rule.severity,
            message: format!("{} '{}': {}", node.node_type(), node.name(), rule.description),
            node_id: node.id,
            node_name: node.name().to_string(),
            node_type: Some(node.node_type()),
            relationship_id: None,
        }
    }
}

/// Validation Engine.
#[derive(Clone)]
pub struct ValidationEngine {
    ctx: Arc<GraphContext>,
}

impl ValidationEngine {
    pub(crate) fn new(ctx: Arc<GraphContext>) -> Self {
        Self { ctx }
    }

    /// The active registry: configured rules when present, else the built-ins.
    pub fn rules(&self) -> Vec<RuleDefinition> {
        let validation = &self.ctx.config.validation;
        match &validation.rules {
            Some(rules) => rules.clone(),
            None => builtin_rules(validation.stale_after_days),
        }
    }

    /// Run the selected rules (all when `rule_ids` is `None`) plus the
    /// relationship conformance pass.
    pub async fn run_all(&self, rule_ids: Option<&[String]>) -> Vec<Warning> {
        let registry = self.rules();
        let selected: Vec<&RuleDefinition> = match rule_ids {
            None => registry.iter().collect(),
            Some(ids) => {
                for unknown in ids.iter().filter(|id| !registry.iter().any(|r| &r.id == *id)) {
                    warn!(rule_id = %unknown, "unknown validation rule ignored");
                }
                registry.iter().filter(|r| ids.contains(&r.id)).collect()
            }
        };

        let now = self.ctx.clock.now();
        let outcomes = join_all(selected.iter().map(|rule| self.evaluate(rule, now))).await;

        let mut warnings = Vec::new();
        for (rule, outcome) in selected.iter().zip(outcomes) {
            match outcome {
                Ok(found) => {
                    debug!(rule_id = %rule.id, findings = found.len(), "rule evaluated");
                    warnings.extend(found);
                }
                Err(err) => warn!(rule_id = %rule.id, error = %err, "validation rule skipped"),
            }
        }

        match self.check_relationships().await {
            Ok(found) => warnings.extend(found),
            Err(err) => warn!(
                rule_id = MATRIX_RULE,
                error = %err,
                "relationship conformance skipped"
            ),
        }

        info!(
            rules = selected.len(),
            warnings = warnings.len(),
            "validation run complete"
        );
        warnings
    }

    /// Cheap check for a single current node: orphan status only.
    pub async fn run_for_node(&self, id: NodeId) -> GraphResult<Vec<Warning>> {
        let node = self
            .ctx
            .backend
            .node(&id)
            .await?
            .filter(|n| n.valid_to.is_none())
            .ok_or_else(|| GraphError::not_found("node", id))?;

        let rule = self
            .rules()
            .into_iter()
            .find(|r| r.id == ORPHAN_RULE)
            .unwrap_or_else(orphan_rule);

        let edges = self
            .ctx
            .backend
            .relationships(&RelationshipQuery::current().touching([id], Direction::Both))
            .await?;
        Ok(if edges.is_empty() {
            vec![Warning::for_node(&rule, &node)]
        } else {
            Vec::new()
        })
    }

    async fn evaluate(
        &self,
        rule: &RuleDefinition,
        now: DateTime<Utc>,
    ) -> GraphResult<Vec<Warning>> {
        let mut query = NodeQuery::current();
        if !rule.applies_to.is_empty() {
            query = query.with_types(rule.applies_to.iter().copied());
        }
        let candidates = self.ctx.backend.nodes(&query).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let offending: Vec<&Node> = match &rule.condition {
            RuleCondition::NoRelationships => {
                let edges = self.current_edges(&candidates, Direction::Both, None).await?;
                let touched: HashSet<NodeId> =
                    edges.iter().flat_map(|r| [r.source_id, r.target_id]).collect();
                candidates.iter().filter(|n| !touched.contains(&n.id)).collect()
            }
            RuleCondition::MissingRelationship {
                rel_type,
                direction,
                counterpart_types,
                counterpart_spec_kinds,
            } => {
                let edges = self.current_edges(&candidates, *direction, Some(*rel_type)).await?;
                let far_ids: HashSet<NodeId> =
                    edges.iter().flat_map(|r| [r.source_id, r.target_id]).collect();
                let far: HashMap<NodeId, Node> = self
                    .ctx
                    .backend
                    .nodes(&NodeQuery::current().with_ids(far_ids))
                    .await?
                    .into_iter()
                    .map(|n| (n.id, n))
                    .collect();

                let candidate_ids: HashSet<NodeId> = candidates.iter().map(|n| n.id).collect();
                let mut satisfied = HashSet::new();
                for rel in &edges {
                    let ends = [(rel.source_id, rel.target_id), (rel.target_id, rel.source_id)];
                    for (near, other) in ends {
                        let counterpart_ok = far.get(&other).is_some_and(|n| {
                            counterpart_matches(n, counterpart_types, counterpart_spec_kinds)
                        });
                        if candidate_ids.contains(&near)
                            && rel.matches_direction(near, *direction)
                            && counterpart_ok
                        {
                            satisfied.insert(near);
                        }
                    }
                }
                candidates.iter().filter(|n| !satisfied.contains(&n.id)).collect()
            }
            RuleCondition::Stale { after_days } => {
                let Some(cutoff) =
                    Duration::try_days(*after_days).and_then(|d| now.checked_sub_signed(d))
                else {
                    return Ok(Vec::new());
                };
                candidates.iter().filter(|n| n.updated_at < cutoff).collect()
            }
            RuleCondition::MissingText { field } => candidates
                .iter()
                .filter(|n| is_blank(n.attributes.to_json().get(field)))
                .collect(),
        };

        Ok(offending.into_iter().map(|n| Warning::for_node(rule, n)).collect())
    }

    async fn current_edges(
        &self,
        nodes: &[Node],
        direction: Direction,
        rel_type: Option<RelationshipType>,
    ) -> GraphResult<Vec<Relationship>> {
        let mut query =
            RelationshipQuery::current().touching(nodes.iter().map(|n| n.id), direction);
        if let Some(rel_type) = rel_type {
            query = query.with_types([rel_type]);
        }
        Ok(self.ctx.backend.relationships(&query).await?)
    }

    /// Re-check every current relationship against the matrix and flag any
    /// whose endpoints are no longer current nodes.
    async fn check_relationships(&self) -> GraphResult<Vec<Warning>> {
        let edges = self.ctx.backend.relationships(&RelationshipQuery::current()).await?;
        let endpoint_ids: HashSet<NodeId> =
            edges.iter().flat_map(|r| [r.source_id, r.target_id]).collect();
        let endpoints: HashMap<NodeId, Node> = self
            .ctx
            .backend
            .nodes(&NodeQuery::current().with_ids(endpoint_ids))
            .await?
            .into_iter()
            .map(|n| (n.id, n))
            .collect();

        let mut warnings = Vec::new();
        for rel in &edges {
            let ends = (endpoints.get(&rel.source_id), endpoints.get(&rel.target_id));
            let (source, target) = match ends {
                (Some(source), Some(target)) => (source, target),
                (source, _) => {
                    let missing = if source.is_none() { rel.source_id } else { rel.target_id };
                    warnings.push(Warning {
                        rule_id: DANGLING_RULE.into(),
                        severity: Severity::Error,
                        message: format!(
                            "{} {} points at {missing}, which is not a current node",
                            rel.rel_type, rel.id
                        ),
                        node_id: missing,
                        node_name: String::new(),
                        node_type: None,
                        relationship_id: Some(rel.id),
                    });
                    continue;
                }
            };

            if !self.ctx.matrix.allows(rel.rel_type, source.node_type(), target.node_type()) {
                warnings.push(Warning {
                    rule_id: MATRIX_RULE.into(),
                    severity: Severity::Error,
                    message: format!(
                        "{} from {} '{}' to {} '{}' is not an allowed relationship",
                        rel.rel_type,
                        source.node_type(),
                        source.name(),
                        target.node_type(),
                        target.name()
                    ),
                    node_id: source.id,
                    node_name: source.name().to_string(),
                    node_type: Some(source.node_type()),
                    relationship_id: Some(rel.id),
                });
            }
        }
        debug!(
            relationships = edges.len(),
            findings = warnings.len(),
            "relationship conformance checked"
        );
        Ok(warnings)
    }
}

fn counterpart_matches(node: &Node, types: &[NodeType], spec_kinds: &[SpecKind]) -> bool {
    if !types.is_empty() && !types.contains(&node.node_type()) {
        return false;
    }
    spec_kinds.is_empty()
        || node
            .attributes
            .kind
            .spec_kind()
            .is_some_and(|kind| spec_kinds.contains(&kind))
}

fn is_blank(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}
