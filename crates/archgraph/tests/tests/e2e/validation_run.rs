//! End-to-end test: validation over a graph edited outside the engine.

use crate::common::{process_step, Fixture};
use archgraph_engine::{EngineConfig, KnowledgeGraph, Severity, Warning, MATRIX_RULE};
use archgraph_store::{GraphBackend, WriteBatch};
use archgraph_types::{Relationship, RelationshipProps, RelationshipType};
use serde_json::json;

#[tokio::test]
async fn backend_edits_surface_as_conformance_errors() {
    let fx = Fixture::new();
    let cap = fx.named("capability", "Ordering").await;
    let step = fx.create("process_step", process_step("Pick", 1)).await;

    // Bypass the relationship manager entirely.
    let rogue = Relationship::new(
        RelationshipType::Composes,
        cap.id,
        step.id,
        RelationshipProps::by("sql-console"),
        fx.graph.now(),
    );
    let mut batch = WriteBatch::new();
    batch.insert_relationship(rogue.clone());
    fx.backend.apply(batch).await.unwrap();

    let warnings = fx.graph.validator().run_all(None).await;
    let drift: Vec<_> = warnings.iter().filter(|w| w.rule_id == MATRIX_RULE).collect();
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].severity, Severity::Error);
    assert_eq!(drift[0].relationship_id, Some(rogue.id));
    assert!(drift[0].message.contains("COMPOSES"));

    // The rogue edge still counts as a relationship for the orphan rule.
    assert!(warnings.iter().all(|w| w.rule_id != "orphan"));
}

fn flagged(warnings: &[Warning]) -> bool {
    warnings
        .iter()
        .any(|w| w.rule_id == "api-missing-spec" && w.node_name == "Orders API")
}

#[tokio::test]
async fn findings_track_graph_changes() {
    let fx = Fixture::new();
    let api = fx
        .create("api", json!({ "name": "Orders API", "protocol": "rest" }))
        .await;
    assert!(flagged(&fx.graph.validator().run_all(None).await));

    let spec = fx
        .create(
            "spec_document",
            json!({ "name": "Orders API v1", "spec_kind": "asyncapi" }),
        )
        .await;
    fx.link(RelationshipType::SpecifiedBy, &api, &spec).await;
    let warnings = fx.graph.validator().run_all(None).await;
    assert!(!flagged(&warnings));
    assert_eq!(fx.graph.validator().run_all(None).await, warnings);
}

#[tokio::test]
async fn validator_reads_shared_backend() {
    let fx = Fixture::new();
    fx.named("process", "Returns").await;
    let other = KnowledgeGraph::new(fx.backend.clone(), EngineConfig::default());
    let warnings = other
        .validator()
        .run_all(Some(["process-without-steps".to_string()].as_slice()))
        .await;
    assert_eq!(warnings.len(), 1);
}
