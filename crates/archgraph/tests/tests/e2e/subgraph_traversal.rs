//! End-to-end test: bounded traversal over a small capability map.

use crate::common::{process_step, Fixture};
use archgraph_engine::{EngineConfig, GraphError};
use archgraph_types::RelationshipType;
use serde_json::json;

#[tokio::test]
async fn closure_keeps_edges_between_reached_nodes() {
    let fx = Fixture::new();
    let root = fx.named("process", "Order to Cash").await;
    let x = fx.create("process_step", process_step("Capture", 1)).await;
    let y = fx.create("process_step", process_step("Invoice", 2)).await;
    let z = fx.create("process_step", process_step("Collect", 3)).await;
    let beyond = fx.named("process", "Dunning").await;

    fx.link(RelationshipType::Composes, &root, &x).await;
    fx.link(RelationshipType::Composes, &root, &y).await;
    fx.link(RelationshipType::FlowsTo, &x, &z).await;
    // Cross edge between two nodes reached by separate paths.
    fx.link(RelationshipType::FlowsTo, &y, &z).await;
    fx.link(RelationshipType::Triggers, &z, &beyond).await;

    let sub = fx.graph.traversal().traverse_subgraph(root.id, 2, None).await.unwrap();
    assert_eq!(sub.nodes.len(), 4);
    assert_eq!(sub.nodes[0].id, root.id);
    assert_eq!(sub.relationships.len(), 4);
    assert!(!sub.contains_node(beyond.id));

    let deeper = fx.graph.traversal().traverse_subgraph(root.id, 3, None).await.unwrap();
    assert_eq!(deeper.nodes.len(), 5);
    assert_eq!(deeper.relationships.len(), 5);
}

#[tokio::test]
async fn depth_zero_is_the_root_alone() {
    let fx = Fixture::new();
    let a = fx.named("capability", "A").await;
    let b = fx.named("capability", "B").await;
    fx.link(RelationshipType::Composes, &a, &b).await;

    let sub = fx.graph.traversal().traverse_subgraph(a.id, 0, None).await.unwrap();
    assert_eq!(sub.nodes.len(), 1);
    assert!(sub.relationships.is_empty());
}

#[tokio::test]
async fn depth_is_bounded_by_configuration() {
    let mut config = EngineConfig::default();
    config.traversal.max_depth = 3;
    let fx = Fixture::with_config(config);
    let a = fx.named("capability", "A").await;

    assert!(fx.graph.traversal().traverse_subgraph(a.id, 3, None).await.is_ok());
    assert!(matches!(
        fx.graph.traversal().traverse_subgraph(a.id, 4, None).await,
        Err(GraphError::Validation(_))
    ));
}

#[tokio::test]
async fn traversal_from_a_superseded_version() {
    let fx = Fixture::new();
    let a = fx.named("capability", "A").await;
    let b = fx.named("capability", "B").await;
    fx.link(RelationshipType::Composes, &a, &b).await;
    let before = fx.tick(10);
    fx.tick(10);
    let a2 = fx.graph.nodes().update(a.id, &json!({ "owner": "Finance" })).await.unwrap();

    assert!(fx
        .graph
        .traversal()
        .traverse_subgraph(a.id, 1, None)
        .await
        .unwrap_err()
        .is_not_found());

    let then = fx.graph.traversal().traverse_subgraph(a.id, 1, Some(before)).await.unwrap();
    assert_eq!(then.nodes.len(), 2);
    assert_eq!(then.relationships.len(), 1);

    let now = fx.graph.traversal().traverse_subgraph(a2.id, 1, None).await.unwrap();
    assert_eq!(now.relationships[0].source_id, a2.id);
}
