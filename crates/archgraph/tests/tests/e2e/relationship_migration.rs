//! End-to-end test: copy-on-write updates carry every current edge forward.

use crate::common::Fixture;
use archgraph_types::{AccessType, Direction, RelationshipProps, RelationshipType};
use chrono::Duration;
use serde_json::json;

#[tokio::test]
async fn accesses_edge_follows_the_successor() {
    let fx = Fixture::new();
    let b = fx.named("application", "Ledger").await;
    let d = fx.named("data_entity", "Invoice").await;
    let original = fx
        .link_with(
            RelationshipType::Accesses,
            &b,
            &d,
            RelationshipProps::by("architect").with_access(AccessType::Read),
        )
        .await;

    let t_update = fx.tick(30);
    let b2 = fx
        .graph
        .nodes()
        .update(b.id, &json!({ "technology": "Rust" }))
        .await
        .unwrap();

    let just_before = t_update - Duration::seconds(1);
    let closed = fx.graph.relationships().get(original.id, Some(just_before)).await.unwrap();
    assert_eq!(closed.valid_to, Some(t_update));
    assert!(fx.graph.relationships().get(original.id, None).await.unwrap_err().is_not_found());

    let current = fx
        .graph
        .relationships()
        .list_for_node(b2.id, Direction::Out, None)
        .await
        .unwrap();
    assert_eq!(current.len(), 1);
    let moved = &current[0].relationship;
    assert_ne!(moved.id, original.id);
    assert_eq!(moved.source_id, b2.id);
    assert_eq!(moved.target_id, d.id);
    assert_eq!(moved.valid_from, t_update);
    assert!(moved.valid_to.is_none());
    assert_eq!(moved.props.access_type, Some(AccessType::Read));
    assert_eq!(moved.props.created_by, "architect");

    let d_now = fx.graph.nodes().get(d.id, None).await.unwrap();
    assert_eq!(d_now.id, d.id);
    assert_eq!(d_now.version, 1);
}

#[tokio::test]
async fn incoming_and_outgoing_edges_both_migrate() {
    let fx = Fixture::new();
    let svc = fx.named("service", "Payments").await;
    let cap = fx.named("capability", "Collect Payments").await;
    let app = fx.named("application", "PayHub").await;
    let dep = fx.named("service", "Fraud Scoring").await;
    fx.link(RelationshipType::Realizes, &svc, &cap).await;
    fx.link(RelationshipType::Realizes, &app, &svc).await;
    fx.link(RelationshipType::DependsOn, &svc, &dep).await;

    fx.tick(1);
    let svc2 = fx
        .graph
        .nodes()
        .update(svc.id, &json!({ "sla": "99.95%" }))
        .await
        .unwrap();

    let views = fx
        .graph
        .relationships()
        .list_for_node(svc2.id, Direction::Both, None)
        .await
        .unwrap();
    assert_eq!(views.len(), 3);
    assert_eq!(views.iter().filter(|v| v.relationship.source_id == svc2.id).count(), 2);
    assert_eq!(views.iter().filter(|v| v.relationship.target_id == svc2.id).count(), 1);
    assert!(fx
        .graph
        .relationships()
        .list_for_node(svc.id, Direction::Both, None)
        .await
        .unwrap()
        .is_empty());

    // Replaying the migration finds nothing left to move.
    let replayed = fx
        .graph
        .relationships()
        .migrate(svc.id, svc2.id, fx.graph.now())
        .await
        .unwrap();
    assert!(replayed.is_empty());
}
