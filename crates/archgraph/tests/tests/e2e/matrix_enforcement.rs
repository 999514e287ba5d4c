//! End-to-end test: the relationship matrix gates every write.

use crate::common::{process_step, Fixture};
use archgraph_engine::GraphError;
use archgraph_types::{Direction, NodeType, RelationshipProps, RelationshipType};
use serde_json::json;

#[tokio::test]
async fn composes_capability_to_step_is_rejected_after_update() {
    let fx = Fixture::new();
    let a = fx.named("capability", "X").await;
    fx.tick(5);
    let a2 = fx
        .graph
        .nodes()
        .update(a.id, &json!({ "description": "Y" }))
        .await
        .unwrap();
    assert_eq!(a2.version, 2);

    let history = fx.graph.nodes().history(a.id).await.unwrap();
    let versions: Vec<_> = history.iter().map(|n| (n.id, n.version)).collect();
    assert_eq!(versions, vec![(a2.id, 2), (a.id, 1)]);
    assert_eq!(fx.graph.nodes().history(a2.id).await.unwrap(), history);

    let step = fx.create("process_step", process_step("Validate order", 1)).await;
    let err = fx
        .graph
        .relationships()
        .create(RelationshipType::Composes, a2.id, step.id, RelationshipProps::default())
        .await
        .unwrap_err();
    match err {
        GraphError::InvalidRelationship {
            rel_type,
            source_type,
            target_type,
        } => {
            assert_eq!(rel_type, RelationshipType::Composes);
            assert_eq!(source_type, NodeType::Capability);
            assert_eq!(target_type, NodeType::ProcessStep);
        }
        other => panic!("expected InvalidRelationship, got {other:?}"),
    }
    assert!(fx
        .graph
        .relationships()
        .list_for_node(a2.id, Direction::Both, None)
        .await
        .unwrap()
        .is_empty());

    let sub = fx.named("capability", "X.1").await;
    fx.link(RelationshipType::Composes, &a2, &sub).await;
    assert_eq!(
        fx.graph
            .relationships()
            .list_for_node(a2.id, Direction::Out, None)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn spec_attachments_accept_any_non_spec_source() {
    let fx = Fixture::new();
    let spec = fx
        .create("spec_document", json!({ "name": "Order ERD", "spec_kind": "erd" }))
        .await;
    let other_spec = fx
        .create("spec_document", json!({ "name": "ADR-7", "spec_kind": "adr" }))
        .await;
    let entity = fx.named("data_entity", "Order").await;
    let process = fx.named("process", "Fulfilment").await;

    fx.link(RelationshipType::SpecifiedBy, &entity, &spec).await;
    fx.link(RelationshipType::TestedBy, &process, &spec).await;

    let err = fx
        .graph
        .relationships()
        .create(RelationshipType::SpecifiedBy, other_spec.id, spec.id, RelationshipProps::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidRelationship { .. }));
}

#[tokio::test]
async fn endpoints_must_be_current() {
    let fx = Fixture::new();
    let a = fx.named("capability", "A").await;
    let b = fx.named("capability", "B").await;
    let a2 = fx.graph.nodes().update(a.id, &json!({ "status": "active" })).await.unwrap();

    let stale = fx
        .graph
        .relationships()
        .create(RelationshipType::Composes, a.id, b.id, RelationshipProps::default())
        .await
        .unwrap_err();
    assert!(stale.is_not_found());

    fx.graph.nodes().delete(b.id).await.unwrap();
    let deleted = fx
        .graph
        .relationships()
        .create(RelationshipType::Composes, a2.id, b.id, RelationshipProps::default())
        .await
        .unwrap_err();
    assert!(deleted.is_not_found());
}
