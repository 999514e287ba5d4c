//! End-to-end test: reads at past instants see the graph as it was.

use crate::common::Fixture;
use archgraph_engine::NodeFilter;
use archgraph_types::{Direction, NodeType, RelationshipType};
use chrono::Duration;
use serde_json::json;

#[tokio::test]
async fn original_version_resolves_only_inside_its_interval() {
    let fx = Fixture::new();
    let t1 = fx.graph.now();
    let original = fx.create("capability", json!({ "name": "X", "description": "first" })).await;

    let t2 = fx.tick(60);
    let successor = fx
        .graph
        .nodes()
        .update(original.id, &json!({ "description": "second" }))
        .await
        .unwrap();
    assert_eq!(successor.valid_from, t2);

    let midway = t1 + Duration::seconds(30);
    let past = fx.graph.nodes().get(original.id, Some(midway)).await.unwrap();
    assert_eq!(past.version, 1);
    assert_eq!(past.description(), "first");

    let later = t2 + Duration::seconds(30);
    assert!(fx.graph.nodes().get(original.id, Some(later)).await.unwrap_err().is_not_found());
    assert!(fx.graph.nodes().get(original.id, None).await.unwrap_err().is_not_found());
    assert_eq!(fx.graph.nodes().get(successor.id, Some(later)).await.unwrap().version, 2);

    // The boundary instant belongs to the successor.
    assert!(fx.graph.nodes().get(original.id, Some(t2)).await.unwrap_err().is_not_found());
    assert!(fx.graph.nodes().get(successor.id, Some(t2)).await.is_ok());
    // Before creation nothing resolves.
    assert!(fx
        .graph
        .nodes()
        .get(original.id, Some(t1 - Duration::seconds(1)))
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn listing_and_relationships_replay_together() {
    let fx = Fixture::new();
    let a = fx.named("capability", "Billing").await;
    let b = fx.named("capability", "Invoicing").await;
    fx.link(RelationshipType::Composes, &a, &b).await;
    let seeded = fx.tick(10);

    fx.tick(10);
    fx.graph.nodes().delete(b.id).await.unwrap();
    fx.named("capability", "Dunning").await;

    let then = fx
        .graph
        .nodes()
        .list(&NodeFilter {
            as_of: Some(seeded),
            ..NodeFilter::of_type(NodeType::Capability)
        })
        .await
        .unwrap();
    let names: Vec<_> = then.nodes.iter().map(|n| n.name().to_string()).collect();
    assert_eq!(names, vec!["Billing", "Invoicing"]);
    assert_eq!(then.total, 2);

    let now = fx.graph.nodes().list(&NodeFilter::of_type(NodeType::Capability)).await.unwrap();
    let names: Vec<_> = now.nodes.iter().map(|n| n.name().to_string()).collect();
    assert_eq!(names, vec!["Billing", "Dunning"]);

    let edges_then = fx
        .graph
        .relationships()
        .list_for_node(a.id, Direction::Out, Some(seeded))
        .await
        .unwrap();
    assert_eq!(edges_then.len(), 1);
    assert_eq!(edges_then[0].target.name, "Invoicing");
    assert!(fx
        .graph
        .relationships()
        .list_for_node(a.id, Direction::Out, None)
        .await
        .unwrap()
        .is_empty());
}
