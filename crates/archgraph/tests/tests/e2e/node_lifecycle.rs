//! End-to-end test: create, list, delete and the uniqueness of current names.

use crate::common::Fixture;
use archgraph_engine::{GraphError, NodeFilter};
use archgraph_types::{Direction, Layer, NodeStatus, NodeType, RelationshipType};
use serde_json::json;

#[tokio::test]
async fn delete_closes_the_node_and_its_edges() {
    let fx = Fixture::new();
    let app = fx.named("application", "CRM").await;
    let comp = fx.named("application_component", "Contacts").await;
    let entity = fx.named("data_entity", "Customer").await;
    let composes = fx.link(RelationshipType::Composes, &app, &comp).await;
    let accesses = fx.link(RelationshipType::Accesses, &comp, &entity).await;

    let at = fx.tick(15);
    assert!(fx.graph.nodes().delete(comp.id).await.unwrap());
    assert!(!fx.graph.nodes().delete(comp.id).await.unwrap());

    for rel_id in [composes.id, accesses.id] {
        assert!(fx.graph.relationships().get(rel_id, None).await.unwrap_err().is_not_found());
    }
    let history = fx.graph.nodes().history(comp.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].valid_to, Some(at));
    assert!(fx
        .graph
        .relationships()
        .list_for_node(app.id, Direction::Both, None)
        .await
        .unwrap()
        .is_empty());

    // The name is free again once the entity is gone.
    let reborn = fx.named("application_component", "Contacts").await;
    assert_ne!(reborn.logical_id, comp.logical_id);
}

#[tokio::test]
async fn current_names_are_unique_per_type() {
    let fx = Fixture::new();
    fx.named("service", "Search").await;
    let err = fx
        .graph
        .nodes()
        .create("service", &json!({ "name": "Search" }))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::Validation(_)));

    // Same name, different type.
    fx.named("capability", "Search").await;

    let other = fx.named("service", "Indexing").await;
    let err = fx
        .graph
        .nodes()
        .update(other.id, &json!({ "name": "Search" }))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::Validation(_)));
}

#[tokio::test]
async fn schema_errors_are_validation_errors() {
    let fx = Fixture::new();
    for (type_tag, attrs) in [
        ("capability", json!({})),
        ("capability", json!({ "name": "   " })),
        ("process_step", json!({ "name": "Step" })),
        ("api", json!({ "name": "API", "protocol": "carrier-pigeon" })),
        ("warehouse", json!({ "name": "Nope" })),
    ] {
        let err = fx.graph.nodes().create(type_tag, &attrs).await.unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)), "{type_tag} {attrs}: {err:?}");
    }
    assert_eq!(fx.graph.stats().await.unwrap().total_nodes(), 0);
}

#[tokio::test]
async fn listing_filters_and_pages() {
    let fx = Fixture::new();
    for i in 0..7 {
        let tag = if i % 2 == 0 { "core" } else { "edge" };
        fx.create("capability", json!({ "name": format!("Cap {i}"), "tags": [tag] }))
            .await;
    }
    fx.create("service", json!({ "name": "Core Service", "status": "active", "tags": ["core"] }))
        .await;

    let page = fx
        .graph
        .nodes()
        .list(&NodeFilter {
            limit: Some(3),
            offset: 3,
            ..NodeFilter::of_type(NodeType::Capability)
        })
        .await
        .unwrap();
    assert_eq!(page.total, 7);
    let names: Vec<_> = page.nodes.iter().map(|n| n.name().to_string()).collect();
    assert_eq!(names, vec!["Cap 3", "Cap 4", "Cap 5"]);

    let core = fx
        .graph
        .nodes()
        .list(&NodeFilter {
            tags: vec!["core".into()],
            ..NodeFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(core.total, 5);

    let business = fx
        .graph
        .nodes()
        .list(&NodeFilter {
            layer: Some(Layer::Business),
            status: Some(NodeStatus::Active),
            ..NodeFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(business.total, 1);
    assert_eq!(business.nodes[0].name(), "Core Service");

    let searched = fx
        .graph
        .nodes()
        .list(&NodeFilter {
            search: Some("core SERV".into()),
            ..NodeFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(searched.total, 1);

    let zero = fx
        .graph
        .nodes()
        .list(&NodeFilter {
            limit: Some(0),
            ..NodeFilter::default()
        })
        .await;
    assert!(matches!(zero, Err(GraphError::Validation(_))));
}
