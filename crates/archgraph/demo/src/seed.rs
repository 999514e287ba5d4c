//! A small order-to-cash architecture.

use anyhow::Result;
use archgraph_engine::KnowledgeGraph;
use archgraph_types::{AccessType, Node, NodeId, RelationshipProps, RelationshipType};
use serde_json::{json, Value};

const AUTHOR: &str = "archgraph-demo";

/// Handles to the nodes later phases touch.
pub struct SeededArchitecture {
    pub order_management: Node,
    pub order_service: Node,
    pub commerce: Node,
    pub order: Node,
    pub relationships: usize,
}

pub async fn seed(graph: &KnowledgeGraph) -> Result<SeededArchitecture> {
    let node = |type_tag: &'static str, attrs: Value| {
        let graph = graph.clone();
        async move {
            let mut attrs = attrs;
            attrs["created_by"] = json!(AUTHOR);
            graph.nodes().create(type_tag, &attrs).await
        }
    };

    let order_management = node(
        "capability",
        json!({
            "name": "Order Management",
            "level": 0,
            "owner": "Sales Ops",
            "tags": ["order-to-cash"]
        }),
    )
    .await?;
    let order_capture = node(
        "capability",
        json!({
            "name": "Order Capture",
            "level": 1,
            "acceptance_criteria": "Orders are confirmed within 5s"
        }),
    )
    .await?;
    let order_service = node(
        "service",
        json!({ "name": "Order Service", "owner": "Commerce Team", "sla": "99.9%" }),
    )
    .await?;
    let commerce = node(
        "application",
        json!({ "name": "Commerce Platform", "technology": "Rust", "hosting": "kubernetes" }),
    )
    .await?;
    let checkout = node(
        "application_component",
        json!({ "name": "Checkout", "repository": "git@example.com:commerce/checkout.git" }),
    )
    .await?;
    let orders_api = node(
        "api",
        json!({
            "name": "Orders API",
            "protocol": "rest",
            "endpoint": "/v1/orders",
            "visibility": "partner"
        }),
    )
    .await?;
    let openapi = node(
        "spec_document",
        json!({
            "name": "Orders API v1",
            "spec_kind": "openapi",
            "uri": "https://example.com/orders.yaml"
        }),
    )
    .await?;
    let order = node(
        "data_entity",
        json!({ "name": "Order", "classification": "confidential", "retention_days": 2555 }),
    )
    .await?;
    let fulfilment = node(
        "process",
        json!({ "name": "Order Fulfilment", "trigger": "order placed" }),
    )
    .await?;
    let pick = node(
        "process_step",
        json!({ "name": "Pick", "sequence": 1, "actor": "warehouse" }),
    )
    .await?;
    let ship = node(
        "process_step",
        json!({ "name": "Ship", "sequence": 2, "automated": true }),
    )
    .await?;

    let edges: [(RelationshipType, NodeId, NodeId, RelationshipProps); 12] = [
        (RelationshipType::Composes, order_management.id, order_capture.id, props()),
        (RelationshipType::Realizes, order_service.id, order_management.id, props()),
        (RelationshipType::Realizes, commerce.id, order_service.id, props()),
        (RelationshipType::Composes, commerce.id, checkout.id, props()),
        (RelationshipType::DependsOn, checkout.id, orders_api.id, props()),
        (RelationshipType::Realizes, orders_api.id, order_service.id, props()),
        (RelationshipType::SpecifiedBy, orders_api.id, openapi.id, props()),
        (
            RelationshipType::Accesses,
            commerce.id,
            order.id,
            props().with_access(AccessType::Read),
        ),
        (
            RelationshipType::Accesses,
            checkout.id,
            order.id,
            props().with_access(AccessType::ReadWrite),
        ),
        (RelationshipType::Composes, fulfilment.id, pick.id, props()),
        (RelationshipType::Composes, fulfilment.id, ship.id, props()),
        (RelationshipType::FlowsTo, pick.id, ship.id, props().with_notes("same day")),
    ];
    let relationships = edges.len();
    for (rel_type, source, target, props) in edges {
        graph.relationships().create(rel_type, source, target, props).await?;
    }

    Ok(SeededArchitecture {
        order_management,
        order_service,
        commerce,
        order,
        relationships,
    })
}

fn props() -> RelationshipProps {
    RelationshipProps::by(AUTHOR)
}
