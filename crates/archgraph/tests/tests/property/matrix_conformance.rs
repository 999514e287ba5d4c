//! Property tests: relationship creation succeeds exactly for triples in the
//! matrix, and a rejected triple leaves the graph untouched.

use crate::common::Fixture;
use archgraph_engine::GraphError;
use archgraph_types::{Direction, NodeType, RelationshipMatrix, RelationshipProps, RelationshipType};
use proptest::prelude::*;
use serde_json::{json, Value};

fn arb_node_type() -> impl Strategy<Value = NodeType> {
    prop::sample::select(NodeType::ALL.to_vec())
}

fn arb_rel_type() -> impl Strategy<Value = RelationshipType> {
    prop::sample::select(RelationshipType::ALL.to_vec())
}

/// Minimal valid attributes for each node type.
fn attributes(node_type: NodeType, name: &str) -> Value {
    match node_type {
        NodeType::ProcessStep => json!({ "name": name, "sequence": 1 }),
        NodeType::Api => json!({ "name": name, "protocol": "rest" }),
        NodeType::SpecDocument => json!({ "name": name, "spec_kind": "requirements" }),
        _ => json!({ "name": name }),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn create_succeeds_iff_matrix_allows(
        rel_type in arb_rel_type(),
        source_type in arb_node_type(),
        target_type in arb_node_type(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let fx = Fixture::new();
            let source = fx.create(source_type.as_str(), attributes(source_type, "source")).await;
            let target = fx.create(target_type.as_str(), attributes(target_type, "target")).await;
            let allowed = RelationshipMatrix::standard().allows(rel_type, source_type, target_type);

            let result = fx
                .graph
                .relationships()
                .create(rel_type, source.id, target.id, RelationshipProps::default())
                .await;
            let listed = fx
                .graph
                .relationships()
                .list_for_node(source.id, Direction::Out, None)
                .await
                .unwrap();

            if allowed {
                let rel = result.unwrap();
                prop_assert_eq!(rel.rel_type, rel_type);
                prop_assert_eq!(listed.len(), 1);
            } else {
                let is_invalid = matches!(
                    result,
                    Err(GraphError::InvalidRelationship {
                        rel_type: r,
                        source_type: s,
                        target_type: t,
                    }) if r == rel_type && s == source_type && t == target_type
                );
                prop_assert!(is_invalid);
                prop_assert!(listed.is_empty());
            }
            Ok(())
        })?;
    }
}
