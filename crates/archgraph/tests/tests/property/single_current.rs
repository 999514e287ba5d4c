//! Property tests: random update/delete sequences keep at most one current
//! version per entity and strictly increasing version numbers.

use crate::common::Fixture;
use archgraph_engine::NodeFilter;
use archgraph_store::{GraphBackend, NodeQuery};
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Op {
    Update { entity: usize, description: String },
    Delete { entity: usize },
}

fn arb_op(entities: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..entities, "[a-z]{1,12}")
            .prop_map(|(entity, description)| Op::Update { entity, description }),
        1 => (0..entities).prop_map(|entity| Op::Delete { entity }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn at_most_one_current_version(ops in prop::collection::vec(arb_op(4), 1..30)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let fx = Fixture::new();
            let mut heads = Vec::new();
            for i in 0..4 {
                heads.push(Some(fx.named("capability", &format!("C{i}")).await));
            }

            for op in ops {
                fx.tick(1);
                match op {
                    Op::Update { entity, description } => {
                        let Some(head) = heads[entity].clone() else { continue };
                        let next = fx
                            .graph
                            .nodes()
                            .update(head.id, &json!({ "description": description }))
                            .await
                            .unwrap();
                        prop_assert_eq!(next.version, head.version + 1);
                        prop_assert_eq!(next.logical_id, head.logical_id);
                        heads[entity] = Some(next);
                    }
                    Op::Delete { entity } => {
                        let Some(head) = heads[entity].take() else { continue };
                        prop_assert!(fx.graph.nodes().delete(head.id).await.unwrap());
                    }
                }
            }

            let all = fx.backend.nodes(&NodeQuery::all_versions()).await.unwrap();
            let mut current: HashMap<String, usize> = HashMap::new();
            for node in all.iter().filter(|n| n.valid_to.is_none()) {
                *current.entry(node.name().to_string()).or_default() += 1;
            }
            prop_assert!(current.values().all(|count| *count == 1));

            let live = heads.iter().flatten().count();
            let listed = fx.graph.nodes().list(&NodeFilter::default()).await.unwrap();
            prop_assert_eq!(listed.total, live);

            for head in heads.iter().flatten() {
                let history = fx.graph.nodes().history(head.id).await.unwrap();
                let versions: Vec<u32> = history.iter().map(|n| n.version).collect();
                let expected: Vec<u32> = (1..=head.version).rev().collect();
                prop_assert_eq!(versions, expected);
                // Adjacent versions share their boundary instant.
                for pair in history.windows(2) {
                    prop_assert_eq!(pair[1].valid_to, Some(pair[0].valid_from));
                }
            }
            Ok(())
        })?;
    }
}
