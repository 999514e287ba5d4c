//! Property tests: after any update, the successor holds exactly the edges
//! the previous version held, with endpoints repointed and properties intact.

use crate::common::Fixture;
use archgraph_types::{AccessType, Direction, Node, RelationshipProps, RelationshipType};
use proptest::prelude::*;
use serde_json::json;

fn arb_access() -> impl Strategy<Value = Option<AccessType>> {
    prop_oneof![
        Just(None),
        Just(Some(AccessType::Read)),
        Just(Some(AccessType::Write)),
        Just(Some(AccessType::ReadWrite)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn successor_inherits_every_edge(
        components in 0usize..5,
        entities in prop::collection::vec(arb_access(), 0..5),
        apis in 0usize..3,
        updates in 1usize..4,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let fx = Fixture::new();
            let app = fx.named("application", "Hub").await;
            let mut expected = Vec::new();

            for i in 0..components {
                let comp = fx.named("application_component", &format!("Comp {i}")).await;
                fx.link(RelationshipType::Composes, &app, &comp).await;
                expected.push((RelationshipType::Composes, comp.id, None));
            }
            for (i, access) in entities.iter().enumerate() {
                let entity = fx.named("data_entity", &format!("Entity {i}")).await;
                let props = match access {
                    Some(a) => RelationshipProps::default().with_access(*a),
                    None => RelationshipProps::default(),
                };
                fx.link_with(RelationshipType::Accesses, &app, &entity, props).await;
                expected.push((RelationshipType::Accesses, entity.id, *access));
            }
            for i in 0..apis {
                let api = fx
                    .create("api", json!({ "name": format!("API {i}"), "protocol": "grpc" }))
                    .await;
                // Incoming edge.
                fx.link(RelationshipType::Serves, &api, &app).await;
                expected.push((RelationshipType::Serves, api.id, None));
            }
            expected.sort_by_key(|(t, id, _)| (*t, id.to_string()));

            let mut head: Node = app;
            for round in 0..updates {
                fx.tick(1);
                let previous = head.clone();
                head = fx
                    .graph
                    .nodes()
                    .update(previous.id, &json!({ "hosting": format!("zone-{round}") }))
                    .await
                    .unwrap();

                let old_edges = fx
                    .graph
                    .relationships()
                    .list_for_node(previous.id, Direction::Both, None)
                    .await
                    .unwrap();
                prop_assert!(old_edges.is_empty());

                let views = fx
                    .graph
                    .relationships()
                    .list_for_node(head.id, Direction::Both, None)
                    .await
                    .unwrap();
                let mut actual: Vec<_> = views
                    .iter()
                    .map(|v| {
                        let r = &v.relationship;
                        prop_assert!(r.touches(head.id));
                        prop_assert_eq!(r.valid_from, head.valid_from);
                        Ok((r.rel_type, r.other_end(head.id), r.props.access_type))
                    })
                    .collect::<Result<_, TestCaseError>>()?;
                actual.sort_by_key(|(t, id, _)| (*t, id.to_string()));
                prop_assert_eq!(&actual, &expected);
            }
            Ok(())
        })?;
    }
}
