//! End-to-end test: writers racing on the same entity.
//!
//! `Interleaving` lands another writer's batch between an operation's reads
//! and its own apply, which is the window a stale plan would lose.

use crate::common::{epoch, Fixture};
use archgraph_engine::{EngineConfig, GraphError, KnowledgeGraph, ManualClock, DANGLING_RULE};
use archgraph_store::{
    GraphBackend, InMemoryGraphBackend, Mutation, NodeQuery, RelationshipQuery, StorageResult,
    WriteBatch,
};
use archgraph_types::{
    Direction, Node, NodeId, Relationship, RelationshipId, RelationshipProps, RelationshipType,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::{Arc, Mutex};

const NO_RULES: &[String] = &[];

/// Applies a queued batch right before the first batch that closes a node.
struct Interleaving {
    inner: InMemoryGraphBackend,
    queued: Mutex<Option<WriteBatch>>,
}

impl Interleaving {
    fn queue(&self, batch: WriteBatch) {
        *self.queued.lock().unwrap() = Some(batch);
    }

    fn pending(&self) -> bool {
        self.queued.lock().unwrap().is_some()
    }
}

#[async_trait]
impl GraphBackend for Interleaving {
    async fn node(&self, id: &NodeId) -> StorageResult<Option<Node>> {
        self.inner.node(id).await
    }

    async fn nodes(&self, query: &NodeQuery) -> StorageResult<Vec<Node>> {
        self.inner.nodes(query).await
    }

    async fn count_nodes(&self, query: &NodeQuery) -> StorageResult<usize> {
        self.inner.count_nodes(query).await
    }

    async fn relationship(&self, id: &RelationshipId) -> StorageResult<Option<Relationship>> {
        self.inner.relationship(id).await
    }

    async fn relationships(&self, query: &RelationshipQuery) -> StorageResult<Vec<Relationship>> {
        self.inner.relationships(query).await
    }

    async fn apply(&self, batch: WriteBatch) -> StorageResult<()> {
        let racing = if batch.iter().any(|m| matches!(m, Mutation::CloseNode { .. })) {
            self.queued.lock().unwrap().take()
        } else {
            None
        };
        if let Some(racing) = racing {
            self.inner.apply(racing).await?;
        }
        self.inner.apply(batch).await
    }
}

struct Race {
    graph: KnowledgeGraph,
    clock: Arc<ManualClock>,
    backend: Arc<Interleaving>,
}

impl Race {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(epoch()));
        let backend = Arc::new(Interleaving {
            inner: InMemoryGraphBackend::new(),
            queued: Mutex::new(None),
        });
        let graph = KnowledgeGraph::builder(backend.clone(), EngineConfig::default())
            .clock(clock.clone())
            .build();
        Self { graph, clock, backend }
    }

    async fn capability(&self, name: &str) -> Node {
        self.graph
            .nodes()
            .create("capability", &json!({ "name": name }))
            .await
            .unwrap()
    }

    fn tick(&self) -> DateTime<Utc> {
        self.clock.advance(Duration::seconds(1))
    }

    /// Queue what `RelationshipManager::create` would commit for `source -> target`.
    fn queue_edge(&self, source: &Node, target: &Node, at: DateTime<Utc>) -> Relationship {
        let rel = Relationship::new(
            RelationshipType::Composes,
            source.id,
            target.id,
            RelationshipProps::by("other-writer"),
            at,
        );
        let mut batch = WriteBatch::new();
        batch
            .require_current(source.id)
            .require_current(target.id)
            .insert_relationship(rel.clone());
        self.backend.queue(batch);
        rel
    }

    async fn dangling(&self) -> usize {
        self.graph
            .validator()
            .run_all(Some(NO_RULES))
            .await
            .iter()
            .filter(|w| w.rule_id == DANGLING_RULE)
            .count()
    }
}

#[tokio::test]
async fn update_carries_edge_created_mid_write() {
    let race = Race::new();
    let a = race.capability("Ordering").await;
    let b = race.capability("Order Capture").await;
    let at = race.tick();
    let racing = race.queue_edge(&a, &b, at);

    let a2 = race
        .graph
        .nodes()
        .update(a.id, &json!({ "description": "v2" }))
        .await
        .unwrap();
    assert!(!race.backend.pending());

    let edges = race
        .graph
        .relationships()
        .list_for_node(a2.id, Direction::Out, None)
        .await
        .unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].relationship.target_id, b.id);
    assert_eq!(edges[0].relationship.props.created_by, "other-writer");

    let closed = race.graph.relationships().get(racing.id, None).await;
    assert!(closed.unwrap_err().is_not_found());
    assert_eq!(race.dangling().await, 0);
}

#[tokio::test]
async fn delete_closes_edge_created_mid_write() {
    let race = Race::new();
    let a = race.capability("Ordering").await;
    let b = race.capability("Order Capture").await;
    let at = race.tick();
    let racing = race.queue_edge(&b, &a, at);

    assert!(race.graph.nodes().delete(a.id).await.unwrap());
    assert!(!race.backend.pending());

    let closed = race.graph.relationships().get(racing.id, None).await;
    assert!(closed.unwrap_err().is_not_found());
    let left = race
        .graph
        .relationships()
        .list_for_node(b.id, Direction::Both, None)
        .await
        .unwrap();
    assert!(left.is_empty());
    assert_eq!(race.dangling().await, 0);
}

#[tokio::test]
async fn update_losing_the_race_replans_into_not_found() {
    let race = Race::new();
    let a = race.capability("Ordering").await;
    let at = race.tick();

    // Another writer supersedes `a` between our reads and our apply.
    let theirs = a.successor(a.attributes.clone(), at);
    let mut batch = WriteBatch::new();
    batch.close_node(a.id, at).insert_node(theirs.clone());
    race.backend.queue(batch);

    let err = race
        .graph
        .nodes()
        .update(a.id, &json!({ "description": "ours" }))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::NotFound { .. }));

    let history = race.graph.nodes().history(theirs.id).await.unwrap();
    assert_eq!(history.iter().map(|n| n.version).collect::<Vec<_>>(), vec![2, 1]);
    assert_eq!(history[0].id, theirs.id);
}

#[tokio::test]
async fn concurrent_updates_fork_nothing() {
    let fx = Fixture::new();
    let a = fx.named("capability", "Ordering").await;
    fx.tick(1);

    let (first, second) = (fx.graph.nodes(), fx.graph.nodes());
    let left_patch = json!({ "description": "left" });
    let right_patch = json!({ "description": "right" });
    let (left, right) = tokio::join!(
        first.update(a.id, &left_patch),
        second.update(a.id, &right_patch),
    );

    let outcomes = [left, right];
    let winners: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(GraphError::is_not_found));

    let current = fx
        .backend
        .nodes(&NodeQuery::current().with_logical_id(a.logical_id))
        .await
        .unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].id, winners[0].id);
    assert_eq!(current[0].version, 2);
}
