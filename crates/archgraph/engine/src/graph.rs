use crate::clock::{Clock, SystemClock};
use crate::config::{EngineConfig, StorageConfig};
use crate::error::{GraphError, GraphResult};
use crate::node_store::NodeStore;
use crate::relationships::RelationshipManager;
use crate::traversal::TraversalEngine;
use crate::validation::ValidationEngine;
use archgraph_store::{GraphBackend, InMemoryGraphBackend, NodeQuery, RelationshipQuery, WriteBatch};
use archgraph_types::{NodeType, RelationshipMatrix, RelationshipType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

/// Everything an engine component needs: storage, the matrix, time and limits.
pub(crate) struct GraphContext {
    pub(crate) backend: Arc<dyn GraphBackend>,
    pub(crate) matrix: RelationshipMatrix,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: EngineConfig,
}

impl GraphContext {
    /// Plan a write from fresh reads and apply it, re-planning on conflict.
    ///
    /// `plan` receives the instant the attempt is stamped with and returns the
    /// batch plus the value to hand back once it commits.
    pub(crate) async fn commit<T, F, Fut>(
        &self,
        operation: &'static str,
        mut plan: F,
    ) -> GraphResult<T>
    where
        F: FnMut(DateTime<Utc>) -> Fut,
        Fut: Future<Output = GraphResult<(WriteBatch, T)>>,
    {
        let max_attempts = self.config.writes.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let now = self.clock.now();
            let (batch, output) = plan(now).await?;
            match self.backend.apply(batch).await {
                Ok(()) => return Ok(output),
                Err(err) if err.is_conflict() && attempt < max_attempts => {
                    warn!(operation, attempt, error = %err, "write conflict, re-planning");
                    attempt += 1;
                }
                Err(err) if err.is_conflict() => {
                    return Err(GraphError::Conflict(format!(
                        "{operation} gave up after {attempt} attempts: {err}"
                    )));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Counts of current rows, by type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: BTreeMap<NodeType, usize>,
    pub relationships: BTreeMap<RelationshipType, usize>,
}

impl GraphStats {
    pub fn total_nodes(&self) -> usize {
        self.nodes.values().sum()
    }

    pub fn total_relationships(&self) -> usize {
        self.relationships.values().sum()
    }
}

/// Entry point to the temporal knowledge graph.
///
/// Cheap to clone; every clone shares the same backend.
#[derive(Clone)]
pub struct KnowledgeGraph {
    ctx: Arc<GraphContext>,
}

impl KnowledgeGraph {
    pub fn new(backend: Arc<dyn GraphBackend>, config: EngineConfig) -> Self {
        Self::builder(backend, config).build()
    }

    pub fn builder(backend: Arc<dyn GraphBackend>, config: EngineConfig) -> KnowledgeGraphBuilder {
        KnowledgeGraphBuilder {
            backend,
            config,
            matrix: RelationshipMatrix::standard(),
            clock: Arc::new(SystemClock),
        }
    }

    /// A graph over a fresh in-memory backend.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(Arc::new(InMemoryGraphBackend::new()), config)
    }

    /// Validate `config` and connect the backend it names.
    pub async fn from_config(config: EngineConfig) -> GraphResult<Self> {
        config.validate()?;
        let backend: Arc<dyn GraphBackend> = match &config.storage {
            StorageConfig::Memory => Arc::new(InMemoryGraphBackend::new()),
            #[cfg(feature = "postgres")]
            StorageConfig::Postgres {
                url,
                max_connections,
                connect_timeout_secs,
            } => Arc::new(
                archgraph_store::postgres::PostgresGraphBackend::connect_with_options(
                    url,
                    *max_connections,
                    *connect_timeout_secs,
                )
                .await?,
            ),
            #[cfg(not(feature = "postgres"))]
            StorageConfig::Postgres { .. } => {
                return Err(GraphError::Validation(
                    "postgres storage requires the `postgres` feature".into(),
                ))
            }
        };
        Ok(Self::new(backend, config))
    }

    pub fn nodes(&self) -> NodeStore {
        NodeStore::new(self.ctx.clone())
    }

    pub fn relationships(&self) -> RelationshipManager {
        RelationshipManager::new(self.ctx.clone())
    }

    pub fn traversal(&self) -> TraversalEngine {
        TraversalEngine::new(self.ctx.clone())
    }

    pub fn validator(&self) -> ValidationEngine {
        ValidationEngine::new(self.ctx.clone())
    }

    pub fn matrix(&self) -> &RelationshipMatrix {
        &self.ctx.matrix
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.ctx.clock.now()
    }

    /// Current node and relationship counts.
    pub async fn stats(&self) -> GraphResult<GraphStats> {
        let mut stats = GraphStats::default();
        for node in self.ctx.backend.nodes(&NodeQuery::current()).await? {
            *stats.nodes.entry(node.node_type()).or_default() += 1;
        }
        for rel in self.ctx.backend.relationships(&RelationshipQuery::current()).await? {
            *stats.relationships.entry(rel.rel_type).or_default() += 1;
        }
        Ok(stats)
    }
}

/// Builder for [`KnowledgeGraph`].
pub struct KnowledgeGraphBuilder {
    backend: Arc<dyn GraphBackend>,
    config: EngineConfig,
    matrix: RelationshipMatrix,
    clock: Arc<dyn Clock>,
}

impl KnowledgeGraphBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn matrix(mut self, matrix: RelationshipMatrix) -> Self {
        self.matrix = matrix;
        self
    }

    pub fn build(self) -> KnowledgeGraph {
        KnowledgeGraph {
            ctx: Arc::new(GraphContext {
                backend: self.backend,
                matrix: self.matrix,
                clock: self.clock,
                config: self.config,
            }),
        }
    }
}
