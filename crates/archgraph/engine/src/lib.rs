#![deny(unsafe_code)]
//! # archgraph-engine
//!
//! The temporal knowledge-graph engine behind Archgraph.
//!
//! [`KnowledgeGraph`] is the facade. It hands out four components that share
//! one storage backend, one relationship matrix and one clock:
//!
//! - [`NodeStore`]: create, read, list, copy-on-write update, delete, history
//! - [`RelationshipManager`]: matrix-checked edges and their migration onto
//!   successor versions
//! - [`TraversalEngine`]: bounded, as-of aware subgraph extraction
//! - [`ValidationEngine`]: advisory rules plus matrix-conformance checks
//!
//! ```no_run
//! use archgraph_engine::{EngineConfig, KnowledgeGraph};
//! use serde_json::json;
//!
//! # async fn demo() -> archgraph_engine::GraphResult<()> {
//! let graph = KnowledgeGraph::in_memory(EngineConfig::default());
//! let payments = graph.nodes().create("capability", &json!({ "name": "Payments" })).await?;
//! let payments = graph.nodes().update(payments.id, &json!({ "status": "active" })).await?;
//! assert_eq!(payments.version, 2);
//! # Ok(())
//! # }
//! ```

mod clock;
mod config;
mod error;
mod graph;
mod node_store;
mod relationships;
mod telemetry;
mod traversal;
mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    EngineConfig, ListingConfig, LoggingConfig, StorageConfig, TraversalConfig, ValidationConfig,
    WriteConfig,
};
pub use error::{GraphError, GraphResult};
pub use graph::{GraphStats, KnowledgeGraph, KnowledgeGraphBuilder};
pub use node_store::{NodeFilter, NodePage, NodeStore};
pub use relationships::{RelationshipManager, RelationshipView};
pub use telemetry::init_tracing;
pub use traversal::{Subgraph, TraversalEngine};
pub use validation::{
    builtin_rules, orphan_rule, RuleCondition, RuleDefinition, Severity, ValidationEngine, Warning,
    DANGLING_RULE, MATRIX_RULE, ORPHAN_RULE,
};
