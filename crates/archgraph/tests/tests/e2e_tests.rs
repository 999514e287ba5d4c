#[path = "e2e/common.rs"]
mod common;

#[path = "e2e/temporal_replay.rs"]
mod temporal_replay;

#[path = "e2e/matrix_enforcement.rs"]
mod matrix_enforcement;

#[path = "e2e/relationship_migration.rs"]
mod relationship_migration;

#[path = "e2e/subgraph_traversal.rs"]
mod subgraph_traversal;

#[path = "e2e/node_lifecycle.rs"]
mod node_lifecycle;

#[path = "e2e/validation_run.rs"]
mod validation_run;

#[path = "e2e/concurrent_writes.rs"]
mod concurrent_writes;
