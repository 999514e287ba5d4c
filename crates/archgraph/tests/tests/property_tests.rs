#[path = "e2e/common.rs"]
mod common;

#[path = "property/single_current.rs"]
mod single_current;

#[path = "property/migration_completeness.rs"]
mod migration_completeness;

#[path = "property/matrix_conformance.rs"]
mod matrix_conformance;
