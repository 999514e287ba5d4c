#![deny(unsafe_code)]
//! # archgraph-types
//!
//! Data model for the Archgraph temporal knowledge graph.
//!
//! Every entity in the graph is versioned: a row is *current* while its
//! `valid_to` is empty, and an update closes the current row and opens a
//! successor rather than mutating in place.
//!
//! ```text
//! Capability ──REALIZES── Service ──REALIZES── Application ──COMPOSES── ApplicationComponent
//!      │                                            │
//!      └──────────SPECIFIED_BY──────────► SpecDocument ◄──────TESTED_BY──┘
//! ```
//!
//! ## Key Types
//!
//! - [`Node`] / [`NodeKind`]: a versioned node and its per-type attributes
//! - [`Relationship`]: a versioned, directed, typed edge
//! - [`RelationshipMatrix`]: which (type, source, target) triples are well-formed
//! - [`Temporal`]: the current / as-of predicate shared by every read

pub mod error;
pub mod ids;
pub mod matrix;
pub mod node;
pub mod relationship;
pub mod temporal;

pub use error::SchemaError;
pub use ids::{LogicalId, NodeId, RelationshipId};
pub use matrix::RelationshipMatrix;
pub use node::{
    AccessLevel, ApiAttributes, ApiProtocol, ApplicationAttributes, ApplicationComponentAttributes,
    CapabilityAttributes, DataClassification, DataEntityAttributes, Layer, Node, NodeAttributes,
    NodeKind, NodeStatus, NodeSummary, NodeType, ProcessAttributes, ProcessStepAttributes,
    ServiceAttributes, SpecDocumentAttributes, SpecKind, DEFAULT_AUTHOR,
};
pub use relationship::{AccessType, Direction, Relationship, RelationshipProps, RelationshipType};
pub use temporal::{Temporal, Versioned};
