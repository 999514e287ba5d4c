//! Archgraph storage contract.
//!
//! The engine never mutates storage directly. It reads through
//! [`GraphBackend`] queries and writes by submitting a [`WriteBatch`]: an
//! ordered list of mutations with currency preconditions that a backend
//! applies atomically or not at all.
//!
//! Backends:
//! - [`memory::InMemoryGraphBackend`]: adjacency maps behind one lock, for
//!   tests, tools and embedded use.
//! - `postgres::PostgresGraphBackend` (feature `postgres`): transactional
//!   source of truth.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod batch;
mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod query;
mod traits;

pub use batch::{Mutation, WriteBatch};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryGraphBackend;
pub use query::{NodeQuery, QueryWindow, RelationshipQuery};
pub use traits::GraphBackend;
