use archgraph_store::StorageError;
use archgraph_types::{NodeType, RelationshipType, SchemaError};
use thiserror::Error;

/// Result type for engine operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors returned by the knowledge-graph engine.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The referenced entity does not resolve under the requested scope.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("validation failed: {0}")]
    Validation(String),

    /// The (type, source, target) triple is absent from the relationship matrix.
    #[error("{rel_type} is not allowed from {source_type} to {target_type}")]
    InvalidRelationship {
        rel_type: RelationshipType,
        source_type: NodeType,
        target_type: NodeType,
    },

    /// A write kept losing races after every retry.
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl GraphError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<SchemaError> for GraphError {
    fn from(err: SchemaError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<StorageError> for GraphError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => Self::NotFound { entity: "record", id },
            StorageError::Conflict(msg) => Self::Conflict(msg),
            StorageError::Serialization(msg) | StorageError::Backend(msg) => Self::Backend(msg),
        }
    }
}
