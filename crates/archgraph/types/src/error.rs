/// Errors raised while validating attributes against a node or relationship schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),
    #[error("unknown relationship type: {0}")]
    UnknownRelationshipType(String),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("malformed field {field}: {reason}")]
    MalformedField { field: String, reason: String },
    #[error("unknown attribute for {node_type}: {field}")]
    UnknownAttribute { node_type: String, field: String },
    #[error("attributes must be a JSON object")]
    NotAnObject,
}

impl SchemaError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
