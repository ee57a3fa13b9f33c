use thiserror::Error;

/// A persisted node record that could not be turned back into a node.
///
/// Import never drops a malformed record: a partially loaded document is
/// worse than a failed load.
#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error("{node_type}: missing field `{field}`")]
    MissingField {
        node_type: String,
        field: &'static str,
    },

    #[error("{node_type}: invalid field `{field}`: {reason}")]
    InvalidField {
        node_type: String,
        field: &'static str,
        reason: String,
    },

    #[error("unknown node type `{0}`")]
    UnknownType(String),

    #[error("malformed document JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeserializationError {
    pub(crate) fn missing(node_type: &str, field: &'static str) -> Self {
        Self::MissingField {
            node_type: node_type.to_string(),
            field,
        }
    }

    pub(crate) fn invalid(node_type: &str, field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            node_type: node_type.to_string(),
            field,
            reason: reason.into(),
        }
    }

    /// Name of the offending field, when the error is about one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { field, .. } | Self::InvalidField { field, .. } => Some(field),
            Self::UnknownType(_) | Self::Json(_) => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate node type: {0}")]
    DuplicateNodeType(String),
}
