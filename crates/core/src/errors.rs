use thiserror::Error;

use crate::domain::operation::Operation;

/// Failures an operation handler can hit between the oracle reply and the store.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("could not parse model response: {0}")]
    Parse(String),
    #[error("missing required field `{field}`")]
    Validation { field: &'static str },
    #[error("model response named {count} documents where exactly one is allowed")]
    MultipleDocuments { count: usize },
    #[error("store operation failed: {0}")]
    Store(String),
}

impl OperationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::Validation { .. } => "validation",
            Self::MultipleDocuments { .. } => "multiple_documents",
            Self::Store(_) => "store",
        }
    }

    /// Store failures. A rejected model reply is a routine outcome.
    pub fn needs_attention(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Text shown to the user when `operation` ends with this error.
    pub fn user_message(&self, operation: Operation) -> String {
        match self {
            Self::Parse(reason) => {
                format!("Could not understand the model response ({reason}). Please rephrase.")
            }
            Self::Validation { .. } => match operation {
                Operation::Insert => "Could not determine a valid ID to insert.".to_string(),
                Operation::Update => "Could not determine both ID and new description.".to_string(),
                Operation::Delete => "Could not determine a valid ID to delete.".to_string(),
                Operation::Find | Operation::Invalid => {
                    "Could not determine a valid query.".to_string()
                }
            },
            Self::MultipleDocuments { .. } => format!(
                "Multiple documents detected. Please {} one document at a time.",
                operation.as_str()
            ),
            Self::Store(reason) => match operation {
                Operation::Insert => format!("Error inserting document: {reason}"),
                Operation::Update => format!("Error updating document: {reason}"),
                Operation::Delete => format!("Error deleting document: {reason}"),
                Operation::Find | Operation::Invalid => {
                    format!("Error querying documents: {reason}")
                }
            },
        }
    }
}
