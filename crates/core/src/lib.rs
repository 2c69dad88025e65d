//! Core types shared by every topichub crate: the topic document model, the
//! operation vocabulary, the handler error taxonomy, and layered configuration.

pub mod config;
pub mod domain;
pub mod errors;

pub use domain::operation::Operation;
pub use domain::topic::{TopicDocument, TopicId, DESCRIPTION_FIELD, ID_FIELD};
pub use errors::OperationError;
