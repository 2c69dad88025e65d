use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use topichub_core::{TopicDocument, TopicId};

use crate::query::QueryError;

pub mod memory;
pub mod topic;

pub use memory::InMemoryTopicStore;
pub use topic::SqlTopicStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("duplicate key: a document with _id `{0}` already exists")]
    DuplicateKey(String),
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsertOneResult {
    pub inserted_id: TopicId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched_count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// Single-document operations over the topic collection.
#[async_trait]
pub trait TopicStore: Send + Sync {
    async fn find_one(
        &self,
        filter: &Map<String, Value>,
        projection: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, RepositoryError>;

    /// Fails with [`RepositoryError::DuplicateKey`] when the identifier is taken.
    async fn insert_one(&self, document: TopicDocument)
        -> Result<InsertOneResult, RepositoryError>;

    async fn update_description(
        &self,
        id: &TopicId,
        description: &str,
    ) -> Result<UpdateResult, RepositoryError>;

    async fn delete_one(&self, id: &TopicId) -> Result<DeleteResult, RepositoryError>;
}
