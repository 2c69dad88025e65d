pub mod connection;
pub mod migrations;
pub mod query;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use query::{DocumentQuery, QueryError};
pub use repositories::{
    DeleteResult, InMemoryTopicStore, InsertOneResult, RepositoryError, SqlTopicStore, TopicStore,
    UpdateResult,
};
