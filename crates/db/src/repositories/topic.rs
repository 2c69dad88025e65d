use serde_json::{Map, Value};

use topichub_core::{TopicDocument, TopicId};

use super::{DeleteResult, InsertOneResult, RepositoryError, TopicStore, UpdateResult};
use crate::query::DocumentQuery;
use crate::DbPool;

/// SQLite-backed store. Every call checks out its own pooled connection and
/// returns it when the call finishes, on success or error.
pub struct SqlTopicStore {
    pool: DbPool,
}

impl SqlTopicStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TopicStore for SqlTopicStore {
    async fn find_one(
        &self,
        filter: &Map<String, Value>,
        projection: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, RepositoryError> {
        let query = DocumentQuery::parse(filter, projection)?;
        let mut conn = self.pool.acquire().await?;

        let rows: Vec<(String, Option<String>)> = match query.pinned_id() {
            Some(id) => {
                sqlx::query_as("SELECT id, description FROM topics WHERE id = ? ORDER BY rowid ASC")
                    .bind(id)
                    .fetch_all(&mut *conn)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT id, description FROM topics ORDER BY rowid ASC")
                    .fetch_all(&mut *conn)
                    .await?
            }
        };

        Ok(query.first_match(
            rows.into_iter().map(|(id, description)| TopicDocument::new(id, description)),
        ))
    }

    async fn insert_one(
        &self,
        document: TopicDocument,
    ) -> Result<InsertOneResult, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let result = sqlx::query("INSERT INTO topics (id, description) VALUES (?, ?)")
            .bind(&document.id.0)
            .bind(document.description.as_deref())
            .execute(&mut *conn)
            .await;

        match result {
            Ok(_) => Ok(InsertOneResult { inserted_id: document.id }),
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                Err(RepositoryError::DuplicateKey(document.id.0))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn update_description(
        &self,
        id: &TopicId,
        description: &str,
    ) -> Result<UpdateResult, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let result = sqlx::query("UPDATE topics SET description = ? WHERE id = ?")
            .bind(description)
            .bind(&id.0)
            .execute(&mut *conn)
            .await?;

        Ok(UpdateResult { matched_count: result.rows_affected() })
    }

    async fn delete_one(&self, id: &TopicId) -> Result<DeleteResult, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let result =
            sqlx::query("DELETE FROM topics WHERE id = ?").bind(&id.0).execute(&mut *conn).await?;

        Ok(DeleteResult { deleted_count: result.rows_affected() })
    }
}
