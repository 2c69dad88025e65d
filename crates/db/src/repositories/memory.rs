use serde_json::{Map, Value};
use tokio::sync::RwLock;

use topichub_core::{TopicDocument, TopicId};

use super::{DeleteResult, InsertOneResult, RepositoryError, TopicStore, UpdateResult};
use crate::query::DocumentQuery;

/// Insertion-ordered store kept in memory.
#[derive(Default)]
pub struct InMemoryTopicStore {
    documents: RwLock<Vec<TopicDocument>>,
}

impl InMemoryTopicStore {
    pub fn with_documents(documents: Vec<TopicDocument>) -> Self {
        Self { documents: RwLock::new(documents) }
    }

    pub async fn snapshot(&self) -> Vec<TopicDocument> {
        self.documents.read().await.clone()
    }
}

#[async_trait::async_trait]
impl TopicStore for InMemoryTopicStore {
    async fn find_one(
        &self,
        filter: &Map<String, Value>,
        projection: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, RepositoryError> {
        let query = DocumentQuery::parse(filter, projection)?;
        let documents = self.documents.read().await;
        Ok(query.first_match(documents.iter().cloned()))
    }

    async fn insert_one(
        &self,
        document: TopicDocument,
    ) -> Result<InsertOneResult, RepositoryError> {
        let mut documents = self.documents.write().await;
        if documents.iter().any(|existing| existing.id == document.id) {
            return Err(RepositoryError::DuplicateKey(document.id.0));
        }
        let inserted_id = document.id.clone();
        documents.push(document);
        Ok(InsertOneResult { inserted_id })
    }

    async fn update_description(
        &self,
        id: &TopicId,
        description: &str,
    ) -> Result<UpdateResult, RepositoryError> {
        let mut documents = self.documents.write().await;
        let matched = documents.iter_mut().find(|document| &document.id == id);
        let matched_count = match matched {
            Some(document) => {
                document.description = Some(description.to_string());
                1
            }
            None => 0,
        };
        Ok(UpdateResult { matched_count })
    }

    async fn delete_one(&self, id: &TopicId) -> Result<DeleteResult, RepositoryError> {
        let mut documents = self.documents.write().await;
        let position = documents.iter().position(|document| &document.id == id);
        let deleted_count = match position {
            Some(index) => {
                documents.remove(index);
                1
            }
            None => 0,
        };
        Ok(DeleteResult { deleted_count })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use topichub_core::{TopicDocument, TopicId};

    use crate::repositories::{InMemoryTopicStore, RepositoryError, TopicStore};

    #[tokio::test]
    async fn in_memory_store_keeps_insertion_order() {
        let store = InMemoryTopicStore::default();
        store.insert_one(TopicDocument::new("politics", None)).await.expect("insert politics");
        store.insert_one(TopicDocument::new("culture", None)).await.expect("insert culture");

        let first = store.find_one(&Map::new(), &Map::new()).await.expect("find");
        assert_eq!(first.map(Value::Object), Some(json!({"_id": "politics"})));
    }

    #[tokio::test]
    async fn in_memory_store_rejects_duplicates_and_tracks_counts() {
        let store =
            InMemoryTopicStore::with_documents(vec![TopicDocument::new("politics", None)]);

        let duplicate = store.insert_one(TopicDocument::new("politics", None)).await;
        assert!(matches!(duplicate, Err(RepositoryError::DuplicateKey(_))));

        let id = TopicId("politics".to_string());
        assert_eq!(store.update_description(&id, "Elections").await.expect("update").matched_count, 1);
        assert_eq!(
            store.snapshot().await,
            vec![TopicDocument::new("politics", Some("Elections".to_string()))]
        );
        assert_eq!(store.delete_one(&id).await.expect("delete").deleted_count, 1);
        assert!(store.snapshot().await.is_empty());
    }
}
