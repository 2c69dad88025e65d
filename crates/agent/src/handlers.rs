use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use topichub_core::{
    Operation, OperationError, TopicDocument, TopicId, DESCRIPTION_FIELD, ID_FIELD,
};
use topichub_db::{RepositoryError, TopicStore};

use crate::llm::LlmClient;
use crate::normalize::normalize;
use crate::prompts::{self, DELIMITER};

const EMPTY_PROJECTION: &str = "{}";

/// Extraction plus store execution for each supported operation.
///
/// Handlers only fail when the model call itself fails. Every error between the
/// model reply and the store is turned into the reply text.
pub struct OperationHandlers {
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn TopicStore>,
}

impl OperationHandlers {
    pub fn new(llm: Arc<dyn LlmClient>, store: Arc<dyn TopicStore>) -> Self {
        Self { llm, store }
    }

    pub async fn insert(&self, utterance: &str) -> Result<String> {
        let raw = self.llm.complete(&prompts::insert(utterance)).await?;
        Ok(self.settle(Operation::Insert, self.try_insert(&raw).await))
    }

    pub async fn find(&self, utterance: &str) -> Result<String> {
        let raw = self.llm.complete(&prompts::find(utterance)).await?;
        Ok(self.settle(Operation::Find, self.try_find(&raw).await))
    }

    pub async fn update(&self, utterance: &str) -> Result<String> {
        let raw = self.llm.complete(&prompts::update(utterance)).await?;
        Ok(self.settle(Operation::Update, self.try_update(&raw).await))
    }

    pub async fn delete(&self, utterance: &str) -> Result<String> {
        let raw = self.llm.complete(&prompts::delete(utterance)).await?;
        Ok(self.settle(Operation::Delete, self.try_delete(&raw).await))
    }

    pub fn invalid_operation(&self) -> String {
        format!("Invalid operation. Supported operations are: {}", Operation::supported_names())
    }

    async fn try_insert(&self, raw: &str) -> Result<String, OperationError> {
        let fields = normalize(single_document(raw)?)?;
        let id = required_id(&fields)?;
        let description = optional_string(&fields, DESCRIPTION_FIELD)?;

        let ignored = fields
            .keys()
            .filter(|key| *key != ID_FIELD && *key != DESCRIPTION_FIELD)
            .cloned()
            .collect::<Vec<_>>();
        if !ignored.is_empty() {
            debug!(
                event_name = "agent.handler.insert.fields_ignored",
                fields = ?ignored,
                "dropping fields other than _id and description"
            );
        }

        let result = self
            .store
            .insert_one(TopicDocument::new(id, description))
            .await
            .map_err(store_failure)?;

        info!(
            event_name = "agent.handler.insert.completed",
            topic_id = %result.inserted_id,
            "topic inserted"
        );
        Ok(format!("Inserted document with ID: {}", result.inserted_id))
    }

    async fn try_find(&self, raw: &str) -> Result<String, OperationError> {
        let (filter_text, projection_text) = split_query(raw)?;
        let filter = normalize(filter_text)?;
        let projection = normalize(projection_text)?;

        let found = self.store.find_one(&filter, &projection).await.map_err(store_failure)?;

        info!(
            event_name = "agent.handler.find.completed",
            matched = found.is_some(),
            "topic lookup finished"
        );
        Ok(match found {
            Some(document) => format!(
                "Document retrieved with filter: {}: {}",
                Value::Object(filter),
                Value::Object(document)
            ),
            None => "No document matched the query.".to_string(),
        })
    }

    async fn try_update(&self, raw: &str) -> Result<String, OperationError> {
        let fields = normalize(single_document(raw)?)?;
        let id = TopicId(required_id(&fields)?);
        let description = required_string(&fields, DESCRIPTION_FIELD)?;

        let result =
            self.store.update_description(&id, &description).await.map_err(store_failure)?;

        info!(
            event_name = "agent.handler.update.completed",
            topic_id = %id,
            matched_count = result.matched_count,
            "topic update finished"
        );
        Ok(if result.matched_count > 0 {
            format!("Successfully updated description for document with ID: {id}")
        } else {
            format!("No document found with ID: {id}")
        })
    }

    async fn try_delete(&self, raw: &str) -> Result<String, OperationError> {
        let fields = normalize(single_document(raw)?)?;
        let id = TopicId(required_id(&fields)?);

        let result = self.store.delete_one(&id).await.map_err(store_failure)?;

        info!(
            event_name = "agent.handler.delete.completed",
            topic_id = %id,
            deleted_count = result.deleted_count,
            "topic delete finished"
        );
        Ok(if result.deleted_count > 0 {
            format!("Successfully deleted document with ID: {id}")
        } else {
            format!("No document found with ID: {id}")
        })
    }

    fn settle(&self, operation: Operation, outcome: Result<String, OperationError>) -> String {
        match outcome {
            Ok(reply) => reply,
            Err(error) if error.needs_attention() => {
                warn!(
                    event_name = "agent.handler.store_failed",
                    operation = operation.as_str(),
                    error = %error,
                    "store call failed"
                );
                error.user_message(operation)
            }
            Err(error) => {
                debug!(
                    event_name = "agent.handler.rejected",
                    operation = operation.as_str(),
                    error_kind = error.kind(),
                    error = %error,
                    "operation ended without a store change"
                );
                error.user_message(operation)
            }
        }
    }
}

/// The reply must name exactly one document.
fn single_document(raw: &str) -> Result<&str, OperationError> {
    let count = raw.split(DELIMITER).count();
    if count > 1 {
        return Err(OperationError::MultipleDocuments { count });
    }
    Ok(raw.trim())
}

fn split_query(raw: &str) -> Result<(&str, &str), OperationError> {
    let segments = raw.split(DELIMITER).collect::<Vec<_>>();
    match segments.as_slice() {
        [filter] => Ok((filter.trim(), EMPTY_PROJECTION)),
        [filter, projection] => Ok((filter.trim(), projection.trim())),
        _ => Err(OperationError::Parse(format!(
            "expected a filter and at most one projection, got {} segments",
            segments.len()
        ))),
    }
}

fn required_id(fields: &Map<String, Value>) -> Result<String, OperationError> {
    required_string(fields, ID_FIELD).map(|id| id.trim().to_string())
}

/// Present and not blank. The value itself is kept as extracted.
fn required_string(fields: &Map<String, Value>, field: &'static str) -> Result<String, OperationError> {
    match fields.get(field) {
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(OperationError::Validation { field }),
    }
}

fn optional_string(
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, OperationError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(OperationError::Validation { field }),
    }
}

fn store_failure(error: RepositoryError) -> OperationError {
    OperationError::Store(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use topichub_core::{OperationError, TopicDocument};
    use topichub_db::InMemoryTopicStore;

    use super::{single_document, split_query, OperationHandlers};
    use crate::llm::ScriptedLlmClient;

    fn handlers(
        replies: &[&str],
        documents: Vec<TopicDocument>,
    ) -> (OperationHandlers, Arc<InMemoryTopicStore>) {
        let store = Arc::new(InMemoryTopicStore::with_documents(documents));
        let llm = Arc::new(ScriptedLlmClient::new(replies.iter().copied()));
        (OperationHandlers::new(llm, store.clone()), store)
    }

    #[test]
    fn delimiter_means_multiple_documents() {
        assert_eq!(
            single_document("{'_id': 'a'} | {'_id': 'b'}"),
            Err(OperationError::MultipleDocuments { count: 2 })
        );
        assert_eq!(single_document(" {'_id': 'a'} "), Ok("{'_id': 'a'}"));
    }

    #[test]
    fn query_split_defaults_projection() {
        assert_eq!(split_query("{'_id': 'a'}"), Ok(("{'_id': 'a'}", "{}")));
        assert_eq!(
            split_query("{'_id': 'a'} | {'description': 1}"),
            Ok(("{'_id': 'a'}", "{'description': 1}"))
        );
        assert!(matches!(split_query("{} | {} | {}"), Err(OperationError::Parse(_))));
    }

    #[tokio::test]
    async fn insert_writes_only_id_and_description() {
        let (handlers, store) =
            handlers(&["{'_id': 'politics', 'description': 'Elections', 'rank': 1}"], Vec::new());

        let reply = handlers.insert("create politics about elections").await.expect("insert");

        assert_eq!(reply, "Inserted document with ID: politics");
        assert_eq!(
            store.snapshot().await,
            vec![TopicDocument::new("politics", Some("Elections".to_string()))]
        );
    }

    #[tokio::test]
    async fn insert_rejects_multiple_documents_without_writing() {
        let (handlers, store) = handlers(&["{'_id': 'politics'} | {'_id': 'culture'}"], Vec::new());

        let reply = handlers.insert("create politics and culture").await.expect("insert");

        assert_eq!(reply, "Multiple documents detected. Please insert one document at a time.");
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn insert_without_identifier_is_reported() {
        let (handlers, store) = handlers(&["{}"], Vec::new());

        let reply = handlers.insert("create something").await.expect("insert");

        assert_eq!(reply, "Could not determine a valid ID to insert.");
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_insert_is_reported_not_retried() {
        let (handlers, store) =
            handlers(&["{'_id': 'politics'}"], vec![TopicDocument::new("politics", None)]);

        let reply = handlers.insert("create politics").await.expect("insert");

        assert!(reply.starts_with("Error inserting document: duplicate key"), "reply: {reply}");
        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn unparseable_reply_is_reported() {
        let (handlers, _store) = handlers(&["politics, please"], Vec::new());

        let reply = handlers.delete("remove politics").await.expect("delete");

        assert!(reply.starts_with("Could not understand the model response"), "reply: {reply}");
    }

    #[tokio::test]
    async fn find_applies_filter_and_projection() {
        let (handlers, _store) = handlers(
            &["{'_id': 'economics'} | {'description': 1, '_id': 0}", "{'_id': 'sports'}"],
            vec![
                TopicDocument::new("politics", Some("Elections".to_string())),
                TopicDocument::new("economics", Some("Markets".to_string())),
            ],
        );

        let reply = handlers.find("describe economics").await.expect("find");
        assert_eq!(
            reply,
            r#"Document retrieved with filter: {"_id":"economics"}: {"description":"Markets"}"#
        );

        let missing = handlers.find("show sports").await.expect("find");
        assert_eq!(missing, "No document matched the query.");
    }

    #[tokio::test]
    async fn find_with_unsupported_operator_reports_store_error() {
        let (handlers, _store) = handlers(&["{'_id': {'$where': 'x'}}"], Vec::new());

        let reply = handlers.find("anything").await.expect("find");

        assert!(reply.starts_with("Error querying documents: invalid query"), "reply: {reply}");
    }

    #[tokio::test]
    async fn regex_options_without_pattern_is_a_query_error() {
        let (handlers, _store) = handlers(
            &["{'_id': {'$options': 'i'}}"],
            vec![TopicDocument::new("politics", None)],
        );

        let reply = handlers.find("anything case insensitive").await.expect("find");

        assert!(reply.starts_with("Error querying documents: invalid query"), "reply: {reply}");
    }

    #[tokio::test]
    async fn update_distinguishes_missing_documents() {
        let (handlers, store) = handlers(
            &[
                "{'_id': 'politics', 'description': 'Parliament'}",
                "{'_id': 'sports', 'description': 'Football'}",
                "{'_id': 'politics'}",
            ],
            vec![TopicDocument::new("politics", None)],
        );

        assert_eq!(
            handlers.update("describe politics as parliament").await.expect("update"),
            "Successfully updated description for document with ID: politics"
        );
        assert_eq!(
            handlers.update("describe sports as football").await.expect("update"),
            "No document found with ID: sports"
        );
        assert_eq!(
            handlers.update("change politics").await.expect("update"),
            "Could not determine both ID and new description."
        );
        assert_eq!(
            store.snapshot().await,
            vec![TopicDocument::new("politics", Some("Parliament".to_string()))]
        );
    }

    #[tokio::test]
    async fn update_keeps_the_extracted_description_verbatim() {
        let (handlers, store) = handlers(
            &[r#"{"_id": " politics ", "description": "  spaced  "}"#],
            vec![TopicDocument::new("politics", None)],
        );

        assert_eq!(
            handlers.update("describe politics").await.expect("update"),
            "Successfully updated description for document with ID: politics"
        );
        assert_eq!(
            store.snapshot().await,
            vec![TopicDocument::new("politics", Some("  spaced  ".to_string()))]
        );
    }

    #[tokio::test]
    async fn blank_description_is_not_an_update() {
        let (handlers, store) = handlers(
            &["{'_id': 'politics', 'description': '   '}"],
            vec![TopicDocument::new("politics", None)],
        );

        assert_eq!(
            handlers.update("clear politics").await.expect("update"),
            "Could not determine both ID and new description."
        );
        assert_eq!(store.snapshot().await, vec![TopicDocument::new("politics", None)]);
    }

    #[tokio::test]
    async fn update_and_delete_reject_multiple_documents() {
        let (handlers, store) = handlers(
            &[
                "{'_id': 'politics', 'description': 'x'} | {'_id': 'culture', 'description': 'y'}",
                "{'_id': 'politics'} | {'_id': 'culture'}",
            ],
            vec![TopicDocument::new("politics", None), TopicDocument::new("culture", None)],
        );

        assert_eq!(
            handlers.update("describe both").await.expect("update"),
            "Multiple documents detected. Please update one document at a time."
        );
        assert_eq!(
            handlers.delete("remove both").await.expect("delete"),
            "Multiple documents detected. Please delete one document at a time."
        );
        assert_eq!(store.snapshot().await.len(), 2);
        assert_eq!(
            store.snapshot().await[0],
            TopicDocument::new("politics", None),
            "no description was written"
        );
    }

    #[tokio::test]
    async fn delete_reports_whether_a_document_was_removed() {
        let (handlers, store) = handlers(
            &["{'id': 'politics'}", "{'_id': 'politics'}", "{}"],
            vec![TopicDocument::new("politics", None)],
        );

        assert_eq!(
            handlers.delete("remove politics").await.expect("delete"),
            "Successfully deleted document with ID: politics"
        );
        assert_eq!(
            handlers.delete("remove politics again").await.expect("delete"),
            "No document found with ID: politics"
        );
        assert_eq!(
            handlers.delete("remove it").await.expect("delete"),
            "Could not determine a valid ID to delete."
        );
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_operation_lists_supported_operations() {
        let (handlers, _store) = handlers(&[], Vec::new());
        assert_eq!(
            handlers.invalid_operation(),
            "Invalid operation. Supported operations are: find, insert, update, delete"
        );
    }

    #[tokio::test]
    async fn model_failure_propagates_out_of_the_handler() {
        let (handlers, _store) = handlers(&[], Vec::new());
        assert!(handlers.insert("create politics").await.is_err());
    }
}
