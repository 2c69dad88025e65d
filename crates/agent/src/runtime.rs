use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use topichub_db::TopicStore;

use crate::classifier::OperationClassifier;
use crate::conversation::ConversationState;
use crate::handlers::OperationHandlers;
use crate::llm::LlmClient;
use crate::router::{route, Stage};

/// Drives one utterance through classification, routing and a single handler.
pub struct AgentRuntime {
    classifier: OperationClassifier,
    handlers: OperationHandlers,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, store: Arc<dyn TopicStore>) -> Self {
        Self {
            classifier: OperationClassifier::new(llm.clone()),
            handlers: OperationHandlers::new(llm, store),
        }
    }

    /// Runs a full turn and records the reply in `state`.
    ///
    /// Only model failures surface as errors; the reply for a failed turn is
    /// left for the caller to report.
    pub async fn handle_turn(&self, state: &mut ConversationState, text: &str) -> Result<String> {
        let correlation_id = Uuid::new_v4();
        let span = info_span!("turn", %correlation_id);

        async move {
            state.begin_turn(text);
            let mut stage = Stage::DetectOperation;
            let mut reply = None;

            while stage != Stage::End {
                debug!(event_name = "agent.runtime.stage", stage = stage.as_str(), "entering stage");
                match stage {
                    Stage::DetectOperation => {
                        state.operation = Some(self.classifier.classify(text).await?);
                    }
                    Stage::Route => {
                        state.next_stage = state.operation.map(route);
                    }
                    Stage::Insert => reply = Some(self.handlers.insert(text).await?),
                    Stage::Find => reply = Some(self.handlers.find(text).await?),
                    Stage::Update => reply = Some(self.handlers.update(text).await?),
                    Stage::Delete => reply = Some(self.handlers.delete(text).await?),
                    Stage::InvalidOperation => reply = Some(self.handlers.invalid_operation()),
                    Stage::End => {}
                }
                stage = transition(stage, state);
            }

            let reply = reply.unwrap_or_else(|| self.handlers.invalid_operation());
            state.record_reply(reply.clone());
            Ok::<_, anyhow::Error>(reply)
        }
        .instrument(span)
        .await
    }
}

/// Next stage of the turn graph. Every handler is terminal.
pub fn transition(current: Stage, state: &ConversationState) -> Stage {
    match current {
        Stage::DetectOperation => Stage::Route,
        Stage::Route => {
            state.next_stage.filter(Stage::is_handler).unwrap_or(Stage::InvalidOperation)
        }
        Stage::Insert
        | Stage::Find
        | Stage::Update
        | Stage::Delete
        | Stage::InvalidOperation
        | Stage::End => Stage::End,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use topichub_core::TopicDocument;
    use topichub_db::InMemoryTopicStore;

    use super::{transition, AgentRuntime};
    use crate::conversation::ConversationState;
    use crate::llm::{Role, ScriptedLlmClient};
    use crate::router::Stage;

    #[test]
    fn route_falls_back_to_invalid_operation() {
        let mut state = ConversationState::new();
        assert_eq!(transition(Stage::DetectOperation, &state), Stage::Route);
        assert_eq!(transition(Stage::Route, &state), Stage::InvalidOperation);

        state.next_stage = Some(Stage::End);
        assert_eq!(transition(Stage::Route, &state), Stage::InvalidOperation);

        state.next_stage = Some(Stage::Delete);
        assert_eq!(transition(Stage::Route, &state), Stage::Delete);
    }

    #[test]
    fn handlers_are_terminal() {
        let state = ConversationState::new();
        for stage in [Stage::Insert, Stage::Find, Stage::Update, Stage::Delete, Stage::InvalidOperation] {
            assert_eq!(transition(stage, &state), Stage::End);
        }
    }

    #[tokio::test]
    async fn turn_runs_exactly_one_handler() {
        let llm = Arc::new(ScriptedLlmClient::new(["insert", "{'_id': 'politics'}"]));
        let store = Arc::new(InMemoryTopicStore::default());
        let runtime = AgentRuntime::new(llm.clone(), store.clone());
        let mut state = ConversationState::new();

        let reply = runtime.handle_turn(&mut state, "create politics").await.expect("turn");

        assert_eq!(reply, "Inserted document with ID: politics");
        assert_eq!(llm.requests().len(), 2);
        assert_eq!(store.snapshot().await, vec![TopicDocument::new("politics", None)]);
        assert_eq!(state.next_stage, Some(Stage::Insert));
        assert_eq!(state.turns().len(), 2);
        assert_eq!(state.turns()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn unclassified_turn_skips_extraction() {
        let llm = Arc::new(ScriptedLlmClient::new(["None"]));
        let runtime = AgentRuntime::new(llm.clone(), Arc::new(InMemoryTopicStore::default()));
        let mut state = ConversationState::new();

        let reply = runtime.handle_turn(&mut state, "what is the weather").await.expect("turn");

        assert_eq!(reply, "Invalid operation. Supported operations are: find, insert, update, delete");
        assert_eq!(llm.requests().len(), 1);
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn model_failure_fails_the_turn_without_a_reply() {
        let llm = Arc::new(ScriptedLlmClient::new(["delete"]));
        let runtime = AgentRuntime::new(llm, Arc::new(InMemoryTopicStore::default()));
        let mut state = ConversationState::new();

        assert!(runtime.handle_turn(&mut state, "remove politics").await.is_err());
        assert_eq!(state.turns().len(), 1);
    }
}
