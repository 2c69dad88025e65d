use topichub_core::Operation;

use crate::llm::Role;
use crate::router::Stage;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// State threaded through every stage of a turn.
///
/// `operation` and `next_stage` belong to the current turn and are cleared when
/// the next one begins; the turn history keeps growing for the whole session.
#[derive(Clone, Debug, Default)]
pub struct ConversationState {
    turns: Vec<Turn>,
    pub operation: Option<Operation>,
    pub next_stage: Option<Stage>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_turn(&mut self, utterance: impl Into<String>) {
        self.operation = None;
        self.next_stage = None;
        self.turns.push(Turn { role: Role::User, content: utterance.into() });
    }

    pub fn record_reply(&mut self, reply: impl Into<String>) {
        self.turns.push(Turn { role: Role::Assistant, content: reply.into() });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}
