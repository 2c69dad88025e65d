//! Natural-language front end for the topic store.
//!
//! Each turn makes two model calls at most: one to classify the requested
//! operation and one to extract its parameters. The reply is always a single
//! line of text for the user.
//!
//! # Flow
//!
//! 1. **Classification** (`classifier`) - utterance to [`topichub_core::Operation`]
//! 2. **Routing** (`router`) - operation to handler stage
//! 3. **Extraction** (`handlers`, `normalize`) - model reply to a validated document
//! 4. **Execution** - one store call through [`topichub_db::TopicStore`]
//!
//! The model never writes to the store directly. Its output is parsed,
//! checked for a single document and validated before anything is executed.

pub mod classifier;
pub mod conversation;
pub mod handlers;
pub mod llm;
pub mod normalize;
pub mod prompts;
pub mod router;
pub mod runtime;

pub use conversation::ConversationState;
pub use llm::{HttpLlmClient, LlmClient, ScriptedLlmClient};
pub use runtime::AgentRuntime;
