use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use topichub_core::Operation;

use crate::llm::LlmClient;
use crate::prompts;

/// Asks the model which operation an utterance requests.
pub struct OperationClassifier {
    llm: Arc<dyn LlmClient>,
}

impl OperationClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// One model call, no retries. Answers outside the supported set are `Invalid`.
    pub async fn classify(&self, utterance: &str) -> Result<Operation> {
        let answer = self.llm.complete(&prompts::classification(utterance)).await?;
        let operation = Operation::classify(&answer);

        info!(
            event_name = "agent.classifier.classified",
            operation = operation.as_str(),
            answer = %answer.trim(),
            "operation classified"
        );
        Ok(operation)
    }
}
