//! Prompt construction for the classifier and the operation handlers.

use topichub_core::Operation;

use crate::llm::ChatMessage;

/// Separates multiple candidate values in model replies.
pub const DELIMITER: char = '|';

pub fn classification(utterance: &str) -> Vec<ChatMessage> {
    let supported = Operation::SUPPORTED
        .iter()
        .map(|operation| format!("'{}'", operation.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    vec![ChatMessage::system(format!(
        "Detect the document store operation requested by the user: {utterance}\n\
         Choose between [{supported}]. Respond with the operation name only.\n\
         If no operation is detected, respond with None."
    ))]
}

pub fn insert(utterance: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(format!(
        "You generate insert documents for a 'topics' collection.\n\
         Natural language request: {utterance}\n\
         Rules:\n\
         1. _id must be a single lowercase word (politics, culture, economics, etc.)\n\
         2. Only include a 'description' field if one is explicitly mentioned\n\
         3. If multiple topics are mentioned, separate them by a {DELIMITER}\n\
         4. Output format: {{'_id': 'topic_name', 'description': 'description_text'}}\n\
         5. If no valid topic can be extracted, respond with {{}}\n\
         6. Respond with ONLY the JSON document, no additional text"
    ))]
}

pub fn find(utterance: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(format!(
        "You generate queries for a 'topics' collection whose documents have the fields \
         '_id' and 'description'.\n\
         Natural language request: {utterance}\n\
         Rules:\n\
         1. Provide the FILTER object, surrounded by {{}}\n\
         2. If a PROJECTION is needed, provide it after the FILTER, separated by '{DELIMITER}', also surrounded by {{}}\n\
         3. In the PROJECTION include fields with 1 and exclude fields with 0\n\
         4. Supported filter operators: $eq, $ne, $in, $nin, $exists, $regex (with $options 'i'), $and, $or\n\
         5. If no filter can be generated, respond with {{}}\n\
         6. Example output: {{'_id': 'politics'}} {DELIMITER} {{'description': 1}}\n\
         7. Respond with ONLY the JSON objects, no words such as 'query' or 'filter' and no explanations"
    ))]
}

pub fn update(utterance: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(format!(
        "You extract update parameters for a 'topics' collection.\n\
         Natural language request: {utterance}\n\
         Extract the document _id and the new description.\n\
         Rules:\n\
         1. Only the 'description' field can be updated\n\
         2. Both _id and description must be clearly identifiable from the request\n\
         3. Output format: {{'_id': 'topic_name', 'description': 'new_description_text'}}\n\
         4. If multiple topics are mentioned, separate them by a {DELIMITER}\n\
         5. If either _id or description cannot be extracted, respond with {{}}\n\
         6. Respond with ONLY the JSON document, no additional text"
    ))]
}

pub fn delete(utterance: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(format!(
        "You extract the _id of the document to delete from a 'topics' collection.\n\
         Natural language request: {utterance}\n\
         Rules:\n\
         1. The _id must be clearly identifiable from the request\n\
         2. If multiple topics are mentioned, separate them by a {DELIMITER}\n\
         3. Output format: {{'_id': 'topic_name'}}\n\
         4. If no valid _id can be extracted, respond with {{}}\n\
         5. Respond with ONLY the JSON document, no additional text"
    ))]
}
