use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which the identifier is stored in every topic document.
pub const ID_FIELD: &str = "_id";
/// The only mutable field of a topic document.
pub const DESCRIPTION_FIELD: &str = "description";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicId(pub String);

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDocument {
    #[serde(rename = "_id")]
    pub id: TopicId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TopicDocument {
    pub fn new(id: impl Into<String>, description: Option<String>) -> Self {
        Self { id: TopicId(id.into()), description }
    }

    /// Document shape as seen by filters and projections.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(ID_FIELD.to_string(), Value::String(self.id.0.clone()));
        if let Some(description) = &self.description {
            fields.insert(DESCRIPTION_FIELD.to_string(), Value::String(description.clone()));
        }
        fields
    }
}
