use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Insert,
    Find,
    Update,
    Delete,
    Invalid,
}

impl Operation {
    /// Operations the agent can carry out, in the order they are offered to the oracle.
    pub const SUPPORTED: [Operation; 4] =
        [Operation::Find, Operation::Insert, Operation::Update, Operation::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Find => "find",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Invalid => "invalid",
        }
    }

    /// Case-insensitive match against the supported set; everything else is `Invalid`.
    pub fn classify(answer: &str) -> Self {
        answer.parse().unwrap_or(Self::Invalid)
    }

    pub fn supported_names() -> String {
        Self::SUPPORTED.iter().map(Operation::as_str).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unsupported operation `{0}`")]
pub struct UnsupportedOperation(pub String);

impl FromStr for Operation {
    type Err = UnsupportedOperation;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "find" => Ok(Self::Find),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(UnsupportedOperation(other.to_string())),
        }
    }
}
