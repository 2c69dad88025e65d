use topichub_core::Operation;

/// Nodes of the per-turn processing graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    DetectOperation,
    Route,
    Insert,
    Find,
    Update,
    Delete,
    InvalidOperation,
    End,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DetectOperation => "operation_detection",
            Self::Route => "router",
            Self::Insert => "topic_insert",
            Self::Find => "topic_find",
            Self::Update => "topic_update",
            Self::Delete => "topic_delete",
            Self::InvalidOperation => "invalid_operation",
            Self::End => "end",
        }
    }

    pub fn is_handler(&self) -> bool {
        matches!(
            self,
            Self::Insert | Self::Find | Self::Update | Self::Delete | Self::InvalidOperation
        )
    }
}

/// Handler stage for a classified operation.
pub fn route(operation: Operation) -> Stage {
    match operation {
        Operation::Insert => Stage::Insert,
        Operation::Find => Stage::Find,
        Operation::Update => Stage::Update,
        Operation::Delete => Stage::Delete,
        Operation::Invalid => Stage::InvalidOperation,
    }
}
