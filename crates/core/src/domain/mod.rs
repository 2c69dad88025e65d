pub mod operation;
pub mod topic;
