pub mod defaults;
pub mod engine;
pub mod types;

pub use engine::WorkflowEngine;
pub use types::{
    EdgeCondition, ExecutionStatus, NodeKind, WorkflowDefinition, WorkflowEdge, WorkflowExecution,
    WorkflowHistoryEntry, WorkflowNode, WorkflowType,
};
