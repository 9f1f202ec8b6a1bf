//! Workflow DAG data model (§3, §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::bead::BeadId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    Bug,
    Feature,
    Ui,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Task,
    Approval,
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeCondition {
    Success,
    Failure,
    Approved,
    Rejected,
    Timeout,
    Escalated,
}

impl std::fmt::Display for EdgeCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EdgeCondition::Success => "success",
            EdgeCondition::Failure => "failure",
            EdgeCondition::Approved => "approved",
            EdgeCondition::Rejected => "rejected",
            EdgeCondition::Timeout => "timeout",
            EdgeCondition::Escalated => "escalated",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub node_key: String,
    pub role_required: Option<String>,
    pub kind: NodeKind,
    pub max_attempts: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEdge {
    /// Empty for the start edge.
    pub from_node_key: Option<String>,
    /// Empty for the terminal sentinel.
    pub to_node_key: Option<String>,
    pub condition: EdgeCondition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub workflow_type: WorkflowType,
    pub project_id: Option<String>,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
    pub cycle_cap: u32,
}

impl WorkflowDefinition {
    pub fn node(&self, key: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.node_key == key)
    }

    pub fn start_node_key(&self) -> Option<&str> {
        self.edges
            .iter()
            .find(|e| e.from_node_key.is_none() && e.condition == EdgeCondition::Success)
            .and_then(|e| e.to_node_key.as_deref())
    }

    pub fn edge(&self, from: &str, condition: EdgeCondition) -> Option<&WorkflowEdge> {
        self.edges.iter().find(|e| {
            e.from_node_key.as_deref() == Some(from) && e.condition == condition
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Active,
    Completed,
    Failed,
    Escalated,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub bead_id: BeadId,
    pub workflow_id: String,
    pub project_id: String,
    pub status: ExecutionStatus,
    pub current_node_key: String,
    pub cycle_count: u32,
    pub current_node_attempts: u32,
    pub visited_nodes: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowExecution {
    pub fn new(bead_id: BeadId, workflow_id: String, project_id: String, start_node: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            bead_id,
            workflow_id,
            project_id,
            status: ExecutionStatus::Active,
            current_node_key: start_node.clone(),
            cycle_count: 0,
            current_node_attempts: 0,
            visited_nodes: vec![start_node],
            started_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowHistoryEntry {
    pub execution_id: Uuid,
    pub at_node_key: String,
    pub attempt: u32,
    pub condition: EdgeCondition,
    pub agent_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub result_data: HashMap<String, Value>,
}
