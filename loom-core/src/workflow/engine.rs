//! Workflow Engine (§4.4): the engine is a pure state transformer given
//! `(def, exec, condition) -> exec'` plus a history append (§9) — the same
//! shape as the starting codebase's `state_machine.rs`, generalized from a
//! single fixed transition table to per-`WorkflowDefinition` DAGs.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::bead::BeadId;
use crate::error::WorkflowError;

use super::types::{
    EdgeCondition, ExecutionStatus, WorkflowDefinition, WorkflowExecution, WorkflowHistoryEntry,
};

pub struct WorkflowEngine {
    definitions: HashMap<String, WorkflowDefinition>,
    executions: HashMap<Uuid, WorkflowExecution>,
    history: Vec<WorkflowHistoryEntry>,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowEngine {
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
            executions: HashMap::new(),
            history: Vec::new(),
        }
    }

    pub fn load_definition(&mut self, def: WorkflowDefinition) {
        self.definitions.insert(def.id.clone(), def);
    }

    pub fn definition(&self, id: &str) -> Option<&WorkflowDefinition> {
        self.definitions.get(id)
    }

    /// Invariant: exactly one active WorkflowExecution per bead.
    pub fn execution_for_bead(&self, bead_id: BeadId) -> Option<&WorkflowExecution> {
        self.executions
            .values()
            .find(|e| e.bead_id == bead_id && e.status == ExecutionStatus::Active)
    }

    pub fn start_workflow(
        &mut self,
        bead_id: BeadId,
        workflow_id: &str,
        project_id: &str,
    ) -> Result<Uuid, WorkflowError> {
        let def = self
            .definitions
            .get(workflow_id)
            .ok_or_else(|| WorkflowError::UnknownNode(workflow_id.to_string(), String::new()))?;
        let start = def
            .start_node_key()
            .ok_or_else(|| WorkflowError::NoMatchingEdge {
                from: String::new(),
                condition: EdgeCondition::Success.to_string(),
            })?
            .to_string();
        let exec = WorkflowExecution::new(bead_id, workflow_id.to_string(), project_id.to_string(), start);
        let id = exec.id;
        self.executions.insert(id, exec);
        Ok(id)
    }

    pub fn get_current_node<'a>(
        &'a self,
        execution_id: Uuid,
    ) -> Result<&'a str, WorkflowError> {
        let exec = self.require_execution(execution_id)?;
        Ok(&exec.current_node_key)
    }

    fn require_execution(&self, execution_id: Uuid) -> Result<&WorkflowExecution, WorkflowError> {
        self.executions
            .get(&execution_id)
            .ok_or_else(|| WorkflowError::NoExecution(execution_id.to_string()))
    }

    /// Advance the given execution on `condition`. A no-op (returning
    /// `AlreadyTerminal`) if the execution has already reached a terminal
    /// status — advancing a completed/failed/escalated execution never
    /// silently succeeds.
    pub fn advance_workflow(
        &mut self,
        execution_id: Uuid,
        condition: EdgeCondition,
        agent_id: Option<String>,
        result_data: HashMap<String, Value>,
    ) -> Result<(), WorkflowError> {
        let workflow_id = {
            let exec = self.require_execution(execution_id)?;
            if exec.status.is_terminal() {
                return Err(WorkflowError::AlreadyTerminal(execution_id.to_string()));
            }
            exec.workflow_id.clone()
        };
        let def = self
            .definitions
            .get(&workflow_id)
            .ok_or_else(|| WorkflowError::UnknownNode(workflow_id.clone(), String::new()))?
            .clone();

        let exec = self
            .executions
            .get_mut(&execution_id)
            .expect("checked present above");

        let edge = def
            .edge(&exec.current_node_key, condition)
            .ok_or_else(|| WorkflowError::NoMatchingEdge {
                from: exec.current_node_key.clone(),
                condition: condition.to_string(),
            })?;

        let attempt = exec.current_node_attempts;
        let from_node = exec.current_node_key.clone();

        match &edge.to_node_key {
            None => {
                // Terminal sentinel.
                exec.status = ExecutionStatus::Completed;
            }
            Some(to_node) => {
                if def.node(to_node).is_none() {
                    return Err(WorkflowError::UnknownNode(workflow_id, to_node.clone()));
                }
                if exec.visited_nodes.contains(to_node) {
                    exec.cycle_count += 1;
                }
                exec.current_node_key = to_node.clone();
                exec.current_node_attempts = 0;
                exec.visited_nodes.push(to_node.clone());

                if exec.cycle_count >= def.cycle_cap {
                    exec.status = ExecutionStatus::Escalated;
                }
            }
        }
        exec.updated_at = Utc::now();

        self.history.push(WorkflowHistoryEntry {
            execution_id,
            at_node_key: from_node,
            attempt,
            condition,
            agent_id,
            timestamp: Utc::now(),
            result_data,
        });
        Ok(())
    }

    /// Increments attempts; advances with `failure` if under the
    /// per-node cap, else escalates.
    pub fn fail_node(
        &mut self,
        execution_id: Uuid,
        agent_id: Option<String>,
        error_message: &str,
    ) -> Result<(), WorkflowError> {
        let (workflow_id, node_key, attempts) = {
            let exec = self.require_execution(execution_id)?;
            if exec.status.is_terminal() {
                return Err(WorkflowError::AlreadyTerminal(execution_id.to_string()));
            }
            (
                exec.workflow_id.clone(),
                exec.current_node_key.clone(),
                exec.current_node_attempts,
            )
        };
        let def = self
            .definitions
            .get(&workflow_id)
            .ok_or_else(|| WorkflowError::UnknownNode(workflow_id.clone(), node_key.clone()))?;
        let max_attempts = def
            .node(&node_key)
            .ok_or_else(|| WorkflowError::UnknownNode(workflow_id.clone(), node_key.clone()))?
            .max_attempts;

        let new_attempts = attempts + 1;
        if new_attempts >= max_attempts {
            let exec = self
                .executions
                .get_mut(&execution_id)
                .expect("checked present above");
            exec.status = ExecutionStatus::Escalated;
            exec.updated_at = Utc::now();
            return Err(WorkflowError::MaxAttemptsExceeded(node_key));
        }

        {
            let exec = self
                .executions
                .get_mut(&execution_id)
                .expect("checked present above");
            exec.current_node_attempts = new_attempts;
        }
        let mut data = HashMap::new();
        data.insert("error".to_string(), Value::String(error_message.to_string()));
        self.advance_workflow(execution_id, EdgeCondition::Failure, agent_id, data)
    }

    /// Escalation artifact (§4.4): a human-readable summary for a CEO
    /// review bead, built from this execution's last five history entries.
    pub fn get_escalation_info(&self, execution_id: Uuid) -> Result<String, WorkflowError> {
        let exec = self.require_execution(execution_id)?;
        let mut entries: Vec<&WorkflowHistoryEntry> = self
            .history
            .iter()
            .filter(|h| h.execution_id == execution_id)
            .collect();
        entries.sort_by_key(|h| h.timestamp);
        let recent: Vec<String> = entries
            .iter()
            .rev()
            .take(5)
            .map(|h| format!("{} @ {} -> {}", h.condition, h.at_node_key, h.attempt))
            .collect();
        Ok(format!(
            "Bead {} escalated in workflow {} after {} cycle(s) at node `{}` (attempt {}).\nRecent history:\n{}",
            exec.bead_id,
            exec.workflow_id,
            exec.cycle_count,
            exec.current_node_key,
            exec.current_node_attempts,
            recent.join("\n"),
        ))
    }

    pub fn history_for(&self, execution_id: Uuid) -> Vec<&WorkflowHistoryEntry> {
        self.history
            .iter()
            .filter(|h| h.execution_id == execution_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{NodeKind, WorkflowEdge, WorkflowNode, WorkflowType};

    fn bug_workflow() -> WorkflowDefinition {
        WorkflowDefinition {
            id: "bug".to_string(),
            workflow_type: WorkflowType::Bug,
            project_id: None,
            cycle_cap: 3,
            nodes: vec![
                WorkflowNode {
                    node_key: "investigate".to_string(),
                    role_required: Some("QA".to_string()),
                    kind: NodeKind::Task,
                    max_attempts: 3,
                    timeout_secs: 900,
                },
                WorkflowNode {
                    node_key: "qa_triage".to_string(),
                    role_required: Some("QA".to_string()),
                    kind: NodeKind::Task,
                    max_attempts: 3,
                    timeout_secs: 900,
                },
                WorkflowNode {
                    node_key: "pm_review".to_string(),
                    role_required: Some("PM".to_string()),
                    kind: NodeKind::Approval,
                    max_attempts: 3,
                    timeout_secs: 900,
                },
            ],
            edges: vec![
                WorkflowEdge {
                    from_node_key: None,
                    to_node_key: Some("qa_triage".to_string()),
                    condition: EdgeCondition::Success,
                },
                WorkflowEdge {
                    from_node_key: Some("qa_triage".to_string()),
                    to_node_key: Some("pm_review".to_string()),
                    condition: EdgeCondition::Success,
                },
                WorkflowEdge {
                    from_node_key: Some("pm_review".to_string()),
                    to_node_key: None,
                    condition: EdgeCondition::Approved,
                },
                WorkflowEdge {
                    from_node_key: Some("pm_review".to_string()),
                    to_node_key: Some("investigate".to_string()),
                    condition: EdgeCondition::Rejected,
                },
                WorkflowEdge {
                    from_node_key: Some("qa_triage".to_string()),
                    to_node_key: Some("qa_triage".to_string()),
                    condition: EdgeCondition::Failure,
                },
            ],
        }
    }

    #[test]
    fn happy_path_bug_workflow_advances_to_pm_review() {
        let mut engine = WorkflowEngine::new();
        engine.load_definition(bug_workflow());
        let bead = BeadId::new();
        let exec_id = engine.start_workflow(bead, "bug", "proj").unwrap();
        assert_eq!(engine.get_current_node(exec_id).unwrap(), "qa_triage");

        engine
            .advance_workflow(exec_id, EdgeCondition::Success, None, HashMap::new())
            .unwrap();

        let exec = engine.require_execution(exec_id).unwrap();
        assert_eq!(exec.current_node_key, "pm_review");
        assert_eq!(exec.cycle_count, 0);
        assert_eq!(engine.history_for(exec_id).len(), 1);
    }

    #[test]
    fn rejection_loops_back_and_increments_cycle_count() {
        let mut engine = WorkflowEngine::new();
        engine.load_definition(bug_workflow());
        let bead = BeadId::new();
        let exec_id = engine.start_workflow(bead, "bug", "proj").unwrap();
        engine
            .advance_workflow(exec_id, EdgeCondition::Success, None, HashMap::new())
            .unwrap();
        engine
            .advance_workflow(
                exec_id,
                EdgeCondition::Rejected,
                None,
                HashMap::new(),
            )
            .unwrap();
        let exec = engine.require_execution(exec_id).unwrap();
        assert_eq!(exec.current_node_key, "investigate");
        assert_eq!(exec.cycle_count, 0); // investigate visited once so far (start doesn't count it)
    }

    #[test]
    fn cycle_cap_triggers_escalation() {
        let mut engine = WorkflowEngine::new();
        engine.load_definition(bug_workflow());
        let bead = BeadId::new();
        let exec_id = engine.start_workflow(bead, "bug", "proj").unwrap();
        // Revisit qa_triage via its own failure self-loop repeatedly.
        for _ in 0..4 {
            let _ = engine.advance_workflow(exec_id, EdgeCondition::Failure, None, HashMap::new());
        }
        let exec = engine.require_execution(exec_id).unwrap();
        assert_eq!(exec.status, ExecutionStatus::Escalated);
    }

    #[test]
    fn advancing_terminal_execution_is_a_noop_error() {
        let mut engine = WorkflowEngine::new();
        engine.load_definition(bug_workflow());
        let bead = BeadId::new();
        let exec_id = engine.start_workflow(bead, "bug", "proj").unwrap();
        engine
            .advance_workflow(exec_id, EdgeCondition::Success, None, HashMap::new())
            .unwrap();
        engine
            .advance_workflow(exec_id, EdgeCondition::Approved, None, HashMap::new())
            .unwrap();
        let result = engine.advance_workflow(exec_id, EdgeCondition::Success, None, HashMap::new());
        assert!(matches!(result, Err(WorkflowError::AlreadyTerminal(_))));
    }

    #[test]
    fn fail_node_escalates_past_max_attempts() {
        let mut engine = WorkflowEngine::new();
        let mut def = bug_workflow();
        def.nodes[1].max_attempts = 1;
        engine.load_definition(def);
        let bead = BeadId::new();
        let exec_id = engine.start_workflow(bead, "bug", "proj").unwrap();
        let result = engine.fail_node(exec_id, None, "boom");
        assert!(matches!(result, Err(WorkflowError::MaxAttemptsExceeded(_))));
        let exec = engine.require_execution(exec_id).unwrap();
        assert_eq!(exec.status, ExecutionStatus::Escalated);
    }
}
