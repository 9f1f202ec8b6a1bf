//! The three default workflow definitions loaded at startup (§6): bug,
//! feature, ui.

use super::types::{EdgeCondition, NodeKind, WorkflowDefinition, WorkflowEdge, WorkflowNode, WorkflowType};

fn node(key: &str, role: &str, kind: NodeKind) -> WorkflowNode {
    WorkflowNode {
        node_key: key.to_string(),
        role_required: Some(role.to_string()),
        kind,
        max_attempts: 3,
        timeout_secs: 900,
    }
}

fn edge(from: Option<&str>, to: Option<&str>, condition: EdgeCondition) -> WorkflowEdge {
    WorkflowEdge {
        from_node_key: from.map(String::from),
        to_node_key: to.map(String::from),
        condition,
    }
}

pub fn bug_workflow() -> WorkflowDefinition {
    WorkflowDefinition {
        id: "bug".to_string(),
        workflow_type: WorkflowType::Bug,
        project_id: None,
        cycle_cap: 3,
        nodes: vec![
            node("investigate", "QA", NodeKind::Task),
            node("qa_triage", "QA", NodeKind::Task),
            node("fix", "Coder", NodeKind::Task),
            node("pm_review", "PM", NodeKind::Approval),
            node("commit", "Coder", NodeKind::Commit),
        ],
        edges: vec![
            edge(None, Some("qa_triage"), EdgeCondition::Success),
            edge(Some("qa_triage"), Some("fix"), EdgeCondition::Success),
            edge(Some("qa_triage"), Some("investigate"), EdgeCondition::Failure),
            edge(Some("fix"), Some("pm_review"), EdgeCondition::Success),
            edge(Some("fix"), Some("investigate"), EdgeCondition::Failure),
            edge(Some("pm_review"), Some("commit"), EdgeCondition::Approved),
            edge(Some("pm_review"), Some("investigate"), EdgeCondition::Rejected),
            edge(Some("commit"), None, EdgeCondition::Success),
        ],
    }
}

pub fn feature_workflow() -> WorkflowDefinition {
    WorkflowDefinition {
        id: "feature".to_string(),
        workflow_type: WorkflowType::Feature,
        project_id: None,
        cycle_cap: 3,
        nodes: vec![
            node("design", "PM", NodeKind::Task),
            node("implement", "Coder", NodeKind::Task),
            node("review", "Reviewer", NodeKind::Approval),
            node("commit", "Coder", NodeKind::Commit),
        ],
        edges: vec![
            edge(None, Some("design"), EdgeCondition::Success),
            edge(Some("design"), Some("implement"), EdgeCondition::Success),
            edge(Some("implement"), Some("review"), EdgeCondition::Success),
            edge(Some("implement"), Some("design"), EdgeCondition::Failure),
            edge(Some("review"), Some("commit"), EdgeCondition::Approved),
            edge(Some("review"), Some("implement"), EdgeCondition::Rejected),
            edge(Some("commit"), None, EdgeCondition::Success),
        ],
    }
}

pub fn ui_workflow() -> WorkflowDefinition {
    WorkflowDefinition {
        id: "ui".to_string(),
        workflow_type: WorkflowType::Ui,
        project_id: None,
        cycle_cap: 3,
        nodes: vec![
            node("mockup", "Designer", NodeKind::Task),
            node("implement", "Coder", NodeKind::Task),
            node("design_review", "Designer", NodeKind::Approval),
            node("commit", "Coder", NodeKind::Commit),
        ],
        edges: vec![
            edge(None, Some("mockup"), EdgeCondition::Success),
            edge(Some("mockup"), Some("implement"), EdgeCondition::Success),
            edge(Some("implement"), Some("design_review"), EdgeCondition::Success),
            edge(Some("implement"), Some("mockup"), EdgeCondition::Failure),
            edge(Some("design_review"), Some("commit"), EdgeCondition::Approved),
            edge(Some("design_review"), Some("mockup"), EdgeCondition::Rejected),
            edge(Some("commit"), None, EdgeCondition::Success),
        ],
    }
}

/// Derive a default workflow type from a bead title by keyword scan
/// (§4.1 step 3): bug default; "feature"/"enhancement" -> feature;
/// "ui"/"design" -> ui.
pub fn infer_workflow_type(title: &str) -> WorkflowType {
    let lower = title.to_lowercase();
    if lower.contains("feature") || lower.contains("enhancement") {
        WorkflowType::Feature
    } else if lower.contains("ui") || lower.contains("design") {
        WorkflowType::Ui
    } else {
        WorkflowType::Bug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_defaults_to_bug() {
        assert_eq!(infer_workflow_type("NPE in login"), WorkflowType::Bug);
    }

    #[test]
    fn infer_detects_feature_keywords() {
        assert_eq!(
            infer_workflow_type("Add feature: dark mode"),
            WorkflowType::Feature
        );
        assert_eq!(
            infer_workflow_type("Enhancement request for search"),
            WorkflowType::Feature
        );
    }

    #[test]
    fn infer_detects_ui_keywords() {
        assert_eq!(infer_workflow_type("UI polish pass"), WorkflowType::Ui);
        assert_eq!(infer_workflow_type("Redesign the navbar"), WorkflowType::Ui);
    }

    #[test]
    fn each_default_workflow_has_exactly_one_start_edge() {
        for def in [bug_workflow(), feature_workflow(), ui_workflow()] {
            let start_edges = def
                .edges
                .iter()
                .filter(|e| e.from_node_key.is_none() && e.condition == EdgeCondition::Success)
                .count();
            assert_eq!(start_edges, 1, "workflow {} must have exactly one start edge", def.id);
        }
    }
}
