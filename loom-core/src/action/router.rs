//! Action Router (§4.7): validates each action against its schema and
//! executes it through the appropriate operator — Files, Commands, Git —
//! or, for actions that mutate bead/workflow state, returns a
//! [`BeadIntent`] for the Worker to apply against the store it owns.
//!
//! Grounded on the starting codebase's tool-dispatch match in
//! `tools/mod.rs` (one arm per tool name, each arm its own small function)
//! generalized from the rig-core `Tool` trait's per-type dispatch to the
//! dual-format [`super::envelope::Action`] vocabulary.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::error::RouterError;
use crate::git;

use super::envelope::Action;
use super::matcher::apply_edit;
use super::safe_path::safe_join;
use super::shell;

/// The 20-action vocabulary (§4.2) falls into five operator families.
/// `RouterOutcome::BeadIntent` defers bead/workflow mutation to the
/// caller, which owns the store and workflow engine.
#[derive(Debug, Clone)]
pub enum RouterOutcome {
    Value(Value),
    BeadIntent(BeadIntent),
}

#[derive(Debug, Clone)]
pub enum BeadIntent {
    CreateBead { title: String, description: String, bead_type: String },
    CloseBead,
    ApproveBead,
    RejectBead { reason: Option<String> },
    EscalateCeo { reason: Option<String> },
    Done { summary: Option<String> },
}

fn arg_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, RouterError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| RouterError::ValidationError(format!("missing required arg `{key}`")))
}

fn opt_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(String::from)
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '|' | '^' | '$' | '[' | ']' | '{' | '}' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('$');
    out
}

fn walk_tree(working_dir: &Path) -> Vec<PathBuf> {
    ignore::WalkBuilder::new(working_dir)
        .hidden(false)
        .build()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
        .map(|e| {
            e.path()
                .strip_prefix(working_dir)
                .unwrap_or(e.path())
                .to_path_buf()
        })
        .collect()
}

/// Routes a single action to its operator. `async` because the
/// `run_command` family awaits a `spawn_blocking` subprocess; file and
/// git operators are synchronous underneath but share this signature so
/// the Worker's action loop can await every action uniformly.
pub async fn route_action(working_dir: &Path, action: &Action) -> Result<RouterOutcome, RouterError> {
    let args = &action.args;
    match action.action_type.as_str() {
        "read_tree" => {
            let files: Vec<String> = walk_tree(working_dir)
                .into_iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect();
            Ok(RouterOutcome::Value(json!({ "files": files })))
        }

        "read_file" => {
            let path = arg_str(args, "path")?;
            let resolved = safe_join(working_dir, path)?;
            let content = std::fs::read_to_string(&resolved)?;
            Ok(RouterOutcome::Value(json!({ "content": content })))
        }

        "search_text" | "grep" => {
            let query = arg_str(args, "query")?;
            let re = regex::Regex::new(query)
                .map_err(|e| RouterError::ValidationError(e.to_string()))?;
            let mut matches = Vec::new();
            for rel in walk_tree(working_dir) {
                let full = working_dir.join(&rel);
                if let Ok(content) = std::fs::read_to_string(&full) {
                    for (lineno, line) in content.lines().enumerate() {
                        if re.is_match(line) {
                            matches.push(json!({
                                "path": rel.to_string_lossy(),
                                "line": lineno + 1,
                                "text": line,
                            }));
                        }
                    }
                }
            }
            Ok(RouterOutcome::Value(json!({ "matches": matches })))
        }

        "glob" => {
            let pattern = arg_str(args, "pattern")?;
            let re = regex::Regex::new(&glob_to_regex(pattern))
                .map_err(|e| RouterError::ValidationError(e.to_string()))?;
            let files: Vec<String> = walk_tree(working_dir)
                .into_iter()
                .map(|p| p.to_string_lossy().to_string())
                .filter(|p| re.is_match(p))
                .collect();
            Ok(RouterOutcome::Value(json!({ "files": files })))
        }

        "edit_code" => {
            let path = arg_str(args, "path")?;
            let old_text = arg_str(args, "old_text")?;
            let new_text = arg_str(args, "new_text")?;
            let resolved = safe_join(working_dir, path)?;
            let content = std::fs::read_to_string(&resolved)?;
            let result = apply_edit(&content, old_text, new_text);
            if !result.ok {
                return Err(RouterError::MatcherMiss);
            }
            std::fs::write(&resolved, &result.new_content)?;
            Ok(RouterOutcome::Value(json!({
                "strategy": result.strategy,
            })))
        }

        "write_file" => {
            let path = arg_str(args, "path")?;
            let content = arg_str(args, "content")?;
            let resolved = safe_join(working_dir, path)?;
            if let Some(parent) = resolved.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&resolved, content)?;
            Ok(RouterOutcome::Value(json!({ "written": true })))
        }

        "move_file" | "rename_file" => {
            let from = arg_str(args, "from")?;
            let to = arg_str(args, "to")?;
            let resolved_from = safe_join(working_dir, from)?;
            let resolved_to = safe_join(working_dir, to)?;
            if let Some(parent) = resolved_to.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::rename(&resolved_from, &resolved_to)?;
            Ok(RouterOutcome::Value(json!({ "moved": true })))
        }

        "delete_file" => {
            let path = arg_str(args, "path")?;
            let resolved = safe_join(working_dir, path)?;
            std::fs::remove_file(&resolved)?;
            Ok(RouterOutcome::Value(json!({ "deleted": true })))
        }

        "run_command" | "bash" | "run_tests" | "run_linter" | "build" => {
            let command = arg_str(args, "command")?;
            let result = shell::run_command(working_dir, command).await?;
            Ok(RouterOutcome::Value(json!({
                "exit_code": result.exit_code,
                "stdout": result.stdout,
                "stderr": result.stderr,
            })))
        }

        "git_status" => {
            let result = git::status(working_dir)?;
            Ok(RouterOutcome::Value(json!({ "status": result.stdout })))
        }

        "git_commit" => {
            let message = arg_str(args, "message")?;
            let result = git::commit(working_dir, message)?;
            Ok(RouterOutcome::Value(json!({ "output": result.stdout })))
        }

        "git_push" => {
            let remote = args.get("remote").and_then(Value::as_str).unwrap_or("origin");
            let branch = arg_str(args, "branch")?;
            let result = git::push(working_dir, remote, branch)?;
            Ok(RouterOutcome::Value(json!({ "output": result.stdout })))
        }

        "create_bead" => Ok(RouterOutcome::BeadIntent(BeadIntent::CreateBead {
            title: arg_str(args, "title")?.to_string(),
            description: opt_str(args, "description").unwrap_or_default(),
            bead_type: opt_str(args, "bead_type").unwrap_or_else(|| "task".to_string()),
        })),

        "close_bead" => Ok(RouterOutcome::BeadIntent(BeadIntent::CloseBead)),

        "approve_bead" => Ok(RouterOutcome::BeadIntent(BeadIntent::ApproveBead)),

        "reject_bead" => Ok(RouterOutcome::BeadIntent(BeadIntent::RejectBead {
            reason: opt_str(args, "reason"),
        })),

        "escalate_ceo" => Ok(RouterOutcome::BeadIntent(BeadIntent::EscalateCeo {
            reason: opt_str(args, "reason"),
        })),

        "done" => Ok(RouterOutcome::BeadIntent(BeadIntent::Done {
            summary: opt_str(args, "summary"),
        })),

        other => Err(RouterError::ValidationError(format!(
            "unknown action type `{other}`"
        ))),
    }
}
