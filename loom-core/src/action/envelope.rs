//! Action envelope parsing (§9: "treat them as one logical parser with
//! two front-ends producing a common tagged-variant model"). The parser
//! is pure — no I/O — and accepts either a JSON block or the text form
//! `ACTION: <COMMAND> <args>` with `<<< ... >>>` delimited multi-line
//! payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionEnvelope {
    pub actions: Vec<Action>,
    #[serde(default)]
    pub notes: String,
}

pub const TERMINAL_ACTIONS: &[&str] =
    &["done", "close_bead", "escalate_ceo", "approve_bead", "reject_bead"];

impl Action {
    pub fn is_terminal(&self) -> bool {
        TERMINAL_ACTIONS.contains(&self.action_type.as_str())
    }
}

/// Parse an assistant reply into an `ActionEnvelope`. Tries a fenced or
/// bare JSON object first; falls back to the `ACTION: CMD ...` text form.
/// Returns `None` if no action is detected (the Worker should then
/// synthesize a nudge message and loop, per §4.2 step b).
pub fn parse_envelope(reply: &str) -> Option<ActionEnvelope> {
    if let Some(json_block) = extract_json_block(reply) {
        if let Ok(envelope) = serde_json::from_str::<ActionEnvelope>(&json_block) {
            if !envelope.actions.is_empty() {
                return Some(envelope);
            }
        }
        if let Ok(single) = serde_json::from_str::<Action>(&json_block) {
            return Some(ActionEnvelope {
                actions: vec![single],
                notes: String::new(),
            });
        }
    }

    parse_text_form(reply)
}

fn extract_json_block(reply: &str) -> Option<String> {
    if let Some(start) = reply.find("```json") {
        let after = &reply[start + 7..];
        if let Some(end) = after.find("```") {
            return Some(after[..end].trim().to_string());
        }
    }
    let trimmed = reply.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed.to_string());
    }
    None
}

/// `ACTION: <COMMAND> <args>` with `<<< ... >>>` delimited blocks for
/// multi-line payloads, e.g.:
///
/// ```text
/// ACTION: read_file path=src/main.rs
/// ACTION: edit_code path=src/main.rs
/// old_text: <<<
/// fn old() {}
/// >>>
/// new_text: <<<
/// fn new() {}
/// >>>
/// ```
fn parse_text_form(reply: &str) -> Option<ActionEnvelope> {
    let mut actions = Vec::new();
    let lines: Vec<&str> = reply.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();
        if let Some(rest) = line.strip_prefix("ACTION:") {
            let rest = rest.trim();
            let mut parts = rest.splitn(2, char::is_whitespace);
            let command = parts.next().unwrap_or("").to_string();
            let arg_str = parts.next().unwrap_or("").trim();

            let mut args = serde_json::Map::new();
            for kv in split_top_level_args(arg_str) {
                if let Some((k, v)) = kv.split_once('=') {
                    args.insert(k.trim().to_string(), Value::String(v.trim().to_string()));
                }
            }

            // Consume any `key: <<< ... >>>` blocks that follow, up to
            // the next ACTION: line.
            i += 1;
            while i < lines.len() && !lines[i].trim_start().starts_with("ACTION:") {
                let block_line = lines[i].trim_start();
                if let Some(key_part) = block_line.strip_suffix("<<<") {
                    let key = key_part.trim_end_matches(':').trim().to_string();
                    let mut body = Vec::new();
                    i += 1;
                    while i < lines.len() && lines[i].trim() != ">>>" {
                        body.push(lines[i]);
                        i += 1;
                    }
                    args.insert(key, Value::String(body.join("\n")));
                }
                i += 1;
            }

            actions.push(Action {
                action_type: command,
                args: Value::Object(args),
            });
            continue;
        }
        i += 1;
    }

    if actions.is_empty() {
        None
    } else {
        Some(ActionEnvelope {
            actions,
            notes: String::new(),
        })
    }
}

fn split_top_level_args(s: &str) -> Vec<String> {
    s.split_whitespace().map(String::from).collect()
}
