//! Worker / Action Loop (§4.2): one dispatch of one bead by one agent —
//! load/seed the conversation, call the provider, parse the reply into
//! an action envelope, execute each action through the Router, record
//! observations, and iterate until a terminal action or the cap.
//!
//! Grounded on the starting codebase's harness `SessionManager` iteration
//! loop (`harness/session.rs`-style step/record/persist cycle) for the
//! overall shape, generalized from a fixed feature-completion loop to an
//! open-ended action loop bounded by `max_iterations` and the Loop
//! Detector.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::action::{parse_envelope, route_action, BeadIntent, RouterOutcome};
use crate::agent::Agent;
use crate::bead::Bead;
use crate::conversation::{ConversationSession, Role};
use crate::error::ProviderError;
use crate::loop_detector::LoopDetector;
use crate::persona::Persona;
use crate::provider::{ChatMessage, ChatRequest, ProviderConfig, ProviderTransport};

const DEFAULT_MAX_ITERATIONS: u32 = 25;

#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub success: bool,
    pub response_text: String,
    pub tokens_used: u64,
    pub terminal_reason: String,
    pub actions_executed: Vec<String>,
    pub bead_intents: Vec<BeadIntent>,
    pub error: Option<String>,
}

pub struct Worker {
    pub max_iterations: u32,
    pub context_window_tokens: u64,
}

impl Default for Worker {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            context_window_tokens: 128_000,
        }
    }
}

fn system_prompt_for(persona: &Persona) -> String {
    format!(
        "Mission: {}\nCharacter: {}\nAutonomy: {:?}\nAvailable actions: {}",
        persona.mission,
        persona.character,
        persona.autonomy,
        persona.action_vocabulary.join(", ")
    )
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn task_prompt_for(bead: &Bead) -> String {
    let tags: Vec<&str> = bead.tags.iter().map(String::as_str).collect();
    format!(
        "Task: {}\n\n{}\n\nTags: {}\n\nRespond with an ACTION line or a JSON action block.",
        bead.title,
        bead.description,
        tags.join(", ")
    )
}

impl Worker {
    pub fn new(max_iterations: u32, context_window_tokens: u64) -> Self {
        Self {
            max_iterations,
            context_window_tokens,
        }
    }

    /// Runs the full action loop (§4.2 steps 1-5). `deadline` bounds wall
    /// clock time; `api_key` is opaque and never logged.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        working_dir: &Path,
        bead: &Bead,
        agent: &mut Agent,
        persona: &Persona,
        provider_config: &ProviderConfig,
        api_key: &str,
        transport: &ProviderTransport,
        session: &mut ConversationSession,
        detector: &mut LoopDetector,
        deadline: DateTime<Utc>,
    ) -> WorkerOutcome {
        if session.messages.is_empty() {
            session.append(Role::System, system_prompt_for(persona));
        }
        session.append(Role::User, task_prompt_for(bead));
        session.truncate_to_budget(self.context_window_tokens);

        let mut actions_executed = Vec::new();
        let mut bead_intents = Vec::new();
        let mut tokens_used = 0u64;
        let mut terminal_reason: Option<String> = None;
        let mut response_text = String::new();
        let mut error: Option<String> = None;

        for _ in 0..self.max_iterations {
            if Utc::now() > deadline {
                terminal_reason = Some("deadline".to_string());
                break;
            }

            let request = ChatRequest {
                model: provider_config.model.clone(),
                messages: session
                    .messages
                    .iter()
                    .map(|m| ChatMessage {
                        role: role_str(m.role).to_string(),
                        content: m.content.clone(),
                    })
                    .collect(),
                temperature: 0.2,
                max_tokens: 4096,
                stream: None,
            };

            let reply = match transport
                .send_chat_completion(provider_config, api_key, request.clone())
                .await
            {
                Ok(resp) => resp,
                Err(ProviderError::ContextLengthError { .. }) => {
                    session.aggressive_truncate(self.context_window_tokens);
                    match transport
                        .send_chat_completion(provider_config, api_key, request)
                        .await
                    {
                        Ok(resp) => resp,
                        Err(e) => {
                            error = Some(e.to_string());
                            terminal_reason = Some("provider_error".to_string());
                            break;
                        }
                    }
                }
                Err(e) if Utc::now() > deadline => {
                    error = Some(e.to_string());
                    terminal_reason = Some("provider_error".to_string());
                    break;
                }
                Err(e) => {
                    session.append(
                        Role::User,
                        format!("The previous request failed: {e}. Please try again."),
                    );
                    continue;
                }
            };

            let choice_text = reply
                .choices
                .first()
                .map(|c| c.message.content.clone())
                .unwrap_or_default();
            tokens_used += reply.usage.total_tokens as u64;
            response_text = choice_text.clone();
            session.append(Role::Assistant, &choice_text);

            let envelope = match parse_envelope(&choice_text) {
                Some(e) => e,
                None => {
                    session.append(
                        Role::User,
                        "you did not produce an ACTION; reply with one".to_string(),
                    );
                    agent.heartbeat();
                    continue;
                }
            };

            let mut broke_on_terminal = false;
            for action in &envelope.actions {
                let loop_declared =
                    detector.record_action(&agent.id.to_string(), &action.action_type, action.args.clone());
                if loop_declared {
                    terminal_reason = Some("loop_detected".to_string());
                    broke_on_terminal = true;
                    break;
                }

                actions_executed.push(action.action_type.clone());
                match route_action(working_dir, action).await {
                    Ok(RouterOutcome::Value(value)) => {
                        session.append(
                            Role::User,
                            format!("action `{}` succeeded: {}", action.action_type, summarize(&value)),
                        );
                    }
                    Ok(RouterOutcome::BeadIntent(intent)) => {
                        bead_intents.push(intent);
                        session.append(
                            Role::User,
                            format!("action `{}` recorded", action.action_type),
                        );
                    }
                    Err(e) => {
                        session.append(
                            Role::User,
                            format!("action `{}` failed: {e}", action.action_type),
                        );
                    }
                }

                if action.is_terminal() {
                    terminal_reason = Some("done".to_string());
                    broke_on_terminal = true;
                    break;
                }
            }

            agent.heartbeat();
            if broke_on_terminal {
                break;
            }
        }

        let terminal_reason = terminal_reason.unwrap_or_else(|| "max_iterations".to_string());
        let success = matches!(
            terminal_reason.as_str(),
            "done"
        ) && error.is_none();

        WorkerOutcome {
            success,
            response_text,
            tokens_used,
            terminal_reason,
            actions_executed,
            bead_intents,
            error,
        }
    }
}

fn summarize(value: &serde_json::Value) -> String {
    let text = value.to_string();
    if text.len() > 500 {
        format!("{}... (truncated)", &text[..500])
    } else {
        text
    }
}
