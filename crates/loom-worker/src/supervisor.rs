//! The supervisor loop (SPEC_FULL.md §A, spec.md §5): ticks the
//! Dispatcher, runs the Worker for whatever it picks, applies the
//! resulting bead intents, and advances the Workflow Engine — the same
//! "pick one unit of work, drive it to completion, persist, repeat"
//! shape as the starting codebase's `main.rs` loop, generalized from one
//! hardcoded `beads_bridge`/`worktree_bridge` pipeline to the bead/agent/
//! workflow model.

use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use loom_core::action::BeadIntent;
use loom_core::bead::{context_keys, BeadType, Priority};
use loom_core::conversation::load_or_recreate;
use loom_core::error::WorkflowError;
use loom_core::provider::ProviderTransport;
use loom_core::store::KvStore;
use loom_core::workflow::{EdgeCondition, WorkflowType};
use loom_core::{
    Agent, AgentStatus, Bead, BeadStatus, Dispatcher, LoomConfig, LoomStore, LoopDetector,
    Persona, PersonaRegistry, ProviderRegistry, Worker, WorkflowEngine,
};

use crate::provider_env;

const DISPATCH_TICK_INTERVAL: Duration = Duration::from_secs(3);
const STUCK_SCAN_EVERY_N_TICKS: u32 = 20;

fn workflow_id_for(workflow_type: WorkflowType) -> &'static str {
    match workflow_type {
        WorkflowType::Bug => "bug",
        WorkflowType::Feature => "feature",
        WorkflowType::Ui => "ui",
    }
}

/// Maps a default persona to the `role_required` string it fills in the
/// default workflow definitions (`workflow::defaults`).
fn workflow_role_for_persona(persona_id: &str) -> &'static str {
    match persona_id {
        "implementer" => "Coder",
        "reviewer" => "Reviewer",
        "triager" => "QA",
        _ => "Coder",
    }
}

pub struct Supervisor<S: KvStore> {
    config: LoomConfig,
    store: LoomStore<S>,
    personas: PersonaRegistry,
    workflow: WorkflowEngine,
    providers: ProviderRegistry,
    detector: LoopDetector,
    transport: ProviderTransport,
    dispatcher: Dispatcher,
    worker: Worker,
    default_provider_id: String,
    api_key: String,
    ticks: u32,
}

impl<S: KvStore> Supervisor<S> {
    pub fn new(config: LoomConfig, store: LoomStore<S>) -> anyhow::Result<Self> {
        let mut personas = PersonaRegistry::new();
        for persona in loom_core::persona::default_personas() {
            personas.load(persona);
        }

        let mut workflow = WorkflowEngine::new();
        workflow.load_definition(loom_core::workflow::defaults::bug_workflow());
        workflow.load_definition(loom_core::workflow::defaults::feature_workflow());
        workflow.load_definition(loom_core::workflow::defaults::ui_workflow());

        let mut providers = ProviderRegistry::new();
        let bootstrap = provider_env::from_env();
        let default_provider_id = bootstrap.config.id.clone();
        let api_key = bootstrap.api_key;
        providers.register(bootstrap.config)?;
        providers.mark_available(&default_provider_id);

        let supervisor = Self {
            dispatcher: Dispatcher::new(config.max_dispatch_hops),
            worker: Worker::new(config.max_iterations, config.context_window_tokens),
            config,
            store,
            personas,
            workflow,
            providers,
            detector: LoopDetector::new(),
            transport: ProviderTransport::new(),
            default_provider_id,
            api_key,
            ticks: 0,
        };
        supervisor.bootstrap_agents()?;
        Ok(supervisor)
    }

    /// Seeds one idle agent per default persona if the store has none yet
    /// (first `serve` against an empty data directory). The role assigned
    /// to each is the workflow-node role string it can actually serve —
    /// `pm_review`/`design_review` stay unstaffed until an operator adds a
    /// PM/Designer agent, which is the approval gate working as intended
    /// rather than a gap.
    fn bootstrap_agents(&self) -> anyhow::Result<()> {
        if !self.store.list_agents()?.is_empty() {
            return Ok(());
        }
        for persona in loom_core::persona::default_personas() {
            let role = workflow_role_for_persona(&persona.id);
            let mut agent = Agent::new(
                format!("{}-1", persona.display_name),
                role,
                persona.id.clone(),
                "default",
            );
            agent.provider_id = Some(self.default_provider_id.clone());
            agent.status = AgentStatus::Idle;
            self.store.put_agent(&agent)?;
            info!(agent_id = %agent.id.0, persona = %persona.id, "bootstrapped agent");
        }
        Ok(())
    }

    /// Runs until SIGINT. Exit code mapping happens in `main.rs`.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(
            max_concurrent_agents = self.config.max_concurrent_agents,
            max_dispatch_hops = self.config.max_dispatch_hops,
            "supervisor starting"
        );
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("SIGINT received, shutting down supervisor");
                    return Ok(());
                }
                _ = tokio::time::sleep(DISPATCH_TICK_INTERVAL) => {
                    self.ticks += 1;
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "dispatcher tick failed");
                    }
                    if self.ticks % STUCK_SCAN_EVERY_N_TICKS == 0 {
                        if let Err(e) = self.scan_stuck_agents() {
                            warn!(error = %e, "stuck-agent scan failed");
                        }
                    }
                }
            }
        }
    }

    fn scan_stuck_agents(&self) -> anyhow::Result<()> {
        let mut agents = self.store.list_agents()?;
        let mut refs: Vec<&mut Agent> = agents.iter_mut().collect();
        let recovered = self.dispatcher.recover_stuck_agents(&mut refs, |_| None, Utc::now());
        for agent in agents.iter() {
            if recovered.contains(&agent.id) {
                self.store.put_agent(agent)?;
                warn!(agent_id = %agent.id.0, "recovered stuck agent");
            }
        }
        Ok(())
    }

    /// One dispatcher tick (§4.1): at most one (bead, agent) pair picked
    /// and run to completion before returning.
    async fn tick(&mut self) -> anyhow::Result<()> {
        let mut beads = self.store.list_beads()?;
        let mut agents = self.store.list_agents()?;

        beads.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));

        let candidate_index = beads.iter().position(|b| {
            b.is_ready(|_| true) && self.dispatcher.skip_reason(b, &agents.iter().collect::<Vec<_>>()).is_none()
        });

        let Some(index) = candidate_index else {
            return Ok(());
        };

        let mut bead = beads.remove(index);
        let required_role = self.required_role_for(&mut bead)?;

        let idle_agents: Vec<&Agent> = agents.iter().filter(|a| a.is_idle()).collect();
        let agent_id = match self
            .dispatcher
            .match_agent(&bead, required_role.as_deref(), &idle_agents, &self.personas)
        {
            Ok(agent) => agent.id,
            Err(reason) => {
                info!(bead_id = %bead.id, ?reason, "no agent available this tick");
                self.store.put_bead(&bead)?;
                return Ok(());
            }
        };

        if self.dispatcher.escalate_if_hop_limit_exceeded(&mut bead) {
            warn!(bead_id = %bead.id, "bead exceeded hop limit, escalating to CEO review");
            self.file_decision_bead(&bead, "hop-limit exceeded")?;
            self.store.put_bead(&bead)?;
            return Ok(());
        }

        let agent = agents.iter_mut().find(|a| a.id == agent_id).expect("matched above");
        let persona = self
            .personas
            .get(&agent.persona_ref)
            .cloned()
            .unwrap_or_else(|| default_persona_for(agent));

        self.dispatcher.begin_dispatch(&mut bead, agent);
        self.store.put_bead(&bead)?;
        self.store.put_agent(agent)?;

        let outcome = self.run_worker(&mut bead, agent, &persona).await;

        let mut condition = if outcome.success {
            EdgeCondition::Success
        } else {
            EdgeCondition::Failure
        };

        for intent in &outcome.bead_intents {
            match intent {
                BeadIntent::ApproveBead => condition = EdgeCondition::Approved,
                BeadIntent::RejectBead { .. } => condition = EdgeCondition::Rejected,
                BeadIntent::CloseBead | BeadIntent::Done { .. } => bead.status = BeadStatus::Closed,
                BeadIntent::CreateBead { title, description, bead_type } => {
                    self.create_followup_bead(&bead, title, description, bead_type)?;
                }
                BeadIntent::EscalateCeo { reason } => {
                    self.file_decision_bead(
                        &bead,
                        reason.as_deref().unwrap_or("agent requested CEO escalation"),
                    )?;
                }
            }
        }

        agent.return_to_idle();
        if let Some(execution_id) = bead.context_string(context_keys::WORKFLOW_EXECUTION_ID) {
            let execution_id: uuid::Uuid = execution_id.parse()?;
            match self.workflow.advance_workflow(
                execution_id,
                condition,
                Some(agent.id.0.to_string()),
                Default::default(),
            ) {
                Ok(()) => {
                    if let Some(exec) = self.workflow.execution_for_bead(bead.id) {
                        self.store.put_workflow_execution(exec)?;
                    }
                }
                Err(WorkflowError::AlreadyTerminal(_)) => {}
                Err(e) => warn!(bead_id = %bead.id, error = %e, "workflow advance failed"),
            }
        }
        bead.touch();

        self.store.put_bead(&bead)?;
        self.store.put_agent(agent)?;
        info!(
            bead_id = %bead.id,
            agent_id = %agent.id.0,
            success = outcome.success,
            terminal_reason = %outcome.terminal_reason,
            "dispatch complete"
        );
        Ok(())
    }

    fn required_role_for(&mut self, bead: &mut Bead) -> anyhow::Result<Option<String>> {
        let execution_id = match bead.context_string(context_keys::WORKFLOW_EXECUTION_ID) {
            Some(s) => s.parse::<uuid::Uuid>()?,
            None => {
                let workflow_type = loom_core::workflow::defaults::infer_workflow_type(&bead.title);
                let id = self.workflow.start_workflow(
                    bead.id,
                    workflow_id_for(workflow_type),
                    &bead.project_id,
                )?;
                bead.set_context(context_keys::WORKFLOW_EXECUTION_ID, id.to_string());
                id
            }
        };
        let node_key = self.workflow.get_current_node(execution_id)?.to_string();
        let workflow_type = self
            .workflow
            .execution_for_bead(bead.id)
            .map(|e| e.workflow_id.clone())
            .unwrap_or_default();
        Ok(self
            .workflow
            .definition(&workflow_type)
            .and_then(|def| def.node(&node_key))
            .and_then(|n| n.role_required.clone()))
    }

    async fn run_worker(&mut self, bead: &mut Bead, agent: &mut Agent, persona: &Persona) -> loom_core::WorkerOutcome {
        let existing = bead
            .context_string(context_keys::CONVERSATION_SESSION_ID)
            .and_then(|id| id.parse::<uuid::Uuid>().ok())
            .and_then(|id| self.store.get_conversation(&id.to_string()).ok().flatten());
        let mut session = load_or_recreate(existing, bead.id, &bead.project_id, &persona.mission);
        bead.set_context(context_keys::CONVERSATION_SESSION_ID, session.session_id.to_string());

        let provider_config = self
            .providers
            .get(&self.default_provider_id)
            .map(|e| e.config.clone())
            .expect("default provider registered at startup");

        let deadline = Utc::now() + chrono::Duration::seconds(900);
        let outcome = self
            .worker
            .run(
                &self.config.working_directory,
                bead,
                agent,
                persona,
                &provider_config,
                &self.api_key,
                &self.transport,
                &mut session,
                &mut self.detector,
                deadline,
            )
            .await;

        if let Some(entry) = self.providers.get_mut(&self.default_provider_id) {
            if outcome.error.is_some() {
                entry.health.record_failure();
            } else {
                entry.health.record_success(0.0);
            }
        }

        let _ = self.store.put_conversation(&session);
        outcome
    }

    fn create_followup_bead(
        &self,
        parent: &Bead,
        title: &str,
        description: &str,
        bead_type: &str,
    ) -> anyhow::Result<()> {
        let kind = match bead_type {
            "bug" => BeadType::Bug,
            "feature" => BeadType::Feature,
            "epic" => BeadType::Epic,
            "decision" => BeadType::Decision,
            "pr_review" => BeadType::PrReview,
            _ => BeadType::Task,
        };
        let mut followup = Bead::new(title, description, kind, Priority::P2, &parent.project_id);
        followup.blocked_by.insert(parent.id);
        self.store.put_bead(&followup)?;
        Ok(())
    }

    fn file_decision_bead(&self, bead: &Bead, reason: &str) -> anyhow::Result<()> {
        let context = bead
            .context_string(context_keys::WORKFLOW_EXECUTION_ID)
            .and_then(|id| id.parse::<uuid::Uuid>().ok())
            .and_then(|id| self.workflow.get_escalation_info(id).ok())
            .unwrap_or_default();
        let mut decision = Bead::new(
            format!("CEO review: {}", bead.title),
            format!("{reason}\n\n{context}"),
            BeadType::Decision,
            Priority::P0,
            &bead.project_id,
        );
        decision.tags.insert("auto-filed".to_string());
        decision.set_context("source_bead_id", bead.id.to_string());
        self.store.put_bead(&decision)?;
        error!(bead_id = %bead.id, decision_id = %decision.id, "filed decision bead for CEO review");
        Ok(())
    }
}

fn default_persona_for(agent: &Agent) -> Persona {
    loom_core::persona::default_personas()
        .into_iter()
        .find(|p| p.id == agent.persona_ref)
        .unwrap_or_else(|| {
            loom_core::persona::default_personas()
                .into_iter()
                .next()
                .expect("at least one default persona")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::store::memory::InMemoryKvStore;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::provider_env::tests::ENV_LOCK;

    fn supervisor_with(config: LoomConfig) -> Supervisor<InMemoryKvStore> {
        let store = LoomStore::new(InMemoryKvStore::new());
        Supervisor::new(config, store).unwrap()
    }

    /// A minimal single-response-per-connection HTTP/1.1 server used to
    /// drive the real `ProviderTransport` (reqwest) without a live
    /// inference backend. Each entry in `responses` answers one
    /// connection in order, then the connection is closed so the client
    /// opens a fresh one for the next request.
    async fn mock_chat_server(responses: Vec<(u16, &'static str, String)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for (status, reason, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0u8; 4096];
                loop {
                    match tokio::time::timeout(Duration::from_millis(200), socket.read(&mut buf))
                        .await
                    {
                        Ok(Ok(0)) | Err(_) => break,
                        Ok(Ok(_)) => continue,
                        Ok(Err(_)) => break,
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}/v1")
    }

    fn done_chat_response() -> String {
        r#"{"id":"chatcmpl-1","choices":[{"index":0,"message":{"role":"assistant","content":"{\"type\": \"done\", \"args\": {}}"},"finish_reason":"stop"}],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#.to_string()
    }

    fn supervisor_against(endpoint: &str, config: LoomConfig) -> Supervisor<InMemoryKvStore> {
        std::env::set_var("LOOM_PROVIDER_TYPE", "mock");
        std::env::set_var("LOOM_PROVIDER_ENDPOINT", endpoint);
        std::env::set_var("LOOM_PROVIDER_API_KEY", "not-needed");
        let sup = supervisor_with(config);
        std::env::remove_var("LOOM_PROVIDER_TYPE");
        std::env::remove_var("LOOM_PROVIDER_ENDPOINT");
        std::env::remove_var("LOOM_PROVIDER_API_KEY");
        sup
    }

    #[tokio::test]
    async fn tick_dispatches_runs_the_worker_and_closes_the_bead_on_done() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let endpoint = mock_chat_server(vec![(200, "OK", done_chat_response())]).await;
        let mut sup = supervisor_against(&endpoint, LoomConfig::default());

        let bead = Bead::new("Fix login crash", "null pointer on login", BeadType::Bug, Priority::P2, "proj");
        let bead_id = bead.id;
        sup.store.put_bead(&bead).unwrap();

        sup.tick().await.unwrap();

        let stored = sup.store.get_bead(bead_id).unwrap().unwrap();
        assert_eq!(stored.status, BeadStatus::Closed);
        assert!(stored.assigned_to.is_none());
        let agents = sup.store.list_agents().unwrap();
        assert!(agents.iter().all(|a| a.is_idle()));
    }

    #[tokio::test]
    async fn tick_retries_once_after_a_context_length_error_then_closes_the_bead() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let context_length_body =
            "This model's maximum context length exceeded, reduce the prompt".to_string();
        let endpoint = mock_chat_server(vec![
            (400, "Bad Request", context_length_body),
            (200, "OK", done_chat_response()),
        ])
        .await;
        let mut sup = supervisor_against(&endpoint, LoomConfig::default());

        let bead = Bead::new("Fix login crash", "null pointer on login", BeadType::Bug, Priority::P2, "proj");
        let bead_id = bead.id;
        sup.store.put_bead(&bead).unwrap();

        sup.tick().await.unwrap();

        let stored = sup.store.get_bead(bead_id).unwrap().unwrap();
        assert_eq!(stored.status, BeadStatus::Closed);
    }

    #[test]
    fn workflow_role_for_persona_covers_every_default_persona() {
        for persona in loom_core::persona::default_personas() {
            let role = workflow_role_for_persona(&persona.id);
            assert!(!role.is_empty());
        }
    }

    #[test]
    fn bootstrap_seeds_one_idle_agent_per_default_persona() {
        let sup = supervisor_with(LoomConfig::default());
        let agents = sup.store.list_agents().unwrap();
        assert_eq!(agents.len(), loom_core::persona::default_personas().len());
        assert!(agents.iter().all(|a| a.is_idle()));
        assert!(agents.iter().any(|a| a.role == "Coder"));
        assert!(agents.iter().any(|a| a.role == "QA"));
    }

    #[test]
    fn bootstrap_is_a_noop_when_store_already_has_agents() {
        let store = LoomStore::new(InMemoryKvStore::new());
        store
            .put_agent(&Agent::new("Manual", "Coder", "implementer", "default"))
            .unwrap();
        let sup = Supervisor::new(LoomConfig::default(), store).unwrap();
        assert_eq!(sup.store.list_agents().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tick_is_a_noop_when_there_are_no_beads() {
        let mut sup = supervisor_with(LoomConfig::default());
        sup.tick().await.unwrap();
        assert!(sup.store.list_beads().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tick_skips_a_bead_requiring_human_config() {
        let mut sup = supervisor_with(LoomConfig::default());
        let mut bead = Bead::new("Fix login crash", "d", BeadType::Bug, Priority::P2, "proj");
        bead.set_context(context_keys::REQUIRES_HUMAN_CONFIG, true);
        sup.store.put_bead(&bead).unwrap();

        sup.tick().await.unwrap();

        let stored = sup.store.get_bead(bead.id).unwrap().unwrap();
        assert_eq!(stored.status, BeadStatus::Open);
        assert!(stored.context_string(context_keys::WORKFLOW_EXECUTION_ID).is_none());
    }

    #[tokio::test]
    async fn tick_escalates_to_a_decision_bead_once_the_hop_limit_is_hit() {
        let mut config = LoomConfig::default();
        config.max_dispatch_hops = 1;
        let mut sup = supervisor_with(config);

        let bead = Bead::new("Fix login crash", "null pointer on login", BeadType::Bug, Priority::P2, "proj");
        let bead_id = bead.id;
        sup.store.put_bead(&bead).unwrap();

        sup.tick().await.unwrap();

        let stored = sup.store.get_bead(bead_id).unwrap().unwrap();
        assert_eq!(stored.priority, Priority::P0);
        assert!(stored.context_flag(context_keys::NEEDS_CEO_REVIEW));
        assert!(stored.assigned_to.is_none());

        let decisions: Vec<_> = sup
            .store
            .list_beads()
            .unwrap()
            .into_iter()
            .filter(|b| b.bead_type == BeadType::Decision)
            .collect();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].priority, Priority::P0);
        assert!(decisions[0].tags.contains("auto-filed"));
    }

    #[tokio::test]
    async fn tick_waits_when_no_agent_can_fill_the_required_role() {
        // pm_review has no default-persona counterpart, so a bead already
        // parked there must be left alone rather than panicking.
        let mut sup = supervisor_with(LoomConfig::default());
        let mut bead = Bead::new("Fix login crash", "d", BeadType::Bug, Priority::P2, "proj");
        let execution_id = sup.workflow.start_workflow(bead.id, "bug", "proj").unwrap();
        sup.workflow
            .advance_workflow(execution_id, EdgeCondition::Success, None, Default::default())
            .unwrap();
        sup.workflow
            .advance_workflow(execution_id, EdgeCondition::Success, None, Default::default())
            .unwrap();
        assert_eq!(sup.workflow.get_current_node(execution_id).unwrap(), "pm_review");
        bead.set_context(context_keys::WORKFLOW_EXECUTION_ID, execution_id.to_string());
        sup.store.put_bead(&bead).unwrap();

        sup.tick().await.unwrap();

        let stored = sup.store.get_bead(bead.id).unwrap().unwrap();
        assert_eq!(stored.status, BeadStatus::Open);
        assert!(stored.assigned_to.is_none());
    }
}
