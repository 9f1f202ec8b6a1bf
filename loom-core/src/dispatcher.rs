//! Dispatcher (§4.1): each tick picks at most one (bead, agent) pair,
//! matches it against the current workflow node's required role (falling
//! back to persona-hint matching), enforces the hop limit, and runs
//! stuck-agent recovery.
//!
//! Grounded on the starting codebase's `router.rs` pre-routing
//! classifier (single-pass skip-rule evaluation producing a reason
//! string per candidate) generalized from complexity scoring to bead
//! dispatch eligibility.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::agent::{Agent, AgentStatus};
use crate::bead::{context_keys, Bead, BeadStatus};
use crate::error::DispatcherError;
use crate::loop_detector::ProgressMetrics;
use crate::persona::PersonaRegistry;
use crate::workflow::WorkflowEngine;

const DEFAULT_MAX_HOPS: u32 = 20;
const STUCK_HEARTBEAT_MINUTES: i64 = 10;
const STUCK_PROGRESS_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    P0Priority,
    RequiresHumanConfig,
    AlreadyRun,
    AgentBusy,
    WorkflowRoleNotAvailable,
    NoMatch,
}

#[derive(Debug, Clone)]
pub struct DispatchPlan {
    pub bead_id: crate::bead::BeadId,
    pub agent_id: crate::agent::AgentId,
}

pub struct Dispatcher {
    pub max_hops: u32,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
        }
    }
}

impl Dispatcher {
    pub fn new(max_hops: u32) -> Self {
        Self { max_hops }
    }

    /// Step 2 of the tick algorithm: the ordered skip rules. `Ok(None)`
    /// means the bead is a dispatch candidate.
    pub fn skip_reason(&self, bead: &Bead, agents_by_id: &[&Agent]) -> Option<SkipReason> {
        if bead.priority == crate::bead::Priority::P0
            && !bead.tags.contains("auto-filed")
            && !bead.context_flag("ceo-approved")
        {
            return Some(SkipReason::P0Priority);
        }
        if bead.context_flag(context_keys::REQUIRES_HUMAN_CONFIG) {
            return Some(SkipReason::RequiresHumanConfig);
        }
        let already_run = bead.context.contains_key(context_keys::LAST_RUN_AT);
        let redispatch_requested = bead.context_flag(context_keys::REDISPATCH_REQUESTED);
        if already_run && !redispatch_requested {
            return Some(SkipReason::AlreadyRun);
        }
        if let Some(assigned) = &bead.assigned_to {
            let busy = agents_by_id
                .iter()
                .find(|a| &a.id.to_string() == assigned)
                .map(|a| a.status != AgentStatus::Idle)
                .unwrap_or(false);
            if busy {
                return Some(SkipReason::AgentBusy);
            }
        }
        None
    }

    /// Step 3: find an idle agent for `bead`, preferring the workflow
    /// node's required role and falling back to persona-hint matching.
    pub fn match_agent<'a>(
        &self,
        bead: &Bead,
        required_role: Option<&str>,
        idle_agents: &'a [&'a Agent],
        personas: &PersonaRegistry,
    ) -> Result<&'a Agent, SkipReason> {
        if let Some(role) = required_role {
            return idle_agents
                .iter()
                .find(|a| a.role == role)
                .copied()
                .ok_or(SkipReason::WorkflowRoleNotAvailable);
        }

        let hint_source = format!("{} {}", bead.title, bead.description);
        if let Some(persona) = personas.find_by_hint(&hint_source) {
            if let Some(agent) = idle_agents.iter().find(|a| a.persona_ref == persona.id) {
                return Ok(agent);
            }
        }
        idle_agents
            .iter()
            .find(|a| a.matches_hint(&hint_source))
            .copied()
            .ok_or(SkipReason::NoMatch)
    }

    /// Step 4: hop-limit escalation. Returns `true` if the bead was
    /// escalated (and must not be executed this tick).
    pub fn escalate_if_hop_limit_exceeded(&self, bead: &mut Bead) -> bool {
        let count = bead.dispatch_count() + 1;
        bead.set_context(context_keys::DISPATCH_COUNT, count);
        if count >= self.max_hops {
            bead.priority = crate::bead::Priority::P0;
            bead.assigned_to = None;
            bead.set_context(context_keys::NEEDS_CEO_REVIEW, true);
            return true;
        }
        false
    }

    /// Step 5: claim the bead/agent pair for execution.
    pub fn begin_dispatch(&self, bead: &mut Bead, agent: &mut Agent) {
        agent.start_work(bead.id);
        bead.status = BeadStatus::InProgress;
        bead.assigned_to = Some(agent.id.to_string());
        bead.set_context(context_keys::LAST_RUN_AT, Utc::now().to_rfc3339());
        bead.set_context(context_keys::REDISPATCH_REQUESTED, false);
    }

    /// Step 6: record the outcome and advance the workflow.
    pub fn complete_dispatch(
        &self,
        bead: &mut Bead,
        agent: &mut Agent,
        workflow: &mut WorkflowEngine,
        execution_id: uuid::Uuid,
        succeeded: bool,
        agent_id_str: &str,
    ) -> Result<(), DispatcherError> {
        agent.return_to_idle();
        let condition = if succeeded {
            crate::workflow::EdgeCondition::Success
        } else {
            crate::workflow::EdgeCondition::Failure
        };
        workflow.advance_workflow(
            execution_id,
            condition,
            Some(agent_id_str.to_string()),
            std::collections::HashMap::new(),
        )?;
        bead.touch();
        Ok(())
    }

    /// Periodic stuck-agent scan (§4.1 "Stuck-agent recovery"): agents
    /// whose heartbeat and bead progress have both gone stale are
    /// reclaimed for the next tick rather than left holding a bead
    /// forever.
    pub fn recover_stuck_agents(
        &self,
        agents: &mut [&mut Agent],
        progress_by_agent: impl Fn(crate::agent::AgentId) -> Option<ProgressMetrics>,
        now: DateTime<Utc>,
    ) -> Vec<crate::agent::AgentId> {
        let mut recovered = Vec::new();
        for agent in agents.iter_mut() {
            if agent.status != AgentStatus::Working {
                continue;
            }
            let heartbeat_stale =
                now - agent.last_heartbeat_at > ChronoDuration::minutes(STUCK_HEARTBEAT_MINUTES);
            let progress_stale = progress_by_agent(agent.id)
                .map(|m| !m.has_recent_progress())
                .unwrap_or(true)
                && now
                    - progress_by_agent(agent.id)
                        .and_then(|m| m.last_progress_at)
                        .unwrap_or(now - ChronoDuration::minutes(STUCK_PROGRESS_MINUTES + 1))
                    > ChronoDuration::minutes(STUCK_PROGRESS_MINUTES);
            if heartbeat_stale && progress_stale {
                agent.return_to_idle();
                recovered.push(agent.id);
            }
        }
        recovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bead::{BeadType, Priority};

    fn make_bead() -> Bead {
        Bead::new("Fix the thing", "desc", BeadType::Bug, Priority::P2, "proj")
    }

    #[test]
    fn p0_bead_without_auto_filed_tag_is_skipped() {
        let dispatcher = Dispatcher::default();
        let bead = Bead::new("t", "d", BeadType::Bug, Priority::P0, "proj");
        assert_eq!(dispatcher.skip_reason(&bead, &[]), Some(SkipReason::P0Priority));
    }

    #[test]
    fn p0_bead_with_ceo_approval_is_not_skipped_for_that_reason() {
        let dispatcher = Dispatcher::default();
        let mut bead = Bead::new("t", "d", BeadType::Bug, Priority::P0, "proj");
        bead.set_context("ceo-approved", true);
        assert_ne!(dispatcher.skip_reason(&bead, &[]), Some(SkipReason::P0Priority));
    }

    #[test]
    fn requires_human_config_is_skipped() {
        let dispatcher = Dispatcher::default();
        let mut bead = make_bead();
        bead.set_context(context_keys::REQUIRES_HUMAN_CONFIG, true);
        assert_eq!(
            dispatcher.skip_reason(&bead, &[]),
            Some(SkipReason::RequiresHumanConfig)
        );
    }

    #[test]
    fn already_run_without_redispatch_is_skipped() {
        let dispatcher = Dispatcher::default();
        let mut bead = make_bead();
        bead.set_context(context_keys::LAST_RUN_AT, "2026-01-01T00:00:00Z");
        assert_eq!(dispatcher.skip_reason(&bead, &[]), Some(SkipReason::AlreadyRun));
    }

    #[test]
    fn already_run_with_redispatch_requested_is_not_skipped() {
        let dispatcher = Dispatcher::default();
        let mut bead = make_bead();
        bead.set_context(context_keys::LAST_RUN_AT, "2026-01-01T00:00:00Z");
        bead.set_context(context_keys::REDISPATCH_REQUESTED, true);
        assert_eq!(dispatcher.skip_reason(&bead, &[]), None);
    }

    #[test]
    fn hop_limit_escalates_at_max_hops() {
        let dispatcher = Dispatcher::new(2);
        let mut bead = make_bead();
        assert!(!dispatcher.escalate_if_hop_limit_exceeded(&mut bead));
        assert!(dispatcher.escalate_if_hop_limit_exceeded(&mut bead));
        assert_eq!(bead.priority, Priority::P0);
        assert!(bead.assigned_to.is_none());
    }

    #[test]
    fn match_agent_prefers_required_role() {
        let dispatcher = Dispatcher::default();
        let bead = make_bead();
        let mut a1 = Agent::new("A", "coder", "implementer", "proj");
        a1.status = AgentStatus::Idle;
        let mut a2 = Agent::new("B", "reviewer", "reviewer", "proj");
        a2.status = AgentStatus::Idle;
        let personas = PersonaRegistry::new();
        let agents = vec![&a1, &a2];
        let found = dispatcher
            .match_agent(&bead, Some("reviewer"), &agents, &personas)
            .unwrap();
        assert_eq!(found.role, "reviewer");
    }

    #[test]
    fn match_agent_falls_back_to_persona_hint_when_no_role_required() {
        let dispatcher = Dispatcher::default();
        let mut bead = Bead::new("Ask the Reviewer to check this", "d", BeadType::Task, Priority::P2, "proj");
        bead.touch();
        let mut reviewer = Agent::new("Reviewer", "reviewer", "reviewer", "proj");
        reviewer.status = AgentStatus::Idle;
        let mut personas = PersonaRegistry::new();
        for p in crate::persona::default_personas() {
            personas.load(p);
        }
        let agents = vec![&reviewer];
        let found = dispatcher.match_agent(&bead, None, &agents, &personas).unwrap();
        assert_eq!(found.role, "reviewer");
    }
}
