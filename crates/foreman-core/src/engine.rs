//! The engine root: owns all persisted state and runs the per-tick agent
//! scheduling loop.
//!
//! Each tick, every active agent whose wake-up tick has arrived walks its
//! job list in priority order. The top job's primary task is progressed;
//! the returned wait advances the agent's wake-up tick; completed jobs are
//! spliced out, and the loop only continues to the next job in the same
//! tick when the finished job yielded with a zero wait. A primary-task
//! `noPath` outcome parks the agent in standby and drops it from the job.
//!
//! The engine is `serde`-serializable for host snapshots. Render handles
//! and the prototype cache are skipped: both reflect the host's current
//! session and are rebuilt after a restore.

use serde::{Deserialize, Serialize};
use tracing::warn;

use foreman_tasks::{TaskManager, TickContext};
use foreman_types::{
    AgentId, AgentScheduling, JobId, PathRequestFinished, PlayerId, StateDetails, StateSeverity,
};
use foreman_world::{PrototypeCache, WorldAdapter};

use crate::agent::{AgentManager, NewAgentParams};
use crate::config::EngineConfig;
use crate::display::StateDisplay;
use crate::error::EngineError;
use crate::jobs::{JobData, JobManager};

const IDLE_TEXT: &str = "Idle";

/// The engine: all persisted state plus the per-tick loop.
#[derive(Debug, Serialize, Deserialize)]
pub struct Engine {
    /// Engine configuration, persisted so a restore runs with the settings
    /// it was saved under.
    pub config: EngineConfig,
    /// All agents.
    pub agents: AgentManager,
    /// All jobs.
    pub jobs: JobManager,
    /// All tasks and the path request registry.
    pub tasks: TaskManager,
    /// Above-head state text. Rebuilt after restore.
    #[serde(skip)]
    display: StateDisplay,
    /// Prototype attribute cache. Cleared at engine (re)initialization.
    #[serde(skip)]
    prototypes: PrototypeCache,
}

impl Engine {
    /// Create an engine with the given configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            agents: AgentManager::new(),
            jobs: JobManager::new(),
            tasks: TaskManager::new(),
            display: StateDisplay::new(),
            prototypes: PrototypeCache::new(),
        }
    }

    /// Create an agent around a world entity.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::World`] when the entity handle is dead.
    pub fn create_agent(
        &mut self,
        world: &dyn WorldAdapter,
        params: NewAgentParams,
    ) -> Result<AgentId, EngineError> {
        self.agents.create_agent(world, &mut self.prototypes, params)
    }

    /// Create a job for a player.
    pub fn create_job(&mut self, player: PlayerId, data: JobData) -> JobId {
        self.jobs.create(player, data)
    }

    /// Queue a job at the tail of an agent's list.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AgentNotFound`] for a dead agent id.
    pub fn assign_job(&mut self, agent: AgentId, job: JobId) -> Result<(), EngineError> {
        self.agents.queue_job(agent, job)
    }

    /// Remove an agent whose world entity was destroyed: tear its branch of
    /// every job it participated in, drop its state text, forget it.
    pub fn remove_agent(&mut self, world: &mut dyn WorldAdapter, agent: AgentId) {
        let jobs = self
            .agents
            .agent(agent)
            .map(|record| record.jobs.clone())
            .unwrap_or_default();
        for job in jobs {
            self.jobs
                .remove_agent_from_job(&mut self.tasks, world, job, agent);
        }
        self.display.clear(world, agent);
        let _ = self.agents.remove(agent);
    }

    /// Deliver a pathfinder completion event from the host.
    pub fn on_path_request_finished(&mut self, event: &PathRequestFinished) {
        self.tasks.handle_path_request_finished(event);
    }

    /// Run one tick of the scheduling loop.
    ///
    /// # Errors
    ///
    /// Propagates fatal task errors (invariant violations, inventory
    /// overflow); recoverable conditions never surface here.
    pub fn run_tick(&mut self, world: &mut dyn WorldAdapter) -> Result<(), EngineError> {
        let tick = world.current_tick();
        for agent_id in self.agents.ids() {
            let (scheduling, busy_until, jobs) = {
                let agent = self.agents.agent(agent_id)?;
                (agent.scheduling, agent.busy_until_tick, agent.jobs.clone())
            };
            if scheduling != AgentScheduling::Active || busy_until > tick {
                continue;
            }
            let facts = self.agents.facts(agent_id)?;

            let mut shown: Option<StateDetails> = None;
            for job_id in jobs {
                if self.jobs.is_paused(job_id) {
                    continue;
                }
                let step = {
                    let mut ctx = TickContext {
                        world: &mut *world,
                        settings: &self.config.settings,
                        prototypes: &mut self.prototypes,
                    };
                    self.jobs
                        .progress_job_for_agent(&mut self.tasks, &mut ctx, &facts, job_id)?
                };
                self.agents
                    .set_busy_until(agent_id, tick + u64::from(step.ticks_to_wait));
                if step.details.is_some() {
                    shown = step.details.clone();
                }

                if step.standby {
                    warn!(agent = %agent_id, job = %job_id, "Agent has no path to its work; going to standby");
                    if let Some(primary) = self.jobs.primary_task(job_id) {
                        self.tasks.pausing_robot_for_task(world, agent_id, primary);
                    }
                    self.jobs
                        .remove_agent_from_job(&mut self.tasks, world, job_id, agent_id);
                    self.agents.remove_job(agent_id, job_id);
                    self.agents
                        .set_scheduling(agent_id, AgentScheduling::Standby);
                    break;
                }

                if self.jobs.is_job_complete_for_agent(job_id, agent_id) {
                    self.jobs
                        .remove_agent_from_job(&mut self.tasks, world, job_id, agent_id);
                    self.agents.remove_job(agent_id, job_id);
                    if step.ticks_to_wait == 0 {
                        continue;
                    }
                }
                break;
            }

            let details =
                shown.unwrap_or_else(|| StateDetails::new(IDLE_TEXT, StateSeverity::Normal));
            if self.config.show_robot_state && world.entity_is_valid(facts.entity) {
                let surface = world.entity_surface(facts.entity)?;
                self.display
                    .apply(world, agent_id, facts.entity, surface, &details);
            }
        }
        Ok(())
    }
}
