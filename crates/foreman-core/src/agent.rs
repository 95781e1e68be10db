//! Agent (robot) records and the manager that owns them.
//!
//! An agent is created on demand around a host world entity and destroyed
//! when that entity is. Its mining reach and speed are resolved from the
//! entity's prototype once at creation and cached on the record; the
//! scheduling loop reads them every tick.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use foreman_tasks::AgentFacts;
use foreman_types::{
    AgentId, AgentScheduling, Color, EntityHandle, ForceId, JobId, PlayerId,
};
use foreman_world::{PrototypeCache, WorldAdapter};

use crate::error::EngineError;

/// Mining reach used when the prototype does not declare one, in tiles.
const DEFAULT_MINING_DISTANCE: f64 = 3.0;

/// Mining speed used when the prototype does not declare one.
const DEFAULT_MINING_SPEED: f64 = 1.0;

/// Parameters for creating an agent.
#[derive(Debug, Clone)]
pub struct NewAgentParams {
    /// The world entity the agent controls.
    pub entity: EntityHandle,
    /// The player the agent works for.
    pub master: PlayerId,
    /// The agent's force.
    pub force: ForceId,
    /// Display name.
    pub name: String,
    /// Display color.
    pub color: Color,
}

/// An autonomous worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// The agent's id.
    pub id: AgentId,
    /// The world entity the agent controls.
    pub entity: EntityHandle,
    /// The agent's force.
    pub force: ForceId,
    /// The owning player.
    pub master: PlayerId,
    /// Display name.
    pub name: String,
    /// Display color.
    pub color: Color,
    /// The agent's jobs, priority head-first.
    pub jobs: Vec<JobId>,
    /// Whether the scheduling loop runs this agent.
    pub scheduling: AgentScheduling,
    /// The tick the agent next wakes at.
    pub busy_until_tick: u64,
    /// Cached mining reach, in tiles.
    pub mining_distance: f64,
    /// Cached mining speed.
    pub mining_speed: f64,
}

/// Creates and tracks agents. The id counter persists with the snapshot so
/// ids stay unique across save/load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentManager {
    agents: BTreeMap<AgentId, Agent>,
    next_id: u64,
}

impl AgentManager {
    /// Create an empty manager.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            agents: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Create an agent around a world entity, resolving its mining stats
    /// from the entity's prototype.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::World`] when the entity handle is dead.
    pub fn create_agent(
        &mut self,
        world: &dyn WorldAdapter,
        prototypes: &mut PrototypeCache,
        params: NewAgentParams,
    ) -> Result<AgentId, EngineError> {
        let prototype = world.entity_name(params.entity)?;
        let mining_distance = prototypes
            .attribute(world, "entity", &prototype, "mining_distance")
            .and_then(|value| value.as_number())
            .unwrap_or(DEFAULT_MINING_DISTANCE);
        let mining_speed = prototypes
            .attribute(world, "entity", &prototype, "mining_speed")
            .and_then(|value| value.as_number())
            .unwrap_or(DEFAULT_MINING_SPEED);

        self.next_id += 1;
        let id = AgentId::new(self.next_id);
        let _ = self.agents.insert(
            id,
            Agent {
                id,
                entity: params.entity,
                force: params.force,
                master: params.master,
                name: params.name,
                color: params.color,
                jobs: Vec::new(),
                scheduling: AgentScheduling::Active,
                busy_until_tick: 0,
                mining_distance,
                mining_speed,
            },
        );
        info!(agent = %id, "Agent created");
        Ok(id)
    }

    /// Look up an agent.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AgentNotFound`] for a dead id.
    pub fn agent(&self, id: AgentId) -> Result<&Agent, EngineError> {
        self.agents.get(&id).ok_or(EngineError::AgentNotFound(id))
    }

    /// Look up an agent mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AgentNotFound`] for a dead id.
    pub fn agent_mut(&mut self, id: AgentId) -> Result<&mut Agent, EngineError> {
        self.agents
            .get_mut(&id)
            .ok_or(EngineError::AgentNotFound(id))
    }

    /// All agent ids, in id order. The scheduling loop iterates this.
    #[must_use]
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    /// The per-tick facts the task layer needs about an agent.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AgentNotFound`] for a dead id.
    pub fn facts(&self, id: AgentId) -> Result<AgentFacts, EngineError> {
        let agent = self.agent(id)?;
        Ok(AgentFacts {
            id: agent.id,
            entity: agent.entity,
            force: agent.force,
            mining_speed: agent.mining_speed,
            mining_distance: agent.mining_distance,
        })
    }

    /// Append a job to the tail of an agent's list.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AgentNotFound`] for a dead id.
    pub fn queue_job(&mut self, id: AgentId, job: JobId) -> Result<(), EngineError> {
        let agent = self.agent_mut(id)?;
        if !agent.jobs.contains(&job) {
            agent.jobs.push(job);
        }
        Ok(())
    }

    /// Splice a job out of an agent's list.
    pub fn remove_job(&mut self, id: AgentId, job: JobId) {
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.jobs.retain(|candidate| *candidate != job);
        }
    }

    /// Advance an agent's wake-up tick.
    pub fn set_busy_until(&mut self, id: AgentId, tick: u64) {
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.busy_until_tick = tick;
        }
    }

    /// Change an agent's scheduling state.
    pub fn set_scheduling(&mut self, id: AgentId, scheduling: AgentScheduling) {
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.scheduling = scheduling;
        }
    }

    /// Remove an agent, returning its record.
    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(&id)
    }

    /// Number of live agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agents exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use foreman_types::{AttributeValue, Position, SurfaceId};
    use foreman_world::sim::{SimEntitySpec, SimWorld};

    use super::*;

    fn params(entity: EntityHandle) -> NewAgentParams {
        NewAgentParams {
            entity,
            master: PlayerId::new(1),
            force: ForceId::new(1),
            name: "Unit 7".to_owned(),
            color: Color::WHITE,
        }
    }

    #[test]
    fn create_resolves_mining_stats_from_prototype() {
        let mut world = SimWorld::new(SurfaceId::new(1));
        world.set_prototype_attribute(
            "entity",
            "robot",
            "mining_distance",
            AttributeValue::Number(5.0),
        );
        world.set_prototype_attribute(
            "entity",
            "robot",
            "mining_speed",
            AttributeValue::Number(2.0),
        );
        let entity = world.add_entity(SimEntitySpec::new(
            "robot",
            "character",
            Position::new(0.0, 0.0),
            ForceId::new(1),
        ));

        let mut manager = AgentManager::new();
        let mut prototypes = PrototypeCache::new();
        let result = manager.create_agent(&world, &mut prototypes, params(entity));
        assert!(result.is_ok());
        if let Ok(id) = result {
            let agent = manager.agent(id).ok();
            assert!(agent.is_some_and(|a| {
                (a.mining_distance - 5.0).abs() < f64::EPSILON
                    && (a.mining_speed - 2.0).abs() < f64::EPSILON
            }));
        }
    }

    #[test]
    fn create_falls_back_to_default_stats() {
        let mut world = SimWorld::new(SurfaceId::new(1));
        let entity = world.add_entity(SimEntitySpec::new(
            "robot",
            "character",
            Position::new(0.0, 0.0),
            ForceId::new(1),
        ));
        let mut manager = AgentManager::new();
        let mut prototypes = PrototypeCache::new();
        let result = manager.create_agent(&world, &mut prototypes, params(entity));
        assert!(result.is_ok());
        if let Ok(id) = result {
            let agent = manager.agent(id).ok();
            assert!(agent.is_some_and(|a| {
                (a.mining_distance - DEFAULT_MINING_DISTANCE).abs() < f64::EPSILON
                    && (a.mining_speed - DEFAULT_MINING_SPEED).abs() < f64::EPSILON
            }));
        }
    }

    #[test]
    fn job_list_mutation() {
        let mut world = SimWorld::new(SurfaceId::new(1));
        let entity = world.add_entity(SimEntitySpec::new(
            "robot",
            "character",
            Position::new(0.0, 0.0),
            ForceId::new(1),
        ));
        let mut manager = AgentManager::new();
        let mut prototypes = PrototypeCache::new();
        let Ok(id) = manager.create_agent(&world, &mut prototypes, params(entity)) else {
            panic!("agent creation failed")
        };

        assert!(manager.queue_job(id, JobId::new(1)).is_ok());
        assert!(manager.queue_job(id, JobId::new(2)).is_ok());
        // Queuing the same job twice is a no-op.
        assert!(manager.queue_job(id, JobId::new(1)).is_ok());
        assert_eq!(manager.agent(id).ok().map(|a| a.jobs.len()), Some(2));

        manager.remove_job(id, JobId::new(1));
        assert_eq!(
            manager.agent(id).ok().map(|a| a.jobs.clone()),
            Some(vec![JobId::new(2)])
        );
    }

    #[test]
    fn ids_are_sequential_across_creations() {
        let mut world = SimWorld::new(SurfaceId::new(1));
        let mut manager = AgentManager::new();
        let mut prototypes = PrototypeCache::new();
        let mut previous = None;
        for _ in 0..3 {
            let entity = world.add_entity(SimEntitySpec::new(
                "robot",
                "character",
                Position::new(0.0, 0.0),
                ForceId::new(1),
            ));
            let Ok(id) = manager.create_agent(&world, &mut prototypes, params(entity)) else {
                panic!("agent creation failed")
            };
            if let Some(previous) = previous {
                assert!(id > previous);
            }
            previous = Some(id);
        }
    }
}
