//! Per-call context handed from the scheduling loop into task progression.
//!
//! Task functions never reach for globals: the world adapter, the settings,
//! and the prototype cache all arrive through [`TickContext`], and the facts
//! about the agent being progressed arrive through [`AgentFacts`]. The
//! scheduling loop pre-computes the facts once per agent per tick.

use foreman_types::{AgentId, EntityHandle, ForceId};
use foreman_world::{PrototypeCache, WorldAdapter};

use crate::settings::EngineSettings;

/// Mutable collaborators for one progress call.
pub struct TickContext<'a> {
    /// The host world.
    pub world: &'a mut dyn WorldAdapter,
    /// Task-layer settings.
    pub settings: &'a EngineSettings,
    /// Process-wide prototype attribute cache.
    pub prototypes: &'a mut PrototypeCache,
}

/// Immutable facts about the agent a task is being progressed for.
#[derive(Debug, Clone, Copy)]
pub struct AgentFacts {
    /// The agent's id.
    pub id: AgentId,
    /// The agent's world entity.
    pub entity: EntityHandle,
    /// The agent's force.
    pub force: ForceId,
    /// Cached mining speed (actions per second factor).
    pub mining_speed: f64,
    /// Cached mining reach, in tiles.
    pub mining_distance: f64,
}
