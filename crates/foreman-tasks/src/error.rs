//! Error types for the task layer.
//!
//! Recoverable conditions (pathfinder timeout, stuck walking) never surface
//! as errors -- composite tasks handle them in place. Errors here are either
//! programming mistakes in the task graph or conditions the engine treats as
//! fatal for the tick.

use foreman_types::{AgentId, StableEntityId, TaskId};
use foreman_world::WorldError;

use crate::task::TaskKind;

/// Errors that can occur while progressing or tearing down tasks.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task id does not refer to a live task.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// A task was dispatched through the wrong kind's operations.
    #[error("task {task} is not a {expected} task")]
    WrongTaskKind {
        /// The offending task.
        task: TaskId,
        /// The kind the caller expected.
        expected: TaskKind,
    },

    /// A per-agent operation ran before the agent's state was installed.
    #[error("no state for agent {agent} in task {task}")]
    MissingAgentState {
        /// The task that was missing the record.
        task: TaskId,
        /// The agent whose record was missing.
        agent: AgentId,
    },

    /// Mining produced more items than the agent's inventory can hold.
    /// Emptying and returning is not implemented; this aborts the tick.
    #[error("inventory overflow on agent {agent} while mining {entity}")]
    InventoryOverflow {
        /// The agent whose inventory overflowed.
        agent: AgentId,
        /// The entity being mined.
        entity: StableEntityId,
    },

    /// A world-adapter call failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },
}
