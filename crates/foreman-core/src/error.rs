//! Error types for the orchestration layer.

use foreman_tasks::TaskError;
use foreman_types::{AgentId, JobId};
use foreman_world::WorldError;

/// Errors that can occur while running the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The agent id does not refer to a live agent.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// The job id does not refer to a live job.
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// A task operation failed.
    #[error("task error: {source}")]
    Task {
        /// The underlying task error.
        #[from]
        source: TaskError,
    },

    /// A world-adapter call failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },
}
