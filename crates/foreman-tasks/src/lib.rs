//! The task layer of the Foreman engine.
//!
//! A job exposes one primary task; tasks form a tree, carry task-wide data
//! shared by every participating agent, and keep per-agent records so
//! several robots can progress the same task at different points. A task
//! progress call returns how many ticks the agent should sleep -- zero
//! consents to same-tick re-entry, which the composites use for chain
//! transitions.
//!
//! # Modules
//!
//! - [`task`] -- The generic task object, per-agent state, and [`Progress`].
//! - [`manager`] -- [`TaskManager`]: storage, kind dispatch, teardown
//!   propagation, path-completion delivery.
//! - [`registry`] -- [`PathRequestRegistry`] correlating pathfinder
//!   requests to per-agent task state.
//! - [`context`] -- [`TickContext`] and [`AgentFacts`] passed into every
//!   progress call.
//! - [`settings`] -- [`EngineSettings`] consumed by the task kinds.
//! - [`walking`] -- GetWalkingPath, WalkPath, and WalkToLocation.
//! - [`scanning`] -- The scan pipeline and the scanned action plan.
//! - [`deconstruct`] -- The chunk distributor and its ring search.
//! - [`complete_area`] -- The scan-then-deconstruct orchestrator.
//! - [`error`] -- [`TaskError`].
//!
//! [`Progress`]: task::Progress
//! [`TaskManager`]: manager::TaskManager
//! [`PathRequestRegistry`]: registry::PathRequestRegistry
//! [`TickContext`]: context::TickContext
//! [`AgentFacts`]: context::AgentFacts
//! [`EngineSettings`]: settings::EngineSettings
//! [`TaskError`]: error::TaskError

pub mod complete_area;
pub mod context;
pub mod deconstruct;
pub mod error;
pub mod manager;
pub mod registry;
pub mod scanning;
pub mod settings;
pub mod task;
pub mod walking;

pub use complete_area::{CompleteAreaData, CompleteAreaStage};
pub use context::{AgentFacts, TickContext};
pub use deconstruct::deconstruct_chunks::{
    ChunkState, DeconstructAgentState, DeconstructChunksData, DeconstructTarget,
};
pub use error::TaskError;
pub use manager::TaskManager;
pub use registry::{PathRequestOwner, PathRequestRegistry};
pub use scanning::plan::{ChunkDetails, ChunkIndex, EntityDetails, ScannedPlan};
pub use scanning::scan_areas::ScanAreasData;
pub use settings::{DebugSettings, EngineSettings, PathfinderSettings, RobotSettings, ScanSettings};
pub use task::{AgentTaskDetail, AgentTaskState, Progress, Task, TaskData, TaskKind};
pub use walking::get_walking_path::GetWalkingPathData;
pub use walking::walk_path::WALK_ACCURACY;
pub use walking::walk_to_location::WalkToLocationData;
