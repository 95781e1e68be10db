//! Shared data types for the Foreman robot work engine.
//!
//! This crate defines the vocabulary every other crate speaks: typed
//! identifiers, the enumerations that describe agent/job/task lifecycles,
//! tile-world geometry, and the plain data structs carried across the
//! world-adapter boundary. It contains no behaviour beyond constructors,
//! conversions, and small geometric helpers.
//!
//! # Modules
//!
//! - [`ids`] -- Newtype identifiers for agents, jobs, tasks, and the opaque
//!   handles issued by the host world, plus [`StableEntityId`].
//! - [`enums`] -- Lifecycle states, the 8-way walking [`Direction`]
//!   encoding, action classes, and state-text severity.
//! - [`geometry`] -- [`Position`], [`ChunkPosition`], [`BoundingBox`], and
//!   the tile-to-chunk mapping.
//! - [`structs`] -- Waypoints, state details, colors, pathfinder request and
//!   response payloads, entity filters, and item bookkeeping.
//!
//! [`StableEntityId`]: ids::StableEntityId
//! [`Direction`]: enums::Direction
//! [`Position`]: geometry::Position
//! [`ChunkPosition`]: geometry::ChunkPosition
//! [`BoundingBox`]: geometry::BoundingBox

pub mod enums;
pub mod geometry;
pub mod ids;
pub mod structs;

pub use enums::{
    ActionClass, AgentScheduling, AgentTaskStatus, ChunkAssignment, Direction, JobState,
    StateSeverity, TaskLifecycle,
};
pub use geometry::{BoundingBox, ChunkPosition, Position, CHUNK_TILE_SIZE};
pub use ids::{
    AgentId, EntityHandle, ForceId, JobId, PathRequestId, PlayerId, RenderId, StableEntityId,
    SurfaceId, TaskId,
};
pub use structs::{
    AttributeValue, Color, EntityFilter, ItemRequirement, ItemYield, MineResult,
    PathRequest, PathRequestFinished, PathRequestFlags, StateDetails, WalkingCommand, Waypoint,
};
