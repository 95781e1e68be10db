//! Enumeration types shared across the engine.
//!
//! Lifecycle states for agents, jobs, tasks, and chunk assignments, the
//! classification of scanned actions, state-text severity, and the 8-way
//! walking direction encoding used by the host's movement commands.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Walking directions
// ---------------------------------------------------------------------------

/// The eight compass directions, numbered clockwise from north = 0.
///
/// This matches the host engine's direction encoding for walking commands.
/// North points toward decreasing `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Toward decreasing y.
    North,
    /// Toward increasing x, decreasing y.
    NorthEast,
    /// Toward increasing x.
    East,
    /// Toward increasing x and y.
    SouthEast,
    /// Toward increasing y.
    South,
    /// Toward decreasing x, increasing y.
    SouthWest,
    /// Toward decreasing x.
    West,
    /// Toward decreasing x and y.
    NorthWest,
}

impl Direction {
    /// The host's numeric encoding: clockwise from north = 0.
    #[must_use]
    pub const fn encoding(self) -> u8 {
        match self {
            Self::North => 0,
            Self::NorthEast => 1,
            Self::East => 2,
            Self::SouthEast => 3,
            Self::South => 4,
            Self::SouthWest => 5,
            Self::West => 6,
            Self::NorthWest => 7,
        }
    }

    /// The direction's step vector. Diagonals are `(±1, ±1)`; callers that
    /// need unit length must normalize.
    #[must_use]
    pub const fn offset(self) -> (f64, f64) {
        match self {
            Self::North => (0.0, -1.0),
            Self::NorthEast => (1.0, -1.0),
            Self::East => (1.0, 0.0),
            Self::SouthEast => (1.0, 1.0),
            Self::South => (0.0, 1.0),
            Self::SouthWest => (-1.0, 1.0),
            Self::West => (-1.0, 0.0),
            Self::NorthWest => (-1.0, -1.0),
        }
    }

    /// Map an offset vector to a direction by the sign of each component.
    ///
    /// Returns `None` for the zero vector. A component that is exactly zero
    /// contributes no movement on that axis, so `(0, -3)` maps to north and
    /// `(2, -3)` to north-east regardless of magnitude.
    #[must_use]
    pub fn from_offset(dx: f64, dy: f64) -> Option<Self> {
        let sx = if dx > 0.0 {
            1
        } else if dx < 0.0 {
            -1
        } else {
            0
        };
        let sy = if dy > 0.0 {
            1
        } else if dy < 0.0 {
            -1
        } else {
            0
        };
        match (sx, sy) {
            (0, -1) => Some(Self::North),
            (1, -1) => Some(Self::NorthEast),
            (1, 0) => Some(Self::East),
            (1, 1) => Some(Self::SouthEast),
            (0, 1) => Some(Self::South),
            (-1, 1) => Some(Self::SouthWest),
            (-1, 0) => Some(Self::West),
            (-1, -1) => Some(Self::NorthWest),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle states
// ---------------------------------------------------------------------------

/// Scheduling state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentScheduling {
    /// The agent is eligible for the per-tick scheduling loop.
    Active,
    /// The agent is parked and skipped until the host resumes it.
    Standby,
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Created but not yet progressed by any agent.
    Pending,
    /// At least one agent has progressed the job's primary task.
    Active,
    /// The primary task reported completion.
    Completed,
}

/// Lifecycle state of a task instance, shared by all participating agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskLifecycle {
    /// Work remains; per-agent calls may have side effects.
    Active,
    /// Terminal. Every future per-agent call returns immediately without
    /// touching shared state.
    Completed,
}

/// Per-agent state within a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentTaskStatus {
    /// The agent still has work in this task.
    Active,
    /// The agent finished its part of this task.
    Completed,
    /// The agent's position did not change between two ticks of walking.
    Stuck,
    /// The pathfinder definitively found no path for this agent.
    NoPath,
}

/// Assignment state of a chunk during deconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkAssignment {
    /// No agent is working this chunk.
    Available,
    /// Exactly one agent is working this chunk.
    Assigned,
    /// All deconstruction work in this chunk is done.
    Completed,
}

// ---------------------------------------------------------------------------
// Scanned actions
// ---------------------------------------------------------------------------

/// The classification of a scanned world action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionClass {
    /// The entity is marked for deconstruction and must be mined out.
    Deconstruct,
    /// The entity is marked for upgrade to another entity type.
    Upgrade,
    /// An entity ghost that must be built.
    Build,
}

/// Severity of an agent's above-head state text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateSeverity {
    /// Routine progress. Rendered white.
    Normal,
    /// A recoverable setback. Rendered amber.
    Warning,
    /// A failure needing player attention. Rendered red.
    Error,
}
