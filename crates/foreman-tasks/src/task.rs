//! The generic task object shared by every task kind.
//!
//! A task is a shared unit of work under a job. It owns its planned child
//! tasks (by id), a map of per-agent state, and kind-specific task-wide
//! data. Dispatch is a closed enum: each operation matches on [`TaskData`],
//! so nothing resembling a function pointer is ever persisted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use foreman_types::{
    AgentId, AgentTaskStatus, JobId, StateDetails, StateSeverity, TaskId, TaskLifecycle,
};

use crate::complete_area::CompleteAreaData;
use crate::context::AgentFacts;
use crate::deconstruct::deconstruct_chunks::{DeconstructAgentState, DeconstructChunksData};
use crate::scanning::scan_areas::ScanAreasData;
use crate::walking::get_walking_path::{GetWalkingPathData, PathSearchState};
use crate::walking::walk_path::WalkPathAgentState;
use crate::walking::walk_to_location::{WalkToLocationAgentState, WalkToLocationData};

/// The closed set of task kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// Issue a pathfinder request and await its completion.
    GetWalkingPath,
    /// Drive an agent tile by tile along a waypoint list.
    WalkPath,
    /// Composite: find a path, walk it, re-plan on stuck or timeout.
    WalkToLocation,
    /// Turn rectangles into a deduped, chunk-indexed action plan.
    ScanAreasForActionsToComplete,
    /// Distribute chunks to agents and drive the pathfind-mine loop.
    DeconstructEntitiesInChunkDetails,
    /// Orchestrate scan then deconstruction for an area job.
    CompleteArea,
}

impl core::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::GetWalkingPath => "GetWalkingPath",
            Self::WalkPath => "WalkPath",
            Self::WalkToLocation => "WalkToLocation",
            Self::ScanAreasForActionsToComplete => "ScanAreasForActionsToComplete",
            Self::DeconstructEntitiesInChunkDetails => "DeconstructEntitiesInChunkDetails",
            Self::CompleteArea => "CompleteArea",
        };
        write!(f, "{name}")
    }
}

/// Kind-specific task-wide data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskData {
    /// See [`GetWalkingPathData`].
    GetWalkingPath(GetWalkingPathData),
    /// Walk-path tasks carry no task-wide data; waypoints are per agent.
    WalkPath,
    /// See [`WalkToLocationData`].
    WalkToLocation(WalkToLocationData),
    /// See [`ScanAreasData`].
    ScanAreasForActionsToComplete(Box<ScanAreasData>),
    /// See [`DeconstructChunksData`].
    DeconstructEntitiesInChunkDetails(Box<DeconstructChunksData>),
    /// See [`CompleteAreaData`].
    CompleteArea(CompleteAreaData),
}

impl TaskData {
    /// The kind tag of this data.
    #[must_use]
    pub const fn kind(&self) -> TaskKind {
        match self {
            Self::GetWalkingPath(_) => TaskKind::GetWalkingPath,
            Self::WalkPath => TaskKind::WalkPath,
            Self::WalkToLocation(_) => TaskKind::WalkToLocation,
            Self::ScanAreasForActionsToComplete(_) => TaskKind::ScanAreasForActionsToComplete,
            Self::DeconstructEntitiesInChunkDetails(_) => {
                TaskKind::DeconstructEntitiesInChunkDetails
            }
            Self::CompleteArea(_) => TaskKind::CompleteArea,
        }
    }
}

/// Kind-specific per-agent data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentTaskDetail {
    /// The task kind keeps no per-agent data beyond the generic record.
    None,
    /// See [`PathSearchState`].
    GetWalkingPath(PathSearchState),
    /// See [`WalkPathAgentState`].
    WalkPath(WalkPathAgentState),
    /// See [`WalkToLocationAgentState`].
    WalkToLocation(WalkToLocationAgentState),
    /// See [`DeconstructAgentState`].
    Deconstruct(DeconstructAgentState),
}

/// Per-agent state within a task. Created lazily on the agent's first call,
/// removed when the agent leaves the task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTaskState {
    /// The agent this record belongs to.
    pub agent: AgentId,
    /// The agent's world entity, captured at record creation so teardown can
    /// clear walking commands without consulting the agent manager.
    pub entity: foreman_types::EntityHandle,
    /// The task this record belongs to.
    pub task: TaskId,
    /// The child this agent is currently driving.
    pub current_child_index: usize,
    /// The agent's progression state.
    pub status: AgentTaskStatus,
    /// Kind-specific per-agent data.
    pub detail: AgentTaskDetail,
}

/// A task instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// The task's id.
    pub id: TaskId,
    /// The job this task serves.
    pub job: JobId,
    /// The parent task, `None` for a job's primary task.
    pub parent: Option<TaskId>,
    /// Shared lifecycle. Once `Completed`, every per-agent call returns
    /// immediately without side effects.
    pub lifecycle: TaskLifecycle,
    /// Planned child task ids, in execution order.
    pub children: Vec<TaskId>,
    /// The child all agents share once the task's shared progress advances.
    pub current_child_index: usize,
    /// Kind-specific task-wide data.
    pub data: TaskData,
    /// Per-agent state, keyed by agent.
    pub agents: BTreeMap<AgentId, AgentTaskState>,
}

impl Task {
    /// Whether this task is the root of its job.
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        self.parent.is_none()
    }

    /// Whether the task has reached its terminal state.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.lifecycle == TaskLifecycle::Completed
    }

    /// Get or lazily create the per-agent record for `agent`, with `detail`
    /// as the kind-specific initial state.
    pub fn ensure_agent(
        &mut self,
        agent: &AgentFacts,
        detail: AgentTaskDetail,
    ) -> &mut AgentTaskState {
        let id = self.id;
        self.agents.entry(agent.id).or_insert_with(|| AgentTaskState {
            agent: agent.id,
            entity: agent.entity,
            task: id,
            current_child_index: 0,
            status: AgentTaskStatus::Active,
            detail,
        })
    }
}

/// What a progress call tells the scheduling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Ticks until the agent should be called again. Zero consents to
    /// same-tick re-entry.
    pub ticks_to_wait: u32,
    /// State text to show above the agent, if the task produced any.
    pub details: Option<StateDetails>,
    /// The task asks for this agent to be put in standby.
    pub standby: bool,
}

impl Progress {
    /// Wait `ticks` with the given state text.
    pub fn wait(ticks: u32, text: impl Into<String>, severity: StateSeverity) -> Self {
        Self {
            ticks_to_wait: ticks,
            details: Some(StateDetails::new(text, severity)),
            standby: false,
        }
    }

    /// Yield within the tick, with no state text.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            ticks_to_wait: 0,
            details: None,
            standby: false,
        }
    }

    /// Yield within the tick, with state text.
    pub fn immediate_with(text: impl Into<String>, severity: StateSeverity) -> Self {
        Self {
            ticks_to_wait: 0,
            details: Some(StateDetails::new(text, severity)),
            standby: false,
        }
    }

    /// Mark this outcome as requesting agent standby.
    #[must_use]
    pub fn with_standby(mut self) -> Self {
        self.standby = true;
        self
    }
}
