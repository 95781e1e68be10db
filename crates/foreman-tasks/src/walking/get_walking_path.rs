//! GetWalkingPath: issue a pathfinder request and await its completion.
//!
//! The first progress call per agent submits the request and registers it in
//! the path request registry; subsequent calls wait one tick at a time until
//! the host delivers the completion event, which stores the outcome on the
//! per-agent record. Parents read the outcome directly.

use serde::{Deserialize, Serialize};
use tracing::debug;

use foreman_types::{
    AgentTaskStatus, BoundingBox, PathRequest, PathRequestFlags, PathRequestId, Position,
    StateSeverity, SurfaceId, TaskId, Waypoint,
};

use crate::context::{AgentFacts, TickContext};
use crate::error::TaskError;
use crate::manager::TaskManager;
use crate::registry::PathRequestOwner;
use crate::task::{AgentTaskDetail, Progress, Task, TaskKind};

/// Collision box used when the agent's prototype does not declare one.
const FALLBACK_COLLISION_BOX: BoundingBox = BoundingBox::new(
    Position::new(-0.2, -0.2),
    Position::new(0.2, 0.2),
);

/// Collision mask used when the agent's prototype does not declare one.
const FALLBACK_COLLISION_MASK: &str = "player";

const SEARCHING_TEXT: &str = "Looking for walking path";

/// Task-wide data: where every participating agent wants to go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetWalkingPathData {
    /// Surface to search on.
    pub surface: SurfaceId,
    /// The shared goal.
    pub end_position: Position,
    /// Acceptable distance from the goal, in tiles.
    pub closeness: f64,
}

/// Per-agent search state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathSearchState {
    /// The outstanding request, while one is registered.
    pub request: Option<PathRequestId>,
    /// The delivered result, once the world answered.
    pub outcome: Option<PathSearchOutcome>,
}

/// What the pathfinder answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSearchOutcome {
    /// The found waypoints, or `None` when no path exists or the search
    /// timed out.
    pub path: Option<Vec<Waypoint>>,
    /// The pathfinder was overloaded; retrying the same request may succeed.
    pub timed_out: bool,
}

fn data(task: &Task) -> Result<&GetWalkingPathData, TaskError> {
    match &task.data {
        crate::task::TaskData::GetWalkingPath(data) => Ok(data),
        _ => Err(TaskError::WrongTaskKind {
            task: task.id,
            expected: TaskKind::GetWalkingPath,
        }),
    }
}

/// The delivered outcome for an agent, if any.
pub(crate) fn outcome(task: &Task, agent: foreman_types::AgentId) -> Option<&PathSearchOutcome> {
    task.agents.get(&agent).and_then(|state| match &state.detail {
        AgentTaskDetail::GetWalkingPath(detail) => detail.outcome.as_ref(),
        _ => None,
    })
}

/// Forget an agent's search so the next progress call submits a fresh
/// request. Used by parents to retry after a pathfinder timeout.
pub(crate) fn reset_agent(
    mgr: &mut TaskManager,
    task_id: TaskId,
    agent: foreman_types::AgentId,
) -> Result<(), TaskError> {
    let task = mgr.task_mut(task_id)?;
    let _ = task.agents.remove(&agent);
    mgr.registry.remove_owned(task_id, Some(agent));
    Ok(())
}

pub(crate) fn progress(
    mgr: &mut TaskManager,
    ctx: &mut TickContext<'_>,
    agent: &AgentFacts,
    task_id: TaskId,
) -> Result<Progress, TaskError> {
    let task = mgr
        .tasks
        .get_mut(&task_id)
        .ok_or(TaskError::TaskNotFound(task_id))?;
    if task.is_completed() {
        return Ok(Progress::immediate());
    }
    let (surface, goal, radius) = {
        let data = data(task)?;
        (data.surface, data.end_position, data.closeness)
    };

    let state = task.ensure_agent(agent, AgentTaskDetail::GetWalkingPath(PathSearchState::default()));
    let AgentTaskDetail::GetWalkingPath(detail) = &mut state.detail else {
        return Err(TaskError::WrongTaskKind {
            task: task_id,
            expected: TaskKind::GetWalkingPath,
        });
    };

    if detail.outcome.is_some() {
        // Result already delivered; the parent reads it off the record.
        return Ok(Progress::immediate());
    }
    if detail.request.is_some() {
        return Ok(Progress::wait(1, SEARCHING_TEXT, StateSeverity::Normal));
    }

    // First call for this agent: submit the request.
    let start = ctx.world.entity_position(agent.entity)?;
    let walker_name = ctx.world.entity_name(agent.entity)?;
    let bounding_box = match ctx
        .prototypes
        .attribute(&*ctx.world, "entity", &walker_name, "collision_box")
    {
        Some(foreman_types::AttributeValue::Area(area)) => area,
        _ => FALLBACK_COLLISION_BOX,
    };
    let collision_mask = match ctx
        .prototypes
        .attribute(&*ctx.world, "entity", &walker_name, "collision_mask")
    {
        Some(foreman_types::AttributeValue::Text(mask)) => mask,
        _ => FALLBACK_COLLISION_MASK.to_owned(),
    };

    let request = ctx.world.request_path(PathRequest {
        surface,
        bounding_box,
        collision_mask,
        start,
        goal,
        force: agent.force,
        radius,
        ignore_entity: Some(agent.entity),
        flags: PathRequestFlags {
            cache: false,
            prefer_straight_paths: false,
            no_break: true,
        },
        resolution_modifier: ctx.settings.pathfinder.resolution_modifier,
    });
    detail.request = Some(request);
    state.status = AgentTaskStatus::Active;
    mgr.registry.insert(
        request,
        PathRequestOwner {
            task: task_id,
            agent: agent.id,
        },
    );
    debug!(task = %task_id, agent = %agent.id, request = %request, "Path search submitted");

    Ok(Progress::wait(1, SEARCHING_TEXT, StateSeverity::Normal))
}
