//! WalkPath: drive an agent tile by tile along a waypoint list.
//!
//! Arrival at a waypoint is checked per axis, never by diagonal distance:
//! at 45 degrees one axis closes faster than the straight-line distance and
//! would otherwise trigger spurious arrival. A position identical to last
//! tick's is the stuck heuristic; the parent re-plans.

use serde::{Deserialize, Serialize};

use foreman_types::{
    AgentTaskStatus, Direction, Position, StateSeverity, TaskId, WalkingCommand, Waypoint,
};

use crate::context::{AgentFacts, TickContext};
use crate::error::TaskError;
use crate::manager::TaskManager;
use crate::task::{AgentTaskDetail, Progress, TaskKind};

/// Per-axis distance below which a waypoint counts as reached, in tiles.
pub const WALK_ACCURACY: f64 = 0.3;

const WALKING_TEXT: &str = "Walking the path";

/// Per-agent walking state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkPathAgentState {
    /// The waypoints to follow.
    pub waypoints: Vec<Waypoint>,
    /// Index of the waypoint currently walked toward.
    pub target_index: usize,
    /// Where the agent stood last tick, for stuck detection.
    pub last_position: Option<Position>,
}

/// Install an agent's waypoint list, (re)creating its per-agent record.
pub(crate) fn install_waypoints(
    mgr: &mut TaskManager,
    task_id: TaskId,
    agent: &AgentFacts,
    waypoints: Vec<Waypoint>,
) -> Result<(), TaskError> {
    let task = mgr.task_mut(task_id)?;
    let _ = task.agents.remove(&agent.id);
    let state = task.ensure_agent(
        agent,
        AgentTaskDetail::WalkPath(WalkPathAgentState {
            waypoints,
            target_index: 0,
            last_position: None,
        }),
    );
    state.status = AgentTaskStatus::Active;
    Ok(())
}

fn within_accuracy(position: &Position, waypoint: &Position) -> bool {
    (position.x - waypoint.x).abs() <= WALK_ACCURACY
        && (position.y - waypoint.y).abs() <= WALK_ACCURACY
}

// The stuck check is exact equality: a stalled walker reports the identical
// position, while any real movement changes it.
#[allow(clippy::float_cmp)]
pub(crate) fn progress(
    mgr: &mut TaskManager,
    ctx: &mut TickContext<'_>,
    agent: &AgentFacts,
    task_id: TaskId,
) -> Result<Progress, TaskError> {
    let task = mgr.task_mut(task_id)?;
    if task.is_completed() {
        return Ok(Progress::immediate());
    }
    let state = task
        .agents
        .get_mut(&agent.id)
        .ok_or(TaskError::MissingAgentState {
            task: task_id,
            agent: agent.id,
        })?;
    let AgentTaskDetail::WalkPath(detail) = &mut state.detail else {
        return Err(TaskError::WrongTaskKind {
            task: task_id,
            expected: TaskKind::WalkPath,
        });
    };

    let position = ctx.world.entity_position(agent.entity)?;

    while detail
        .waypoints
        .get(detail.target_index)
        .is_some_and(|w| within_accuracy(&position, &w.position))
    {
        detail.target_index += 1;
    }

    let Some(target) = detail.waypoints.get(detail.target_index) else {
        ctx.world.set_walking_command(agent.entity, None);
        state.status = AgentTaskStatus::Completed;
        return Ok(Progress::immediate());
    };

    if detail
        .last_position
        .is_some_and(|last| last.x == position.x && last.y == position.y)
    {
        ctx.world.set_walking_command(agent.entity, None);
        state.status = AgentTaskStatus::Stuck;
        return Ok(Progress::immediate());
    }

    let dx = target.position.x - position.x;
    let dy = target.position.y - position.y;
    let Some(direction) = Direction::from_offset(dx, dy) else {
        // Exactly on the waypoint yet outside the per-axis check cannot
        // happen; skip past it rather than stall.
        detail.target_index += 1;
        return Ok(Progress::wait(1, WALKING_TEXT, StateSeverity::Normal));
    };
    ctx.world
        .set_walking_command(agent.entity, Some(WalkingCommand { direction }));
    detail.last_position = Some(position);

    Ok(Progress::wait(1, WALKING_TEXT, StateSeverity::Normal))
}

#[cfg(test)]
mod tests {
    use foreman_types::{AgentId, ForceId, JobId, SurfaceId};
    use foreman_world::sim::{SimEntitySpec, SimWorld};
    use foreman_world::PrototypeCache;

    use super::*;
    use crate::settings::EngineSettings;
    use crate::task::TaskData;

    fn setup(start: Position) -> (SimWorld, TaskManager, AgentFacts, TaskId) {
        let mut world = SimWorld::new(SurfaceId::new(1));
        let entity = world.add_entity(SimEntitySpec::new(
            "robot",
            "character",
            start,
            ForceId::new(1),
        ));
        let agent = AgentFacts {
            id: AgentId::new(1),
            entity,
            force: ForceId::new(1),
            mining_speed: 1.0,
            mining_distance: 3.0,
        };
        let mut mgr = TaskManager::new();
        let task = mgr.create(JobId::new(1), None, TaskData::WalkPath);
        (world, mgr, agent, task)
    }

    fn drive(
        world: &mut SimWorld,
        mgr: &mut TaskManager,
        agent: &AgentFacts,
        task: TaskId,
    ) -> Progress {
        let settings = EngineSettings::default();
        let mut prototypes = PrototypeCache::new();
        let mut ctx = TickContext {
            world,
            settings: &settings,
            prototypes: &mut prototypes,
        };
        progress(mgr, &mut ctx, agent, task).unwrap_or_else(|err| panic!("progress failed: {err}"))
    }

    fn agent_status(mgr: &TaskManager, task: TaskId, agent: AgentId) -> Option<AgentTaskStatus> {
        mgr.task(task)
            .ok()
            .and_then(|t| t.agents.get(&agent))
            .map(|s| s.status)
    }

    #[test]
    fn walks_toward_next_waypoint() {
        let (mut world, mut mgr, agent, task) = setup(Position::new(0.0, 0.0));
        install_waypoints(
            &mut mgr,
            task,
            &agent,
            vec![Waypoint::at(Position::new(5.0, 0.0))],
        )
        .unwrap_or_else(|err| panic!("install failed: {err}"));

        let step = drive(&mut world, &mut mgr, &agent, task);
        assert_eq!(step.ticks_to_wait, 1);
        let command = world.walking_command(agent.entity);
        assert_eq!(
            command.map(|c| c.direction),
            Some(Direction::East)
        );
    }

    #[test]
    fn per_axis_arrival_ignores_far_diagonal() {
        // 0.2 away on x but 5 away on y: not arrived, despite the x axis
        // being inside the accuracy band.
        let (mut world, mut mgr, agent, task) = setup(Position::new(0.0, 0.0));
        install_waypoints(
            &mut mgr,
            task,
            &agent,
            vec![Waypoint::at(Position::new(0.2, 5.0))],
        )
        .unwrap_or_else(|err| panic!("install failed: {err}"));

        let step = drive(&mut world, &mut mgr, &agent, task);
        assert_eq!(step.ticks_to_wait, 1);
        assert_eq!(agent_status(&mgr, task, agent.id), Some(AgentTaskStatus::Active));
    }

    #[test]
    fn completes_when_final_waypoint_reached() {
        let (mut world, mut mgr, agent, task) = setup(Position::new(4.9, 0.1));
        install_waypoints(
            &mut mgr,
            task,
            &agent,
            vec![Waypoint::at(Position::new(5.0, 0.0))],
        )
        .unwrap_or_else(|err| panic!("install failed: {err}"));

        let step = drive(&mut world, &mut mgr, &agent, task);
        assert_eq!(step.ticks_to_wait, 0);
        assert_eq!(
            agent_status(&mgr, task, agent.id),
            Some(AgentTaskStatus::Completed)
        );
        assert!(world.walking_command(agent.entity).is_none());
    }

    #[test]
    fn one_tick_stall_reports_stuck() {
        let (mut world, mut mgr, agent, task) = setup(Position::new(0.0, 0.0));
        install_waypoints(
            &mut mgr,
            task,
            &agent,
            vec![Waypoint::at(Position::new(5.0, 0.0))],
        )
        .unwrap_or_else(|err| panic!("install failed: {err}"));

        let _ = drive(&mut world, &mut mgr, &agent, task);
        // The entity does not move between ticks (speed zero).
        world.set_walking_speed(0.0);
        let _ = world.advance_tick();
        let step = drive(&mut world, &mut mgr, &agent, task);
        assert_eq!(step.ticks_to_wait, 0);
        assert_eq!(agent_status(&mgr, task, agent.id), Some(AgentTaskStatus::Stuck));
        assert!(world.walking_command(agent.entity).is_none());
    }
}
