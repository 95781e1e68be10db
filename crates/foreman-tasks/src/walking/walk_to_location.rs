//! WalkToLocation: the composite that gets a path, walks it, waits out
//! pathfinder timeouts, and re-plans from scratch when the walk gets stuck.
//!
//! Both children are planned unconditionally at activation so later ticks
//! index them deterministically: child 0 finds the path, child 1 walks it.
//! Per-agent retry and stuck recovery only ever touch this agent's records
//! in the children; other agents sharing the task are undisturbed.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use foreman_types::{
    AgentTaskStatus, Color, Position, RenderId, StateSeverity, SurfaceId, TaskId, Waypoint,
};

use crate::context::{AgentFacts, TickContext};
use crate::error::TaskError;
use crate::manager::TaskManager;
use crate::task::{AgentTaskDetail, Progress, TaskData, TaskKind};
use crate::walking::{get_walking_path, walk_path};
use crate::walking::get_walking_path::GetWalkingPathData;

const RETRY_TEXT: &str = "Going to start a new path search";
const NO_PATH_TEXT: &str = "No path found";
const ARRIVED_TEXT: &str = "Robot arrived";

/// Task-wide data: the shared destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkToLocationData {
    /// Surface to walk on.
    pub surface: SurfaceId,
    /// The destination.
    pub end_position: Position,
    /// Acceptable distance from the destination, in tiles.
    pub closeness: f64,
}

/// Per-agent composite state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalkToLocationAgentState {
    /// The path this agent is walking, once found.
    pub path: Option<Vec<Waypoint>>,
    /// Debug rendering of the path. Never persisted; render handles do not
    /// survive a snapshot.
    #[serde(skip)]
    pub path_render: Option<RenderId>,
}

/// Make sure both children exist. They are created together on the first
/// progress call by any agent.
fn ensure_children(mgr: &mut TaskManager, task_id: TaskId) -> Result<(TaskId, TaskId), TaskError> {
    let (job, surface, end_position, closeness, existing) = {
        let task = mgr.task(task_id)?;
        let TaskData::WalkToLocation(data) = &task.data else {
            return Err(TaskError::WrongTaskKind {
                task: task_id,
                expected: TaskKind::WalkToLocation,
            });
        };
        let existing = match task.children.as_slice() {
            [get_path, walk] => Some((*get_path, *walk)),
            _ => None,
        };
        (
            task.job,
            data.surface,
            data.end_position,
            data.closeness,
            existing,
        )
    };
    if let Some(children) = existing {
        return Ok(children);
    }

    let get_path = mgr.create(
        job,
        Some(task_id),
        TaskData::GetWalkingPath(GetWalkingPathData {
            surface,
            end_position,
            closeness,
        }),
    );
    let walk = mgr.create(job, Some(task_id), TaskData::WalkPath);
    let task = mgr.task_mut(task_id)?;
    task.children = vec![get_path, walk];
    Ok((get_path, walk))
}

pub(crate) fn progress(
    mgr: &mut TaskManager,
    ctx: &mut TickContext<'_>,
    agent: &AgentFacts,
    task_id: TaskId,
) -> Result<Progress, TaskError> {
    if mgr.task(task_id)?.is_completed() {
        return Ok(Progress::immediate());
    }
    let (get_path_child, walk_child) = ensure_children(mgr, task_id)?;

    let mut replanned = false;
    loop {
        let child_index = {
            let task = mgr.task_mut(task_id)?;
            let state = task.ensure_agent(
                agent,
                AgentTaskDetail::WalkToLocation(WalkToLocationAgentState::default()),
            );
            state.current_child_index
        };

        if child_index == 0 {
            let step = get_walking_path::progress(mgr, ctx, agent, get_path_child)?;
            let outcome =
                get_walking_path::outcome(mgr.task(get_path_child)?, agent.id).cloned();
            let Some(outcome) = outcome else {
                return Ok(step);
            };

            if outcome.timed_out {
                get_walking_path::reset_agent(mgr, get_path_child, agent.id)?;
                debug!(task = %task_id, agent = %agent.id, "Pathfinder timed out; retrying after back-off");
                return Ok(Progress::wait(
                    ctx.settings.robot.end_of_task_wait_ticks,
                    RETRY_TEXT,
                    StateSeverity::Warning,
                ));
            }
            let Some(waypoints) = outcome.path else {
                let is_primary = mgr.task(task_id)?.is_primary();
                let task = mgr.task_mut(task_id)?;
                if let Some(state) = task.agents.get_mut(&agent.id) {
                    state.status = AgentTaskStatus::NoPath;
                }
                warn!(task = %task_id, agent = %agent.id, "No walking path exists");
                let step = Progress::immediate_with(NO_PATH_TEXT, StateSeverity::Warning);
                return Ok(if is_primary { step.with_standby() } else { step });
            };

            let render = if ctx.settings.debug.show_path_walking {
                let surface = {
                    let TaskData::WalkToLocation(data) = &mgr.task(task_id)?.data else {
                        return Err(TaskError::WrongTaskKind {
                            task: task_id,
                            expected: TaskKind::WalkToLocation,
                        });
                    };
                    data.surface
                };
                Some(ctx.world.render_path(surface, &waypoints, Color::WHITE))
            } else {
                None
            };

            walk_path::install_waypoints(mgr, walk_child, agent, waypoints.clone())?;
            let task = mgr.task_mut(task_id)?;
            if let Some(state) = task.agents.get_mut(&agent.id) {
                state.current_child_index = 1;
                if let AgentTaskDetail::WalkToLocation(detail) = &mut state.detail {
                    detail.path = Some(waypoints);
                    detail.path_render = render;
                }
            }
            // Chain straight into walking this tick.
            continue;
        }

        let step = walk_path::progress(mgr, ctx, agent, walk_child)?;
        let walk_status = mgr
            .task(walk_child)?
            .agents
            .get(&agent.id)
            .map_or(AgentTaskStatus::Active, |state| state.status);
        match walk_status {
            AgentTaskStatus::Stuck => {
                warn!(task = %task_id, agent = %agent.id, "Robot stuck while walking; re-planning");
                mgr.removing_robot_from_task(ctx.world, agent.id, task_id);
                if replanned {
                    // One re-plan per call; a fresh search is pending anyway.
                    return Ok(Progress::wait(
                        1,
                        RETRY_TEXT,
                        StateSeverity::Warning,
                    ));
                }
                replanned = true;
                continue;
            }
            AgentTaskStatus::Completed => {
                let task = mgr.task_mut(task_id)?;
                if let Some(state) = task.agents.get_mut(&agent.id) {
                    if let AgentTaskDetail::WalkToLocation(detail) = &mut state.detail {
                        if let Some(render) = detail.path_render.take() {
                            ctx.world.destroy_render(render);
                        }
                    }
                    state.status = AgentTaskStatus::Completed;
                }
                if task.is_primary() {
                    // As a job's root, one arrival is the whole job.
                    task.lifecycle = foreman_types::TaskLifecycle::Completed;
                }
                return Ok(Progress::immediate_with(ARRIVED_TEXT, StateSeverity::Normal));
            }
            _ => return Ok(step),
        }
    }
}

#[cfg(test)]
mod tests {
    use foreman_types::{AgentId, ForceId, JobId};
    use foreman_world::sim::{SimEntitySpec, SimPathResponse, SimWorld};
    use foreman_world::PrototypeCache;

    use super::*;
    use crate::settings::EngineSettings;

    fn setup(goal: Position) -> (SimWorld, TaskManager, AgentFacts, TaskId) {
        let mut world = SimWorld::new(SurfaceId::new(1));
        let entity = world.add_entity(SimEntitySpec::new(
            "robot",
            "character",
            Position::new(0.0, 0.0),
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
        let task = mgr.create(
            JobId::new(1),
            None,
            TaskData::WalkToLocation(WalkToLocationData {
                surface: SurfaceId::new(1),
                end_position: goal,
                closeness: 1.0,
            }),
        );
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

    fn pump_events(world: &mut SimWorld, mgr: &mut TaskManager) {
        for event in world.advance_tick() {
            mgr.handle_path_request_finished(&event);
        }
    }

    fn self_status(mgr: &TaskManager, task: TaskId, agent: AgentId) -> Option<AgentTaskStatus> {
        mgr.task(task)
            .ok()
            .and_then(|t| t.agents.get(&agent))
            .map(|s| s.status)
    }

    #[test]
    fn timeout_backs_off_and_resubmits() {
        let (mut world, mut mgr, agent, task) = setup(Position::new(20.0, 20.0));
        world.script_path_response(SimPathResponse::TryAgainLater);

        let step = drive(&mut world, &mut mgr, &agent, task);
        assert_eq!(step.ticks_to_wait, 1);
        assert_eq!(world.path_requests_submitted(), 1);

        pump_events(&mut world, &mut mgr);
        let step = drive(&mut world, &mut mgr, &agent, task);
        assert_eq!(step.ticks_to_wait, 60);
        assert_eq!(
            step.details.as_ref().map(|d| d.severity),
            Some(StateSeverity::Warning)
        );

        // After the back-off the next call submits a second request.
        let step = drive(&mut world, &mut mgr, &agent, task);
        assert_eq!(step.ticks_to_wait, 1);
        assert_eq!(world.path_requests_submitted(), 2);
    }

    #[test]
    fn no_path_marks_agent_and_requests_standby_for_primary() {
        let (mut world, mut mgr, agent, task) = setup(Position::new(20.0, 20.0));
        world.script_path_response(SimPathResponse::NoPath);

        let _ = drive(&mut world, &mut mgr, &agent, task);
        pump_events(&mut world, &mut mgr);
        let step = drive(&mut world, &mut mgr, &agent, task);
        assert_eq!(step.ticks_to_wait, 0);
        assert!(step.standby);
        assert_eq!(self_status(&mgr, task, agent.id), Some(AgentTaskStatus::NoPath));
    }

    #[test]
    fn found_path_chains_into_walking_same_tick() {
        let (mut world, mut mgr, agent, task) = setup(Position::new(20.0, 0.0));

        let _ = drive(&mut world, &mut mgr, &agent, task);
        pump_events(&mut world, &mut mgr);
        // Path delivered: the same progress call starts walking.
        let step = drive(&mut world, &mut mgr, &agent, task);
        assert_eq!(step.ticks_to_wait, 1);
        assert_eq!(
            step.details.as_ref().map(|d| d.text.as_str()),
            Some("Walking the path")
        );
        assert!(world.walking_command(agent.entity).is_some());
    }

    #[test]
    fn stuck_walk_replans_within_the_same_call() {
        let (mut world, mut mgr, agent, task) = setup(Position::new(20.0, 0.0));

        let _ = drive(&mut world, &mut mgr, &agent, task);
        pump_events(&mut world, &mut mgr);
        let _ = drive(&mut world, &mut mgr, &agent, task);

        // Freeze the entity so the next two calls observe identical
        // positions.
        world.set_walking_speed(0.0);
        let _ = world.advance_tick();
        let _ = drive(&mut world, &mut mgr, &agent, task);
        let _ = world.advance_tick();
        let step = drive(&mut world, &mut mgr, &agent, task);

        // The stuck branch tore down and immediately issued a new search.
        assert_eq!(step.ticks_to_wait, 1);
        assert_eq!(
            step.details.as_ref().map(|d| d.text.as_str()),
            Some("Looking for walking path")
        );
        assert_eq!(world.path_requests_submitted(), 2);
    }

    #[test]
    fn arrival_completes_the_agent() {
        let (mut world, mut mgr, agent, task) = setup(Position::new(1.0, 0.0));
        world.script_path_response(SimPathResponse::Found(vec![Waypoint::at(Position::new(
            0.1, 0.0,
        ))]));

        let _ = drive(&mut world, &mut mgr, &agent, task);
        pump_events(&mut world, &mut mgr);
        let step = drive(&mut world, &mut mgr, &agent, task);
        assert_eq!(step.ticks_to_wait, 0);
        assert_eq!(
            step.details.as_ref().map(|d| d.text.as_str()),
            Some(ARRIVED_TEXT)
        );
        assert_eq!(
            self_status(&mgr, task, agent.id),
            Some(AgentTaskStatus::Completed)
        );
    }
}
