//! DeconstructEntitiesInChunkDetails: assigns chunks to agents and drives
//! the pathfind -> walk -> mine inner loop until the plan's deconstruction
//! maps are empty.
//!
//! Each agent holds at most one assigned chunk at a time; a chunk is
//! assigned to at most one agent. Within its chunk an agent mines the
//! nearest remaining entity, walking closer through an embedded
//! per-agent WalkToLocation child when out of reach. Entities mined are
//! removed from the chunk map and the flat map together; the task completes
//! when the flat map drains.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use foreman_types::{
    AgentId, AgentTaskStatus, ChunkAssignment, ChunkPosition, Position, StableEntityId,
    StateSeverity, SurfaceId, TaskId, TaskLifecycle,
};

use crate::context::{AgentFacts, TickContext};
use crate::deconstruct::chunk_search;
use crate::error::TaskError;
use crate::manager::TaskManager;
use crate::scanning::plan::ScannedPlan;
use crate::task::{AgentTaskDetail, Progress, Task, TaskData, TaskKind};
use crate::walking::walk_to_location::{self, WalkToLocationData};

const PATHING_PREFIX: &str = "Pathing to deconstruction target";
const MINING_TEXT: &str = "Deconstructing target";
const COMPLETED_TEXT: &str = "Deconstruction completed";
const WAITING_TEXT: &str = "Waiting for an available chunk";
const NO_PATH_TARGET_TEXT: &str = "No path to deconstruction target";

/// Assignment bookkeeping for one chunk with deconstruction work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkState {
    /// The chunk.
    pub position: ChunkPosition,
    /// Its assignment state.
    pub assignment: ChunkAssignment,
    /// The agent working it while `Assigned`.
    pub assigned_agent: Option<AgentId>,
}

/// Task-wide distributor state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeconstructChunksData {
    /// Surface the work happens on.
    pub surface: SurfaceId,
    /// Where the first agent starts.
    pub starting_chunk: ChunkPosition,
    /// The scanned plan; this task owns and drains its deconstruction maps.
    pub plan: ScannedPlan,
    /// Assignment state per chunk with deconstruction work.
    pub chunks_state: BTreeMap<ChunkPosition, ChunkState>,
}

impl DeconstructChunksData {
    /// Build distributor state over a scanned plan. Every chunk with a
    /// non-empty deconstruction list starts `Available`.
    #[must_use]
    pub fn new(surface: SurfaceId, plan: ScannedPlan, starting_chunk: ChunkPosition) -> Self {
        let chunks_state = plan
            .chunks
            .iter()
            .filter(|(_, slot)| !slot.to_deconstruct.is_empty())
            .map(|(position, _)| {
                (
                    *position,
                    ChunkState {
                        position: *position,
                        assignment: ChunkAssignment::Available,
                        assigned_agent: None,
                    },
                )
            })
            .collect();
        Self {
            surface,
            starting_chunk,
            plan,
            chunks_state,
        }
    }
}

/// The nearest remaining target in an agent's chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeconstructTarget {
    /// Stable id of the entity being mined.
    pub id: StableEntityId,
    /// Its position, cached for range checks.
    pub position: Position,
}

/// Per-agent distributor state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeconstructAgentState {
    /// The chunk assigned to this agent, if any.
    pub chunk: Option<ChunkPosition>,
    /// The entity this agent is mining or walking toward.
    pub target: Option<DeconstructTarget>,
    /// The embedded per-agent WalkToLocation task, while walking.
    pub walk_task: Option<TaskId>,
}

/// What one pass over the distributor state decided.
enum Step {
    /// Return this progress to the caller.
    Finished(Progress),
    /// Shared state changed; run another pass this tick.
    Reenter,
    /// The agent needs to walk closer to its target.
    SpawnWalk { goal: Position, radius: f64 },
    /// Drive the agent's existing walk child.
    DriveWalk(TaskId),
}

fn data_mut(task: &mut Task) -> Result<&mut DeconstructChunksData, TaskError> {
    let id = task.id;
    match &mut task.data {
        TaskData::DeconstructEntitiesInChunkDetails(data) => Ok(data),
        _ => Err(TaskError::WrongTaskKind {
            task: id,
            expected: TaskKind::DeconstructEntitiesInChunkDetails,
        }),
    }
}

fn with_detail<R>(
    mgr: &mut TaskManager,
    task_id: TaskId,
    agent: AgentId,
    apply: impl FnOnce(&mut DeconstructAgentState) -> R,
) -> Result<R, TaskError> {
    let task = mgr.task_mut(task_id)?;
    let state = task
        .agents
        .get_mut(&agent)
        .ok_or(TaskError::MissingAgentState {
            task: task_id,
            agent,
        })?;
    let AgentTaskDetail::Deconstruct(detail) = &mut state.detail else {
        return Err(TaskError::WrongTaskKind {
            task: task_id,
            expected: TaskKind::DeconstructEntitiesInChunkDetails,
        });
    };
    Ok(apply(detail))
}

pub(crate) fn progress(
    mgr: &mut TaskManager,
    ctx: &mut TickContext<'_>,
    agent: &AgentFacts,
    task_id: TaskId,
) -> Result<Progress, TaskError> {
    let mut reentries = 0;
    loop {
        match next_step(mgr, ctx, agent, task_id)? {
            Step::Finished(progress) => return Ok(progress),
            Step::Reenter => {
                if reentries >= 2 {
                    // Shared state keeps changing under us; yield a tick
                    // rather than loop within it.
                    return Ok(Progress {
                        ticks_to_wait: 1,
                        details: None,
                        standby: false,
                    });
                }
                reentries += 1;
            }
            Step::SpawnWalk { goal, radius } => {
                let (job, surface) = {
                    let task = mgr.task_mut(task_id)?;
                    let job = task.job;
                    (job, data_mut(task)?.surface)
                };
                let child = mgr.create(
                    job,
                    Some(task_id),
                    TaskData::WalkToLocation(WalkToLocationData {
                        surface,
                        end_position: goal,
                        closeness: (radius).max(0.0),
                    }),
                );
                with_detail(mgr, task_id, agent.id, |detail| {
                    detail.walk_task = Some(child);
                })?;
                debug!(task = %task_id, agent = %agent.id, walk = %child, "Walking toward deconstruction target");
            }
            Step::DriveWalk(child) => {
                let step = walk_to_location::progress(mgr, ctx, agent, child)?;
                let walk_status = mgr
                    .task(child)
                    .ok()
                    .and_then(|task| task.agents.get(&agent.id).map(|state| state.status))
                    .unwrap_or(AgentTaskStatus::Active);
                match walk_status {
                    AgentTaskStatus::Completed => {
                        mgr.removing_task(ctx.world, child);
                        with_detail(mgr, task_id, agent.id, |detail| {
                            detail.walk_task = None;
                        })?;
                        if reentries >= 2 {
                            return Ok(Progress {
                                ticks_to_wait: 1,
                                details: None,
                                standby: false,
                            });
                        }
                        reentries += 1;
                    }
                    AgentTaskStatus::NoPath => {
                        warn!(task = %task_id, agent = %agent.id, "No path to deconstruction target; trying another later");
                        mgr.removing_task(ctx.world, child);
                        with_detail(mgr, task_id, agent.id, |detail| {
                            detail.walk_task = None;
                            detail.target = None;
                        })?;
                        return Ok(Progress::wait(
                            ctx.settings.robot.end_of_task_wait_ticks,
                            NO_PATH_TARGET_TEXT,
                            StateSeverity::Warning,
                        ));
                    }
                    _ => {
                        let (text, severity) = step.details.as_ref().map_or_else(
                            || (PATHING_PREFIX.to_owned(), StateSeverity::Normal),
                            |details| {
                                (format!("{PATHING_PREFIX}: {}", details.text), details.severity)
                            },
                        );
                        return Ok(Progress::wait(step.ticks_to_wait.max(1), text, severity));
                    }
                }
            }
        }
    }
}

#[allow(clippy::too_many_lines)]
fn next_step(
    mgr: &mut TaskManager,
    ctx: &mut TickContext<'_>,
    agent: &AgentFacts,
    task_id: TaskId,
) -> Result<Step, TaskError> {
    let task = mgr
        .tasks
        .get_mut(&task_id)
        .ok_or(TaskError::TaskNotFound(task_id))?;
    if task.is_completed() {
        return Ok(Step::Finished(Progress::immediate()));
    }
    let _ = task.ensure_agent(
        agent,
        AgentTaskDetail::Deconstruct(DeconstructAgentState::default()),
    );
    let id = task.id;
    let Task {
        lifecycle,
        data,
        agents,
        ..
    } = task;
    let data = match data {
        TaskData::DeconstructEntitiesInChunkDetails(data) => data,
        _ => {
            return Err(TaskError::WrongTaskKind {
                task: id,
                expected: TaskKind::DeconstructEntitiesInChunkDetails,
            })
        }
    };
    let state = agents.get_mut(&agent.id).ok_or(TaskError::MissingAgentState {
        task: id,
        agent: agent.id,
    })?;
    let AgentTaskDetail::Deconstruct(detail) = &mut state.detail else {
        return Err(TaskError::WrongTaskKind {
            task: id,
            expected: TaskKind::DeconstructEntitiesInChunkDetails,
        });
    };

    if let Some(walk) = detail.walk_task {
        return Ok(Step::DriveWalk(walk));
    }

    // Chunk acquisition: no chunk yet, or the held one is done.
    let needs_chunk = detail.chunk.is_none_or(|chunk| {
        data.chunks_state.get(&chunk).is_none_or(|chunk_state| {
            chunk_state.assignment != ChunkAssignment::Assigned
                || chunk_state.assigned_agent != Some(agent.id)
        })
    });
    if needs_chunk {
        let origin = detail.chunk.unwrap_or(data.starting_chunk);
        let Some(found) = chunk_search::find_available_chunk(
            &data.chunks_state,
            &data.plan.chunk_index,
            data.starting_chunk,
            origin,
        ) else {
            // Another agent may release or complete a chunk later.
            return Ok(Step::Finished(Progress::wait(
                ctx.settings.robot.end_of_task_wait_ticks,
                WAITING_TEXT,
                StateSeverity::Normal,
            )));
        };
        if let Some(chunk_state) = data.chunks_state.get_mut(&found) {
            chunk_state.assignment = ChunkAssignment::Assigned;
            chunk_state.assigned_agent = Some(agent.id);
        }
        detail.chunk = Some(found);
        debug!(task = %id, agent = %agent.id, chunk = %found, "Chunk assigned");
    }
    let Some(chunk) = detail.chunk else {
        return Ok(Step::Reenter);
    };

    // Target selection: nearest remaining entity in the chunk.
    if detail.target.is_none() {
        let agent_position = ctx.world.entity_position(agent.entity)?;
        let mut invalid: Vec<StableEntityId> = Vec::new();
        let mut best: Option<(f64, StableEntityId, Position)> = None;
        if let Some(slot) = data.plan.chunks.get(&chunk) {
            for (entity_id, details) in &slot.to_deconstruct {
                if !ctx.world.entity_is_valid(details.entity) {
                    invalid.push(*entity_id);
                    continue;
                }
                let distance = agent_position.distance(&details.position);
                if best.as_ref().is_none_or(|(nearest, _, _)| distance < *nearest) {
                    best = Some((distance, *entity_id, details.position));
                }
            }
        }
        for entity_id in invalid {
            warn!(task = %id, entity = %entity_id, "Planned entity no longer valid; dropped");
            let _ = data.plan.remove_deconstruct(entity_id);
        }
        let Some((_, entity_id, position)) = best else {
            if let Some(chunk_state) = data.chunks_state.get_mut(&chunk) {
                chunk_state.assignment = ChunkAssignment::Completed;
                chunk_state.assigned_agent = None;
            }
            if data.plan.has_deconstruct_work() {
                return Ok(Step::Reenter);
            }
            *lifecycle = TaskLifecycle::Completed;
            info!(task = %id, "Deconstruction completed");
            return Ok(Step::Finished(Progress::immediate_with(
                COMPLETED_TEXT,
                StateSeverity::Normal,
            )));
        };
        detail.target = Some(DeconstructTarget {
            id: entity_id,
            position,
        });
    }
    let Some(target) = detail.target.clone() else {
        return Ok(Step::Reenter);
    };

    // Mine in place, or walk closer first.
    let agent_position = ctx.world.entity_position(agent.entity)?;
    if agent_position.distance(&target.position) > agent.mining_distance {
        return Ok(Step::SpawnWalk {
            goal: target.position,
            radius: agent.mining_distance - 1.0,
        });
    }

    let Some(details) = data
        .plan
        .chunks
        .get(&chunk)
        .and_then(|slot| slot.to_deconstruct.get(&target.id))
        .cloned()
    else {
        detail.target = None;
        return Ok(Step::Reenter);
    };

    let mining_time = ctx
        .prototypes
        .attribute(&*ctx.world, "entity", &details.name, "mining_time")
        .and_then(|value| value.as_number())
        .unwrap_or(1.0);
    let result = ctx.world.mine_entity(details.entity, agent.entity)?;
    if !result.all_items_fit {
        return Err(TaskError::InventoryOverflow {
            agent: agent.id,
            entity: target.id,
        });
    }
    if !result.mined {
        let _ = data.plan.remove_deconstruct(target.id);
        detail.target = None;
        return Ok(Step::Reenter);
    }

    let mining_ticks = (mining_time * 60.0 / agent.mining_speed).ceil() as u32;
    let mut wait = ctx.settings.robot.deconstruct_time_delay_ticks + mining_ticks;
    if ctx.settings.debug.fast_deconstruct {
        wait /= 10;
    }

    let _ = data.plan.remove_deconstruct(target.id);
    detail.target = None;
    let chunk_drained = data
        .plan
        .chunks
        .get(&chunk)
        .is_none_or(|slot| slot.to_deconstruct.is_empty());
    if chunk_drained {
        if let Some(chunk_state) = data.chunks_state.get_mut(&chunk) {
            chunk_state.assignment = ChunkAssignment::Completed;
            chunk_state.assigned_agent = None;
        }
        debug!(task = %id, agent = %agent.id, chunk = %chunk, "Chunk deconstruction finished");
    }

    if data.plan.has_deconstruct_work() {
        Ok(Step::Finished(Progress::wait(
            wait,
            MINING_TEXT,
            StateSeverity::Normal,
        )))
    } else {
        *lifecycle = TaskLifecycle::Completed;
        info!(task = %id, "Deconstruction completed");
        Ok(Step::Finished(Progress::wait(
            wait,
            COMPLETED_TEXT,
            StateSeverity::Normal,
        )))
    }
}
