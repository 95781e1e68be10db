//! The task manager: task storage, kind dispatch, and the teardown
//! propagation every task kind routes through.
//!
//! Progression dispatches on the closed [`TaskData`] enum. The four
//! propagation walks recurse into a task's planned children (not its
//! runtime per-agent children, which only the deconstruction distributor
//! creates and which are torn down through the per-agent record): release
//! kind-specific resources first, then recurse, then drop the record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use foreman_types::{
    AgentId, AgentTaskStatus, JobId, PathRequestFinished, TaskId, TaskLifecycle,
};
use foreman_world::WorldAdapter;

use crate::complete_area;
use crate::context::{AgentFacts, TickContext};
use crate::deconstruct::deconstruct_chunks;
use crate::error::TaskError;
use crate::registry::PathRequestRegistry;
use crate::scanning::scan_areas;
use crate::task::{AgentTaskDetail, Progress, Task, TaskData, TaskKind};
use crate::walking::get_walking_path::PathSearchOutcome;
use crate::walking::{get_walking_path, walk_path, walk_to_location};

/// Owns every live task and the path request registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskManager {
    pub(crate) tasks: BTreeMap<TaskId, Task>,
    pub(crate) next_id: u64,
    pub(crate) registry: PathRequestRegistry,
}

impl TaskManager {
    /// Create an empty manager.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_id: 0,
            registry: PathRequestRegistry::new(),
        }
    }

    /// Create a task for a job, optionally under a parent.
    pub fn create(&mut self, job: JobId, parent: Option<TaskId>, data: TaskData) -> TaskId {
        self.next_id += 1;
        let id = TaskId::new(self.next_id);
        let _ = self.tasks.insert(
            id,
            Task {
                id,
                job,
                parent,
                lifecycle: TaskLifecycle::Active,
                children: Vec::new(),
                current_child_index: 0,
                data,
                agents: BTreeMap::new(),
            },
        );
        id
    }

    /// Look up a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] for a dead id.
    pub fn task(&self, id: TaskId) -> Result<&Task, TaskError> {
        self.tasks.get(&id).ok_or(TaskError::TaskNotFound(id))
    }

    /// Look up a task mutably.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] for a dead id.
    pub fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, TaskError> {
        self.tasks.get_mut(&id).ok_or(TaskError::TaskNotFound(id))
    }

    /// Number of live tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no tasks are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The path request registry.
    #[must_use]
    pub const fn registry(&self) -> &PathRequestRegistry {
        &self.registry
    }

    /// Progress a job's primary task for one agent. This is the entry the
    /// job manager dispatches into; child tasks are driven by their
    /// parents.
    ///
    /// # Errors
    ///
    /// Propagates [`TaskError`] from the task kind's progression.
    pub fn progress_primary_task(
        &mut self,
        ctx: &mut TickContext<'_>,
        agent: &AgentFacts,
        task_id: TaskId,
    ) -> Result<Progress, TaskError> {
        self.progress(ctx, agent, task_id)
    }

    pub(crate) fn progress(
        &mut self,
        ctx: &mut TickContext<'_>,
        agent: &AgentFacts,
        task_id: TaskId,
    ) -> Result<Progress, TaskError> {
        let kind = self.task(task_id)?.data.kind();
        match kind {
            TaskKind::GetWalkingPath => get_walking_path::progress(self, ctx, agent, task_id),
            TaskKind::WalkPath => walk_path::progress(self, ctx, agent, task_id),
            TaskKind::WalkToLocation => walk_to_location::progress(self, ctx, agent, task_id),
            TaskKind::ScanAreasForActionsToComplete => {
                scan_areas::progress(self, ctx, agent, task_id)
            }
            TaskKind::DeconstructEntitiesInChunkDetails => {
                deconstruct_chunks::progress(self, ctx, agent, task_id)
            }
            TaskKind::CompleteArea => complete_area::progress(self, ctx, agent, task_id),
        }
    }

    /// Deliver a pathfinder completion. Unknown request ids are ignored, so
    /// this is safe to race with teardown.
    pub fn handle_path_request_finished(&mut self, event: &PathRequestFinished) {
        let Some(owner) = self.registry.take(event.request) else {
            debug!(request = %event.request, "Completion for unknown path request ignored");
            return;
        };
        let Some(task) = self.tasks.get_mut(&owner.task) else {
            return;
        };
        let Some(state) = task.agents.get_mut(&owner.agent) else {
            return;
        };
        let AgentTaskDetail::GetWalkingPath(detail) = &mut state.detail else {
            return;
        };
        if let Some(path) = &event.path {
            if path.iter().any(|waypoint| waypoint.needs_destroy_to_reach) {
                warn!(
                    request = %event.request,
                    "Path requires destroying obstacles; destructive path following is not supported"
                );
            }
        }
        detail.request = None;
        detail.outcome = Some(PathSearchOutcome {
            path: event.path.clone(),
            timed_out: event.try_again_later,
        });
        state.status = AgentTaskStatus::Completed;
    }

    /// Remove one agent from a task branch: release the kind's resources
    /// for that agent, recurse into planned children, then drop the
    /// per-agent record. Idempotent.
    pub fn removing_robot_from_task(
        &mut self,
        world: &mut dyn WorldAdapter,
        agent: AgentId,
        task_id: TaskId,
    ) {
        let mut walk_child = None;
        let Some(task) = self.tasks.get_mut(&task_id) else {
            return;
        };
        let kind = task.data.kind();
        match kind {
            TaskKind::WalkPath => {
                if let Some(state) = task.agents.get(&agent) {
                    if state.status == AgentTaskStatus::Active {
                        world.set_walking_command(state.entity, None);
                    }
                }
            }
            TaskKind::WalkToLocation => {
                if let Some(state) = task.agents.get_mut(&agent) {
                    if let AgentTaskDetail::WalkToLocation(detail) = &mut state.detail {
                        if let Some(render) = detail.path_render.take() {
                            world.destroy_render(render);
                        }
                    }
                }
            }
            TaskKind::DeconstructEntitiesInChunkDetails => {
                let Task { data, agents, .. } = &mut *task;
                if let TaskData::DeconstructEntitiesInChunkDetails(data) = data {
                    if let Some(state) = agents.get_mut(&agent) {
                        if let AgentTaskDetail::Deconstruct(detail) = &mut state.detail {
                            walk_child = detail.walk_task.take();
                            if let Some(chunk) = detail.chunk.take() {
                                if let Some(chunk_state) = data.chunks_state.get_mut(&chunk) {
                                    if chunk_state.assigned_agent == Some(agent) {
                                        chunk_state.assigned_agent = None;
                                        if chunk_state.assignment
                                            == foreman_types::ChunkAssignment::Assigned
                                        {
                                            chunk_state.assignment =
                                                foreman_types::ChunkAssignment::Available;
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        let children = task.children.clone();

        if kind == TaskKind::GetWalkingPath {
            let _ = self.registry.remove_owned(task_id, Some(agent));
        }
        if let Some(child) = walk_child {
            self.removing_task(world, child);
        }
        for child in children {
            self.removing_robot_from_task(world, agent, child);
        }
        if let Some(task) = self.tasks.get_mut(&task_id) {
            let _ = task.agents.remove(&agent);
        }
    }

    /// Tear down a whole task branch: release every agent's resources,
    /// recurse into planned children, then drop the tasks. Idempotent.
    /// After this, late world callbacks for the branch are no-ops.
    pub fn removing_task(&mut self, world: &mut dyn WorldAdapter, task_id: TaskId) {
        let mut extra_children: Vec<TaskId> = Vec::new();
        let Some(task) = self.tasks.get_mut(&task_id) else {
            return;
        };
        let kind = task.data.kind();
        match kind {
            TaskKind::WalkPath => {
                for state in task.agents.values() {
                    if state.status == AgentTaskStatus::Active {
                        world.set_walking_command(state.entity, None);
                    }
                }
            }
            TaskKind::WalkToLocation => {
                for state in task.agents.values_mut() {
                    if let AgentTaskDetail::WalkToLocation(detail) = &mut state.detail {
                        if let Some(render) = detail.path_render.take() {
                            world.destroy_render(render);
                        }
                    }
                }
            }
            TaskKind::ScanAreasForActionsToComplete => {
                if let TaskData::ScanAreasForActionsToComplete(data) = &mut task.data {
                    for render in std::mem::take(&mut data.area_renders) {
                        world.destroy_render(render);
                    }
                }
            }
            TaskKind::DeconstructEntitiesInChunkDetails => {
                for state in task.agents.values_mut() {
                    if let AgentTaskDetail::Deconstruct(detail) = &mut state.detail {
                        if let Some(child) = detail.walk_task.take() {
                            extra_children.push(child);
                        }
                    }
                }
            }
            _ => {}
        }
        let children = task.children.clone();

        if kind == TaskKind::GetWalkingPath {
            let _ = self.registry.remove_owned(task_id, None);
        }
        for child in extra_children {
            self.removing_task(world, child);
        }
        for child in children {
            self.removing_task(world, child);
        }
        let _ = self.tasks.remove(&task_id);
    }

    /// Walk a task branch for an agent going to standby: clear transient
    /// walking commands without dropping any state, so the host can later
    /// implement resumption.
    pub fn pausing_robot_for_task(
        &mut self,
        world: &mut dyn WorldAdapter,
        agent: AgentId,
        task_id: TaskId,
    ) {
        let mut walk_child = None;
        let Some(task) = self.tasks.get_mut(&task_id) else {
            return;
        };
        match task.data.kind() {
            TaskKind::WalkPath => {
                if let Some(state) = task.agents.get(&agent) {
                    if state.status == AgentTaskStatus::Active {
                        world.set_walking_command(state.entity, None);
                    }
                }
            }
            TaskKind::DeconstructEntitiesInChunkDetails => {
                if let Some(state) = task.agents.get(&agent) {
                    if let AgentTaskDetail::Deconstruct(detail) = &state.detail {
                        walk_child = detail.walk_task;
                    }
                }
            }
            _ => {}
        }
        let children = task.children.clone();
        if let Some(child) = walk_child {
            self.pausing_robot_for_task(world, agent, child);
        }
        for child in children {
            self.pausing_robot_for_task(world, agent, child);
        }
    }
}
