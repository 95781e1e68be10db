//! Jobs and the manager that owns them.
//!
//! A job is a player-issued unit of work with one primary task. Its
//! kind-specific input data is immutable after creation; the primary task
//! is instantiated on the first tick any agent progresses the job. When the
//! primary task completes, the job completes, the task tree is dropped, and
//! every participating agent is spliced out of the job at its next
//! progress. Jobs are never destroyed eagerly; removal is explicit.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use foreman_tasks::{
    AgentFacts, CompleteAreaData, Progress, ScanAreasData, TaskData, TaskManager, TickContext,
    WalkToLocationData,
};
use foreman_types::{
    AgentId, BoundingBox, ForceId, JobId, JobState, PlayerId, Position, SurfaceId, TaskId,
};
use foreman_world::WorldAdapter;

use crate::error::EngineError;

/// The closed set of job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    /// Scan rectangles and carry out the actions found in them.
    CompleteArea,
    /// Send the agent to a position.
    WalkToLocation,
}

impl core::fmt::Display for JobKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::CompleteArea => "CompleteArea",
            Self::WalkToLocation => "WalkToLocation",
        };
        write!(f, "{name}")
    }
}

/// Kind-specific immutable job input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobData {
    /// Complete every marked action inside the rectangles.
    CompleteArea {
        /// Surface the rectangles live on.
        surface: SurfaceId,
        /// The rectangles to complete. May overlap.
        areas: Vec<BoundingBox>,
        /// The force the work is done for.
        force: ForceId,
    },
    /// Walk to a position.
    WalkToLocation {
        /// Surface to walk on.
        surface: SurfaceId,
        /// The destination.
        target: Position,
        /// Acceptable distance from the destination, in tiles.
        closeness: f64,
    },
}

impl JobData {
    /// The kind tag of this data.
    #[must_use]
    pub const fn kind(&self) -> JobKind {
        match self {
            Self::CompleteArea { .. } => JobKind::CompleteArea,
            Self::WalkToLocation { .. } => JobKind::WalkToLocation,
        }
    }

    /// Build the primary task's data for this job kind.
    fn primary_task_data(&self) -> TaskData {
        match self {
            Self::CompleteArea {
                surface,
                areas,
                force,
            } => TaskData::CompleteArea(CompleteAreaData::new(*surface, areas.clone(), *force)),
            Self::WalkToLocation {
                surface,
                target,
                closeness,
            } => TaskData::WalkToLocation(WalkToLocationData {
                surface: *surface,
                end_position: *target,
                closeness: *closeness,
            }),
        }
    }
}

/// A player-issued unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// The job's id.
    pub id: JobId,
    /// Lifecycle state.
    pub state: JobState,
    /// The player that created the job.
    pub player: PlayerId,
    /// Kind-specific immutable input.
    pub data: JobData,
    /// The primary task, while the job is active.
    pub primary_task: Option<TaskId>,
    /// Agents currently participating.
    pub agents: BTreeSet<AgentId>,
    /// Paused jobs are skipped by the scheduling loop.
    pub paused: bool,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
}

/// Creates and tracks jobs, indexed per player, with a global id counter
/// that persists with the snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobManager {
    jobs: BTreeMap<JobId, Job>,
    by_player: BTreeMap<PlayerId, Vec<JobId>>,
    next_id: u64,
}

impl JobManager {
    /// Create an empty manager.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            jobs: BTreeMap::new(),
            by_player: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Create a job for a player.
    pub fn create(&mut self, player: PlayerId, data: JobData) -> JobId {
        self.next_id += 1;
        let id = JobId::new(self.next_id);
        info!(job = %id, kind = %data.kind(), %player, "Job created");
        let _ = self.jobs.insert(
            id,
            Job {
                id,
                state: JobState::Pending,
                player,
                data,
                primary_task: None,
                agents: BTreeSet::new(),
                paused: false,
                created_at: Utc::now(),
            },
        );
        self.by_player.entry(player).or_default().push(id);
        id
    }

    /// Look up a job.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::JobNotFound`] for a dead id.
    pub fn job(&self, id: JobId) -> Result<&Job, EngineError> {
        self.jobs.get(&id).ok_or(EngineError::JobNotFound(id))
    }

    /// The jobs a player has created, in creation order.
    #[must_use]
    pub fn jobs_for_player(&self, player: PlayerId) -> Vec<JobId> {
        self.by_player.get(&player).cloned().unwrap_or_default()
    }

    /// The job's primary task, if instantiated.
    #[must_use]
    pub fn primary_task(&self, id: JobId) -> Option<TaskId> {
        self.jobs.get(&id).and_then(|job| job.primary_task)
    }

    /// Whether the scheduling loop should skip the job.
    #[must_use]
    pub fn is_paused(&self, id: JobId) -> bool {
        self.jobs.get(&id).is_some_and(|job| job.paused)
    }

    /// Progress the job's primary task for one agent, activating the job on
    /// the first call. Completion of the primary task completes the job and
    /// drops its task tree.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::JobNotFound`] for a dead id and propagates
    /// task errors.
    pub fn progress_job_for_agent(
        &mut self,
        tasks: &mut TaskManager,
        ctx: &mut TickContext<'_>,
        agent: &AgentFacts,
        job_id: JobId,
    ) -> Result<Progress, EngineError> {
        let job = self.jobs.get_mut(&job_id).ok_or(EngineError::JobNotFound(job_id))?;
        if job.paused || job.state == JobState::Completed {
            return Ok(Progress::immediate());
        }
        let _ = job.agents.insert(agent.id);

        let primary = if let Some(primary) = job.primary_task {
            primary
        } else {
            job.state = JobState::Active;
            let primary = tasks.create(job_id, None, job.data.primary_task_data());
            job.primary_task = Some(primary);
            info!(job = %job_id, kind = %job.data.kind(), task = %primary, "Job activated");
            primary
        };

        let step = tasks.progress_primary_task(ctx, agent, primary)?;

        if tasks.task(primary).is_ok_and(foreman_tasks::Task::is_completed)
            && job.state != JobState::Completed
        {
            job.state = JobState::Completed;
            job.primary_task = None;
            info!(job = %job_id, "Job completed");
            // Dropping the tree releases path requests, walking commands,
            // and debug overlays for every participant.
            tasks.removing_task(ctx.world, primary);
        }
        Ok(step)
    }

    /// Whether the job has nothing further for this agent.
    #[must_use]
    pub fn is_job_complete_for_agent(&self, id: JobId, _agent: AgentId) -> bool {
        self.jobs
            .get(&id)
            .is_none_or(|job| job.state == JobState::Completed)
    }

    /// Drop an agent from a job, tearing its branch of the task tree.
    pub fn remove_agent_from_job(
        &mut self,
        tasks: &mut TaskManager,
        world: &mut dyn WorldAdapter,
        job_id: JobId,
        agent: AgentId,
    ) {
        if let Some(job) = self.jobs.get_mut(&job_id) {
            let _ = job.agents.remove(&agent);
            if let Some(primary) = job.primary_task {
                tasks.removing_robot_from_task(world, agent, primary);
            }
        }
    }

    /// Pause a job: the scheduling loop skips it until resumed.
    pub fn pause(&mut self, id: JobId) {
        if let Some(job) = self.jobs.get_mut(&id) {
            job.paused = true;
        }
    }

    /// Resume a paused job.
    pub fn resume(&mut self, id: JobId) {
        if let Some(job) = self.jobs.get_mut(&id) {
            job.paused = false;
        }
    }

    /// Remove a job entirely. Its task tree must already be gone (jobs
    /// complete before removal, or the caller tears the tree first).
    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        let job = self.jobs.remove(&id)?;
        if let Some(list) = self.by_player.get_mut(&job.player) {
            list.retain(|candidate| *candidate != id);
        }
        Some(job)
    }

    /// Number of live jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether no jobs exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// The scan data of a job's primary task, for hosts that display plan
    /// summaries. `None` unless the job is an active area job still
    /// scanning.
    #[must_use]
    pub fn scan_data<'a>(&self, tasks: &'a TaskManager, id: JobId) -> Option<&'a ScanAreasData> {
        let primary = self.primary_task(id)?;
        let task = tasks.task(primary).ok()?;
        match &task.data {
            TaskData::ScanAreasForActionsToComplete(data) => Some(data),
            _ => None,
        }
    }
}
