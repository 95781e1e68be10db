//! CompleteArea: scan the rectangles, then deconstruct, with upgrade and
//! build as plug-in points for later task kinds.
//!
//! The scanned plan moves whole from the scan task into the deconstruction
//! task at hand-off, so exactly one task owns the mutation points of the
//! plan at any time. Deconstruction starts at the occupied-bounds corner
//! nearest the world origin.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use foreman_types::{
    BoundingBox, ForceId, StateSeverity, SurfaceId, TaskId, TaskLifecycle,
};

use crate::context::{AgentFacts, TickContext};
use crate::deconstruct::deconstruct_chunks::{self, DeconstructChunksData};
use crate::error::TaskError;
use crate::manager::TaskManager;
use crate::scanning::scan_areas::{self, ScanAreasData};
use crate::task::{AgentTaskDetail, Progress, TaskData, TaskKind};

const AREA_COMPLETE_TEXT: &str = "Area work completed";

/// Which phase the area job is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompleteAreaStage {
    /// Building the scanned plan.
    Scan,
    /// Draining the plan's deconstruction maps.
    Deconstruct,
}

/// Task-wide orchestration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteAreaData {
    /// Surface the rectangles live on.
    pub surface: SurfaceId,
    /// The rectangles to complete.
    pub areas: Vec<BoundingBox>,
    /// The force the work is done for.
    pub force: ForceId,
    /// Current phase.
    pub stage: CompleteAreaStage,
    /// The scan child, once created.
    pub scan_task: Option<TaskId>,
    /// The deconstruction child, once created.
    pub deconstruct_task: Option<TaskId>,
}

impl CompleteAreaData {
    /// Fresh orchestration state for the given rectangles.
    #[must_use]
    pub const fn new(surface: SurfaceId, areas: Vec<BoundingBox>, force: ForceId) -> Self {
        Self {
            surface,
            areas,
            force,
            stage: CompleteAreaStage::Scan,
            scan_task: None,
            deconstruct_task: None,
        }
    }
}

struct Snapshot {
    stage: CompleteAreaStage,
    scan_task: Option<TaskId>,
    deconstruct_task: Option<TaskId>,
}

fn snapshot(mgr: &TaskManager, task_id: TaskId) -> Result<Snapshot, TaskError> {
    let task = mgr.task(task_id)?;
    match &task.data {
        TaskData::CompleteArea(data) => Ok(Snapshot {
            stage: data.stage,
            scan_task: data.scan_task,
            deconstruct_task: data.deconstruct_task,
        }),
        _ => Err(TaskError::WrongTaskKind {
            task: task_id,
            expected: TaskKind::CompleteArea,
        }),
    }
}

pub(crate) fn progress(
    mgr: &mut TaskManager,
    ctx: &mut TickContext<'_>,
    agent: &AgentFacts,
    task_id: TaskId,
) -> Result<Progress, TaskError> {
    {
        let task = mgr.task_mut(task_id)?;
        if task.is_completed() {
            return Ok(Progress::immediate());
        }
        let _ = task.ensure_agent(agent, AgentTaskDetail::None);
    }

    let mut view = snapshot(mgr, task_id)?;

    // Activation: the scan child is created on the first progress call.
    if view.scan_task.is_none() {
        let (job, surface, areas, force) = {
            let task = mgr.task(task_id)?;
            let TaskData::CompleteArea(data) = &task.data else {
                return Err(TaskError::WrongTaskKind {
                    task: task_id,
                    expected: TaskKind::CompleteArea,
                });
            };
            (task.job, data.surface, data.areas.clone(), data.force)
        };
        let scan = mgr.create(
            job,
            Some(task_id),
            TaskData::ScanAreasForActionsToComplete(Box::new(ScanAreasData::new(
                surface, areas, force,
            ))),
        );
        let task = mgr.task_mut(task_id)?;
        task.children.push(scan);
        if let TaskData::CompleteArea(data) = &mut task.data {
            data.scan_task = Some(scan);
        }
        view.scan_task = Some(scan);
        debug!(task = %task_id, scan = %scan, "Area scan started");
    }

    match view.stage {
        CompleteAreaStage::Scan => {
            let Some(scan_id) = view.scan_task else {
                return Ok(Progress::immediate());
            };
            let step = scan_areas::progress(mgr, ctx, agent, scan_id)?;
            if !mgr.task(scan_id)?.is_completed() {
                return Ok(step);
            }

            // Scan finished: take the plan and hand it to deconstruction.
            let plan = {
                let scan = mgr.task_mut(scan_id)?;
                match &mut scan.data {
                    TaskData::ScanAreasForActionsToComplete(data) => std::mem::take(&mut data.plan),
                    _ => {
                        return Err(TaskError::WrongTaskKind {
                            task: scan_id,
                            expected: TaskKind::ScanAreasForActionsToComplete,
                        })
                    }
                }
            };
            if plan.has_deconstruct_work() {
                let starting = plan
                    .corner_chunk_nearest_origin()
                    .unwrap_or(foreman_types::ChunkPosition::new(0, 0));
                let (job, surface) = {
                    let task = mgr.task(task_id)?;
                    let TaskData::CompleteArea(data) = &task.data else {
                        return Err(TaskError::WrongTaskKind {
                            task: task_id,
                            expected: TaskKind::CompleteArea,
                        });
                    };
                    (task.job, data.surface)
                };
                let deconstruct = mgr.create(
                    job,
                    Some(task_id),
                    TaskData::DeconstructEntitiesInChunkDetails(Box::new(
                        DeconstructChunksData::new(surface, plan, starting),
                    )),
                );
                let task = mgr.task_mut(task_id)?;
                task.children.push(deconstruct);
                task.current_child_index = task.children.len() - 1;
                if let TaskData::CompleteArea(data) = &mut task.data {
                    data.deconstruct_task = Some(deconstruct);
                    data.stage = CompleteAreaStage::Deconstruct;
                }
                debug!(task = %task_id, deconstruct = %deconstruct, starting_chunk = %starting, "Deconstruction started");
                return Ok(step);
            }

            // Nothing to deconstruct; upgrade and build execution plug in
            // here once their task kinds exist.
            let task = mgr.task_mut(task_id)?;
            task.lifecycle = TaskLifecycle::Completed;
            info!(task = %task_id, "Area contained no deconstruction work");
            Ok(Progress::immediate_with(
                AREA_COMPLETE_TEXT,
                StateSeverity::Normal,
            ))
        }
        CompleteAreaStage::Deconstruct => {
            let Some(deconstruct_id) = view.deconstruct_task else {
                return Ok(Progress::immediate());
            };
            let step = deconstruct_chunks::progress(mgr, ctx, agent, deconstruct_id)?;
            if mgr.task(deconstruct_id)?.is_completed() {
                let task = mgr.task_mut(task_id)?;
                if !task.is_completed() {
                    task.lifecycle = TaskLifecycle::Completed;
                    info!(task = %task_id, "Area work completed");
                }
            }
            Ok(step)
        }
    }
}
