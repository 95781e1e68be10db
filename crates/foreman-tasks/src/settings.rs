//! Tunable parameters consumed by the task layer.
//!
//! These mirror the sections of `foreman-config.yaml`; the engine crate
//! embeds them into its top-level configuration. Every field is defaulted
//! through a named function so partial config files parse.

use serde::{Deserialize, Serialize};

/// All task-layer settings, grouped by concern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Debug visualisation and speed-up toggles.
    #[serde(default)]
    pub debug: DebugSettings,

    /// Per-robot timing parameters.
    #[serde(default)]
    pub robot: RobotSettings,

    /// Area-scan batching budgets.
    #[serde(default)]
    pub scan: ScanSettings,

    /// Pathfinder request parameters.
    #[serde(default)]
    pub pathfinder: PathfinderSettings,
}

/// Debug toggles. All off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugSettings {
    /// Render each found path while a robot walks it.
    #[serde(default)]
    pub show_path_walking: bool,

    /// Render the rectangles of a complete-area job while scanning.
    #[serde(default)]
    pub show_complete_areas: bool,

    /// Divide deconstruction waits by 10.
    #[serde(default)]
    pub fast_deconstruct: bool,
}

/// Per-robot timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotSettings {
    /// Ticks a robot waits when a task has nothing for it right now
    /// (pathfinder timeout back-off, no available chunk).
    #[serde(default = "default_end_of_task_wait_ticks")]
    pub end_of_task_wait_ticks: u32,

    /// Fixed overhead added to every deconstruction, in ticks.
    #[serde(default = "default_deconstruct_time_delay_ticks")]
    pub deconstruct_time_delay_ticks: u32,
}

impl Default for RobotSettings {
    fn default() -> Self {
        Self {
            end_of_task_wait_ticks: default_end_of_task_wait_ticks(),
            deconstruct_time_delay_ticks: default_deconstruct_time_delay_ticks(),
        }
    }
}

/// Area-scan batching budgets. Tuning parameters, not correctness ones:
/// scan results are identical for any positive budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Raw entries deduplicated per progress call.
    #[serde(default = "default_entities_deduped_per_batch")]
    pub entities_deduped_per_batch: u32,

    /// Dedup entries resolved and indexed per progress call.
    #[serde(default = "default_entities_handled_per_batch")]
    pub entities_handled_per_batch: u32,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            entities_deduped_per_batch: default_entities_deduped_per_batch(),
            entities_handled_per_batch: default_entities_handled_per_batch(),
        }
    }
}

/// Pathfinder request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathfinderSettings {
    /// Grid resolution modifier in `[-8, +8]`; higher is finer. Defaults to
    /// the finest profile.
    #[serde(default = "default_resolution_modifier")]
    pub resolution_modifier: i8,
}

impl Default for PathfinderSettings {
    fn default() -> Self {
        Self {
            resolution_modifier: default_resolution_modifier(),
        }
    }
}

const fn default_end_of_task_wait_ticks() -> u32 {
    60
}

const fn default_deconstruct_time_delay_ticks() -> u32 {
    30
}

const fn default_entities_deduped_per_batch() -> u32 {
    1000
}

const fn default_entities_handled_per_batch() -> u32 {
    100
}

const fn default_resolution_modifier() -> i8 {
    8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = EngineSettings::default();
        assert_eq!(settings.robot.end_of_task_wait_ticks, 60);
        assert_eq!(settings.robot.deconstruct_time_delay_ticks, 30);
        assert_eq!(settings.scan.entities_deduped_per_batch, 1000);
        assert_eq!(settings.scan.entities_handled_per_batch, 100);
        assert_eq!(settings.pathfinder.resolution_modifier, 8);
        assert!(!settings.debug.show_path_walking);
        assert!(!settings.debug.fast_deconstruct);
    }
}
