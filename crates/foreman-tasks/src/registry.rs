//! The path request registry: correlates outstanding pathfinder requests to
//! the per-agent task state that is awaiting them.
//!
//! Entries are added when a request is submitted and removed either by the
//! completion event or by task teardown, so a completion for an unknown id
//! is safe to ignore. The registry persists with the engine snapshot (the
//! host re-delivers completions after load) but not across engine restarts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use foreman_types::{AgentId, PathRequestId, TaskId};

/// The per-agent task state a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRequestOwner {
    /// The task that submitted the request.
    pub task: TaskId,
    /// The agent the path is for.
    pub agent: AgentId,
}

/// Process-wide mapping `request id -> owner`. Lookups are O(log n).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRequestRegistry {
    entries: BTreeMap<PathRequestId, PathRequestOwner>,
}

impl PathRequestRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register an outstanding request.
    pub fn insert(&mut self, request: PathRequestId, owner: PathRequestOwner) {
        let _ = self.entries.insert(request, owner);
    }

    /// Remove and return the owner of a request, if registered.
    pub fn take(&mut self, request: PathRequestId) -> Option<PathRequestOwner> {
        self.entries.remove(&request)
    }

    /// Whether the request is registered.
    #[must_use]
    pub fn contains(&self, request: PathRequestId) -> bool {
        self.entries.contains_key(&request)
    }

    /// Drop every entry owned by the task -- all agents, or one agent when
    /// given. Returns how many entries were dropped.
    pub fn remove_owned(&mut self, task: TaskId, agent: Option<AgentId>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, owner| owner.task != task || agent.is_some_and(|a| owner.agent != a));
        before - self.entries.len()
    }

    /// Number of outstanding requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no requests are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
