//! The scanned action plan: every entity the scan found, deduplicated,
//! resolved, and indexed by chunk.
//!
//! Each action class keeps two views that are mutated together: the flat
//! map `stable id -> owning chunk` used for O(log n) removal and emptiness
//! checks, and the per-chunk detail maps that hold the [`EntityDetails`]
//! themselves. The chunk index carries exact column/row bounds for free
//! because it is maintained lazily on every insert; the deconstruction
//! distributor's ring search relies on those bounds.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use foreman_types::{
    ActionClass, ChunkPosition, EntityHandle, ItemRequirement, Position, StableEntityId,
};

/// A resolved entity pending an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDetails {
    /// The stable identifier keying this entity everywhere.
    pub id: StableEntityId,
    /// Live world handle.
    pub entity: EntityHandle,
    /// Resolved prototype name. For ghosts this is the name the ghost will
    /// build; for upgrades the current entity's name.
    pub name: String,
    /// Resolved prototype type.
    pub entity_type: String,
    /// World position.
    pub position: Position,
    /// The chunk this entity was indexed under.
    pub chunk: ChunkPosition,
    /// What is to be done with the entity.
    pub action: ActionClass,
    /// Item the action consumes, if any.
    pub required_item: Option<ItemRequirement>,
}

/// Per-chunk slice of the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDetails {
    /// The chunk's grid position.
    pub position: ChunkPosition,
    /// Entities to deconstruct in this chunk.
    pub to_deconstruct: BTreeMap<StableEntityId, EntityDetails>,
    /// Entities to upgrade, grouped by target entity name.
    pub to_upgrade: BTreeMap<String, BTreeMap<StableEntityId, EntityDetails>>,
    /// Ghosts to build, grouped by the entity name the ghost will build.
    pub to_build: BTreeMap<String, BTreeMap<StableEntityId, EntityDetails>>,
}

impl ChunkDetails {
    /// An empty slice for the given chunk.
    #[must_use]
    pub const fn new(position: ChunkPosition) -> Self {
        Self {
            position,
            to_deconstruct: BTreeMap::new(),
            to_upgrade: BTreeMap::new(),
            to_build: BTreeMap::new(),
        }
    }
}

/// Column/row bounds of the occupied chunk grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkBounds {
    /// Smallest occupied chunk column.
    pub min_x: i32,
    /// Largest occupied chunk column.
    pub max_x: i32,
    /// Smallest occupied chunk row.
    pub min_y: i32,
    /// Largest occupied chunk row.
    pub max_y: i32,
}

/// One occupied column of the chunk index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkColumn {
    /// Smallest occupied row in this column.
    pub min_y: i32,
    /// Largest occupied row in this column.
    pub max_y: i32,
    /// Every occupied row in this column.
    pub rows: BTreeSet<i32>,
}

/// Column-then-row index over occupied chunks, with per-column and global
/// bounds maintained on insert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkIndex {
    /// Occupied columns keyed by chunk x.
    pub columns: BTreeMap<i32, ChunkColumn>,
    /// Global bounds; `None` while the index is empty.
    pub bounds: Option<ChunkBounds>,
}

impl ChunkIndex {
    /// Record that a chunk is occupied.
    pub fn insert(&mut self, chunk: ChunkPosition) {
        let column = self.columns.entry(chunk.x).or_insert_with(|| ChunkColumn {
            min_y: chunk.y,
            max_y: chunk.y,
            rows: BTreeSet::new(),
        });
        column.min_y = column.min_y.min(chunk.y);
        column.max_y = column.max_y.max(chunk.y);
        let _ = column.rows.insert(chunk.y);

        self.bounds = Some(match self.bounds {
            None => ChunkBounds {
                min_x: chunk.x,
                max_x: chunk.x,
                min_y: chunk.y,
                max_y: chunk.y,
            },
            Some(bounds) => ChunkBounds {
                min_x: bounds.min_x.min(chunk.x),
                max_x: bounds.max_x.max(chunk.x),
                min_y: bounds.min_y.min(chunk.y),
                max_y: bounds.max_y.max(chunk.y),
            },
        });
    }

    /// Whether the chunk is recorded.
    #[must_use]
    pub fn contains(&self, chunk: ChunkPosition) -> bool {
        self.columns
            .get(&chunk.x)
            .is_some_and(|column| column.rows.contains(&chunk.y))
    }

    /// The larger of the column span and the row span; the ring search's
    /// termination bound.
    #[must_use]
    pub fn max_span(&self) -> i32 {
        self.bounds.map_or(0, |b| {
            (b.max_x - b.min_x).max(b.max_y - b.min_y)
        })
    }
}

/// The complete scanned plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannedPlan {
    /// Per-chunk detail maps.
    pub chunks: BTreeMap<ChunkPosition, ChunkDetails>,
    /// Flat deconstruction view: stable id to owning chunk.
    pub to_deconstruct: BTreeMap<StableEntityId, ChunkPosition>,
    /// Flat upgrade view.
    pub to_upgrade: BTreeMap<StableEntityId, ChunkPosition>,
    /// Flat build view.
    pub to_build: BTreeMap<StableEntityId, ChunkPosition>,
    /// Occupied-chunk index with bounds.
    pub chunk_index: ChunkIndex,
    /// Aggregated items the plan's actions consume: item name to count.
    pub required_input_items: BTreeMap<String, u32>,
    /// Aggregated items deconstruction is guaranteed to yield.
    pub guaranteed_output_items: BTreeMap<String, u32>,
}

impl ScannedPlan {
    /// Install a deconstruction entry into the chunk map and the flat view.
    pub fn insert_deconstruct(&mut self, details: EntityDetails) {
        let chunk = details.chunk;
        self.chunk_index.insert(chunk);
        let slot = self
            .chunks
            .entry(chunk)
            .or_insert_with(|| ChunkDetails::new(chunk));
        let _ = self.to_deconstruct.insert(details.id, chunk);
        let _ = slot.to_deconstruct.insert(details.id, details);
    }

    /// Install an upgrade entry, grouped under the upgrade target's name.
    pub fn insert_upgrade(&mut self, group: String, details: EntityDetails) {
        let chunk = details.chunk;
        self.chunk_index.insert(chunk);
        let slot = self
            .chunks
            .entry(chunk)
            .or_insert_with(|| ChunkDetails::new(chunk));
        let _ = self.to_upgrade.insert(details.id, chunk);
        let _ = slot
            .to_upgrade
            .entry(group)
            .or_default()
            .insert(details.id, details);
    }

    /// Install a build entry, grouped under the ghost's target name.
    pub fn insert_build(&mut self, group: String, details: EntityDetails) {
        let chunk = details.chunk;
        self.chunk_index.insert(chunk);
        let slot = self
            .chunks
            .entry(chunk)
            .or_insert_with(|| ChunkDetails::new(chunk));
        let _ = self.to_build.insert(details.id, chunk);
        let _ = slot
            .to_build
            .entry(group)
            .or_default()
            .insert(details.id, details);
    }

    /// Remove a deconstruction entry from both views atomically.
    pub fn remove_deconstruct(&mut self, id: StableEntityId) -> Option<EntityDetails> {
        let chunk = self.to_deconstruct.remove(&id)?;
        self.chunks
            .get_mut(&chunk)
            .and_then(|slot| slot.to_deconstruct.remove(&id))
    }

    /// Whether any deconstruction work remains.
    #[must_use]
    pub fn has_deconstruct_work(&self) -> bool {
        !self.to_deconstruct.is_empty()
    }

    /// The corner of the occupied bounds nearest the world origin. This is
    /// where deconstruction starts.
    #[must_use]
    pub fn corner_chunk_nearest_origin(&self) -> Option<ChunkPosition> {
        let bounds = self.chunk_index.bounds?;
        let corners = [
            ChunkPosition::new(bounds.min_x, bounds.min_y),
            ChunkPosition::new(bounds.min_x, bounds.max_y),
            ChunkPosition::new(bounds.max_x, bounds.min_y),
            ChunkPosition::new(bounds.max_x, bounds.max_y),
        ];
        corners
            .into_iter()
            .min_by_key(|corner| (corner.origin_distance_squared(), corner.x, corner.y))
    }
}
