//! Plain data structs carried across the world-adapter boundary.
//!
//! Pathfinder request/response payloads, entity query filters, walking
//! commands, mining results, item bookkeeping, and the state-text record
//! rendered above an agent's head.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::enums::{Direction, StateSeverity};
use crate::geometry::{BoundingBox, Position};
use crate::ids::{EntityHandle, ForceId, PathRequestId, SurfaceId};

// ---------------------------------------------------------------------------
// Pathfinding
// ---------------------------------------------------------------------------

/// One point along a found path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// The waypoint's position.
    pub position: Position,
    /// Whether the pathfinder expects an obstacle to be destroyed to pass
    /// through this waypoint. The engine does not support destructive path
    /// following; such paths are delivered unchanged with a warning.
    pub needs_destroy_to_reach: bool,
}

impl Waypoint {
    /// A plain waypoint with no destruction requirement.
    #[must_use]
    pub const fn at(position: Position) -> Self {
        Self {
            position,
            needs_destroy_to_reach: false,
        }
    }
}

/// Behaviour flags of a pathfinder request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRequestFlags {
    /// Allow the pathfinder to answer from its cache.
    pub cache: bool,
    /// Prefer straight paths over strictly shortest ones.
    pub prefer_straight_paths: bool,
    /// Do not interrupt this search in favour of newer requests.
    pub no_break: bool,
}

/// A pathfinder request, field-for-field what the host consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRequest {
    /// Surface to search on.
    pub surface: SurfaceId,
    /// The walker's bounding box.
    pub bounding_box: BoundingBox,
    /// Opaque collision-mask token from the walker's prototype.
    pub collision_mask: String,
    /// Start position.
    pub start: Position,
    /// Goal position.
    pub goal: Position,
    /// Force the search runs as.
    pub force: ForceId,
    /// Acceptable distance from the goal, in tiles (≥ 0).
    pub radius: f64,
    /// Entity whose own collision is ignored during the search.
    pub ignore_entity: Option<EntityHandle>,
    /// Behaviour flags.
    pub flags: PathRequestFlags,
    /// Pathfinder grid resolution modifier, in `[-8, +8]`; higher is finer.
    pub resolution_modifier: i8,
}

/// Completion of a pathfinder request, delivered by the host on the engine
/// thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRequestFinished {
    /// The request this answers.
    pub request: PathRequestId,
    /// The found path, or `None` when no path exists or the search timed out.
    pub path: Option<Vec<Waypoint>>,
    /// The pathfinder was overloaded; the same request may succeed later.
    pub try_again_later: bool,
}

// ---------------------------------------------------------------------------
// Entity queries and effects
// ---------------------------------------------------------------------------

/// Filter for `find_entities` world queries. Empty fields do not constrain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityFilter {
    /// Only entities of this force.
    pub force: Option<ForceId>,
    /// Only entities (not) marked for deconstruction. When `force` is unset
    /// a mark by any force matches.
    pub to_be_deconstructed: Option<bool>,
    /// Only entities (not) marked for upgrade.
    pub to_be_upgraded: Option<bool>,
    /// Only entities whose type is in this set.
    pub types: BTreeSet<String>,
    /// Only entities whose name is in this set.
    pub names: BTreeSet<String>,
}

/// A persistent walking command applied to a world entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkingCommand {
    /// The direction to walk in until overridden.
    pub direction: Direction,
}

/// Outcome of a mine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineResult {
    /// The entity was mined and removed from the world.
    pub mined: bool,
    /// Every product fit into the destination inventory.
    pub all_items_fit: bool,
}

// ---------------------------------------------------------------------------
// Items and prototype attributes
// ---------------------------------------------------------------------------

/// An item an action needs before it can run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRequirement {
    /// Item name.
    pub name: String,
    /// How many of the item the action consumes.
    pub count: u32,
}

/// One product line of a prototype's mining result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemYield {
    /// Item name.
    pub name: String,
    /// Amount produced per mine.
    pub amount: u32,
    /// Drop probability in `[0, 1]`.
    pub probability: f64,
}

/// A prototype attribute value as exposed by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// A numeric attribute (mining time, speed, reach).
    Number(f64),
    /// A boolean attribute.
    Flag(bool),
    /// An opaque string token (collision masks, categories).
    Text(String),
    /// A rectangle attribute (collision or selection boxes).
    Area(BoundingBox),
    /// The items that place this prototype, in host order.
    Items(Vec<String>),
    /// The products mining this prototype yields.
    Products(Vec<ItemYield>),
}

impl AttributeValue {
    /// The numeric value, if this attribute is a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// The first placing item, if this attribute is an item list.
    #[must_use]
    pub fn first_item(&self) -> Option<&str> {
        match self {
            Self::Items(items) => items.first().map(String::as_str),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// State display
// ---------------------------------------------------------------------------

/// An RGBA color, components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red component.
    pub r: f32,
    /// Green component.
    pub g: f32,
    /// Blue component.
    pub b: f32,
    /// Alpha component.
    pub a: f32,
}

impl Color {
    /// White, for routine state text.
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    /// Amber, for warnings.
    pub const AMBER: Self = Self {
        r: 1.0,
        g: 0.75,
        b: 0.0,
        a: 1.0,
    };

    /// Red, for errors.
    pub const RED: Self = Self {
        r: 1.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
}

impl StateSeverity {
    /// The render color for this severity.
    #[must_use]
    pub const fn color(self) -> Color {
        match self {
            Self::Normal => Color::WHITE,
            Self::Warning => Color::AMBER,
            Self::Error => Color::RED,
        }
    }
}

/// A short above-head status produced by a task progress call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDetails {
    /// The status text.
    pub text: String,
    /// Its severity, which determines the render color.
    pub severity: StateSeverity,
}

impl StateDetails {
    /// Build a state record from text and severity.
    pub fn new(text: impl Into<String>, severity: StateSeverity) -> Self {
        Self {
            text: text.into(),
            severity,
        }
    }
}
