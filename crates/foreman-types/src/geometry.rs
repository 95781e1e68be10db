//! Tile-world geometry: positions, bounding boxes, and chunk coordinates.
//!
//! World positions are `f64` pairs, matching the host pathfinder's wire
//! format. Chunk coordinates are integers obtained by flooring the world
//! coordinate divided by the host's fixed tile-to-chunk divisor.

use serde::{Deserialize, Serialize};

/// The host engine's fixed tile-to-chunk divisor.
pub const CHUNK_TILE_SIZE: f64 = 32.0;

/// A position on a surface, in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Tile x coordinate (east is positive).
    pub x: f64,
    /// Tile y coordinate (south is positive).
    pub y: f64,
}

impl Position {
    /// Create a position from tile coordinates.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// The chunk this position falls in.
    #[must_use]
    pub fn chunk(&self) -> ChunkPosition {
        ChunkPosition {
            x: floor_div(self.x),
            y: floor_div(self.y),
        }
    }
}

/// Floor a world coordinate onto the chunk grid.
///
/// `floor` (not truncation) so that negative coordinates land in the
/// negative chunk: `-0.5` is in chunk `-1`.
fn floor_div(coordinate: f64) -> i32 {
    let floored = (coordinate / CHUNK_TILE_SIZE).floor();
    // Chunk coordinates of any reachable map position fit in i32.
    floored as i32
}

/// Integer chunk coordinates: `floor(world / CHUNK_TILE_SIZE)` per axis.
///
/// Serialized as `"x,y"` because it keys the chunk maps and map keys must
/// be strings in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkPosition {
    /// Chunk column.
    pub x: i32,
    /// Chunk row.
    pub y: i32,
}

impl Serialize for ChunkPosition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{},{}", self.x, self.y))
    }
}

impl<'de> Deserialize<'de> for ChunkPosition {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let (x, y) = text
            .split_once(',')
            .ok_or_else(|| serde::de::Error::custom("expected `x,y` chunk coordinates"))?;
        Ok(Self {
            x: x.trim().parse().map_err(serde::de::Error::custom)?,
            y: y.trim().parse().map_err(serde::de::Error::custom)?,
        })
    }
}

impl ChunkPosition {
    /// Create a chunk position from chunk-grid coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance to another chunk (the ring number it sits on).
    #[must_use]
    pub const fn ring_distance(&self, other: &Self) -> i32 {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        if dx > dy {
            dx
        } else {
            dy
        }
    }

    /// Squared Euclidean distance from this chunk's grid coordinates to the
    /// world origin, for nearest-corner selection.
    #[must_use]
    pub const fn origin_distance_squared(&self) -> i64 {
        let x = self.x as i64;
        let y = self.y as i64;
        x * x + y * y
    }
}

impl core::fmt::Display for ChunkPosition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An axis-aligned rectangle in tile coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// The corner with the smallest x and y.
    pub left_top: Position,
    /// The corner with the largest x and y.
    pub right_bottom: Position,
}

impl BoundingBox {
    /// Create a bounding box from its two corners.
    #[must_use]
    pub const fn new(left_top: Position, right_bottom: Position) -> Self {
        Self {
            left_top,
            right_bottom,
        }
    }

    /// Whether the position lies within the box (inclusive edges).
    #[must_use]
    pub fn contains(&self, position: &Position) -> bool {
        position.x >= self.left_top.x
            && position.x <= self.right_bottom.x
            && position.y >= self.left_top.y
            && position.y <= self.right_bottom.y
    }

    /// The center of the box.
    #[must_use]
    pub fn center(&self) -> Position {
        Position {
            x: (self.left_top.x + self.right_bottom.x) / 2.0,
            y: (self.left_top.y + self.right_bottom.y) / 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_floors_toward_negative_infinity() {
        assert_eq!(Position::new(0.5, 0.5).chunk(), ChunkPosition::new(0, 0));
        assert_eq!(Position::new(31.9, 0.0).chunk(), ChunkPosition::new(0, 0));
        assert_eq!(Position::new(32.0, 0.0).chunk(), ChunkPosition::new(1, 0));
        assert_eq!(Position::new(-0.5, -0.5).chunk(), ChunkPosition::new(-1, -1));
        assert_eq!(Position::new(-32.0, 0.0).chunk(), ChunkPosition::new(-1, 0));
        assert_eq!(Position::new(-32.1, 0.0).chunk(), ChunkPosition::new(-2, 0));
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn ring_distance_is_chebyshev() {
        let origin = ChunkPosition::new(0, 0);
        assert_eq!(origin.ring_distance(&ChunkPosition::new(2, 1)), 2);
        assert_eq!(origin.ring_distance(&ChunkPosition::new(-3, 3)), 3);
        assert_eq!(origin.ring_distance(&origin), 0);
    }

    #[test]
    fn bounding_box_contains_edges() {
        let area = BoundingBox::new(Position::new(0.0, 0.0), Position::new(4.0, 4.0));
        assert!(area.contains(&Position::new(0.0, 0.0)));
        assert!(area.contains(&Position::new(4.0, 4.0)));
        assert!(area.contains(&Position::new(2.0, 3.0)));
        assert!(!area.contains(&Position::new(4.1, 2.0)));
    }

    #[test]
    fn chunk_position_round_trips_as_map_key() {
        let mut map = std::collections::BTreeMap::new();
        let _ = map.insert(ChunkPosition::new(-3, 7), 1_u32);
        let _ = map.insert(ChunkPosition::new(0, 0), 2_u32);
        let json = serde_json::to_string(&map).ok();
        assert!(json.is_some());
        let restored: Result<std::collections::BTreeMap<ChunkPosition, u32>, _> =
            serde_json::from_str(json.as_deref().unwrap_or(""));
        assert_eq!(restored.ok(), Some(map));
    }

    #[test]
    fn bounding_box_center() {
        let area = BoundingBox::new(Position::new(0.0, 2.0), Position::new(4.0, 6.0));
        let center = area.center();
        assert!((center.x - 2.0).abs() < 1e-12);
        assert!((center.y - 4.0).abs() < 1e-12);
    }
}
