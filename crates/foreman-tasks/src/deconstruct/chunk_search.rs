//! Finding the next chunk for a robot: square rings expanding outward from
//! the robot's current chunk, biased away from the job's center.
//!
//! The policy this implements is "nearest available chunk, favouring edges
//! on ties": rings are explored in increasing Chebyshev distance, and within
//! a ring the offsets whose sign points away from the job's bounding-box
//! center are explored first, so two equally-near candidates resolve toward
//! the edge of the work area. The search is bounded by the larger of the
//! occupied column and row spans and inspects each ring cell exactly once.

use std::collections::BTreeMap;

use foreman_types::{ChunkAssignment, ChunkPosition};

use crate::deconstruct::deconstruct_chunks::ChunkState;
use crate::scanning::plan::ChunkIndex;

/// Offsets `-ring..=ring` ordered so the `sign` end comes first.
fn outward_offsets(ring: i32, sign: i32) -> Vec<i32> {
    let ascending: Vec<i32> = (-ring..=ring).collect();
    if sign >= 0 {
        ascending.into_iter().rev().collect()
    } else {
        ascending
    }
}

/// The two perimeter rows of a ring for an interior column, `sign` end
/// first.
const fn perimeter_pair(ring: i32, sign: i32) -> [i32; 2] {
    if sign >= 0 {
        [ring, -ring]
    } else {
        [-ring, ring]
    }
}

fn is_available(chunks_state: &BTreeMap<ChunkPosition, ChunkState>, chunk: ChunkPosition) -> bool {
    chunks_state
        .get(&chunk)
        .is_some_and(|state| state.assignment == ChunkAssignment::Available)
}

/// Find the nearest available chunk for a robot.
///
/// The starting chunk short-circuits the search while it is still
/// available; afterwards square rings expand from `origin` (the robot's
/// assigned or starting chunk). Returns `None` when no available chunk
/// remains anywhere in bounds -- the caller waits and retries, since
/// another agent may later release one.
pub(crate) fn find_available_chunk(
    chunks_state: &BTreeMap<ChunkPosition, ChunkState>,
    index: &ChunkIndex,
    starting_chunk: ChunkPosition,
    origin: ChunkPosition,
) -> Option<ChunkPosition> {
    if is_available(chunks_state, starting_chunk) {
        return Some(starting_chunk);
    }
    let bounds = index.bounds?;

    // Bias each axis away from the bounding-box center; a tie (origin on
    // the center line) takes the positive side, i.e. the far edge.
    let center_x = f64::from(bounds.min_x + bounds.max_x) / 2.0;
    let center_y = f64::from(bounds.min_y + bounds.max_y) / 2.0;
    let sign_x = if f64::from(origin.x) >= center_x { 1 } else { -1 };
    let sign_y = if f64::from(origin.y) >= center_y { 1 } else { -1 };

    for ring in 1..=index.max_span() {
        for dx in outward_offsets(ring, sign_x) {
            if dx.abs() == ring {
                for dy in outward_offsets(ring, sign_y) {
                    let candidate = ChunkPosition::new(origin.x + dx, origin.y + dy);
                    if is_available(chunks_state, candidate) {
                        return Some(candidate);
                    }
                }
            } else {
                for dy in perimeter_pair(ring, sign_y) {
                    let candidate = ChunkPosition::new(origin.x + dx, origin.y + dy);
                    if is_available(chunks_state, candidate) {
                        return Some(candidate);
                    }
                }
            }
        }
    }
    None
}
