//! Chunk-level deconstruction: the outward-biased chunk search and the
//! distributor task that assigns chunks and drives the mine/walk loop.

pub mod chunk_search;
pub mod deconstruct_chunks;
