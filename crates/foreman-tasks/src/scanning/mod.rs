//! Area scanning: the chunk-indexed action plan and the multi-batch
//! pipeline that builds it.

pub mod plan;
pub mod scan_areas;
