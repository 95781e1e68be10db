//! Walking task kinds: path search, path following, and the composite that
//! retries and re-plans.

pub mod get_walking_path;
pub mod walk_path;
pub mod walk_to_location;
