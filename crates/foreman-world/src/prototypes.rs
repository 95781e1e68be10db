//! Process-wide lazy cache of prototype attributes.
//!
//! Prototype attributes are immutable for the lifetime of a world
//! configuration, so the first lookup of `(category, name, attribute)` goes
//! to the adapter and every later one is served from the cache. The cache is
//! cleared at engine (re)initialization; it is never persisted, because the
//! values reflect the world's current configuration rather than saved state.

use std::collections::BTreeMap;

use foreman_types::AttributeValue;

use crate::adapter::WorldAdapter;

/// Two-level map `(category, name) -> attribute -> value`.
///
/// Misses are cached too (as `None`), so an absent attribute costs one
/// adapter call total.
#[derive(Debug, Default)]
pub struct PrototypeCache {
    values: BTreeMap<(String, String), BTreeMap<String, Option<AttributeValue>>>,
}

impl PrototypeCache {
    /// Create an empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Fetch an attribute, consulting the adapter only on first access.
    pub fn attribute(
        &mut self,
        world: &dyn WorldAdapter,
        category: &str,
        name: &str,
        attribute: &str,
    ) -> Option<AttributeValue> {
        let per_prototype = self
            .values
            .entry((category.to_owned(), name.to_owned()))
            .or_default();
        per_prototype
            .entry(attribute.to_owned())
            .or_insert_with(|| world.prototype_attribute(category, name, attribute))
            .clone()
    }

    /// Drop every cached value.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use foreman_types::{BoundingBox, Position, SurfaceId};

    use super::*;
    use crate::sim::SimWorld;

    fn world_with_prototype() -> SimWorld {
        let mut world = SimWorld::new(SurfaceId::new(1));
        world.set_prototype_attribute(
            "entity",
            "rock-huge",
            "mining_time",
            AttributeValue::Number(2.0),
        );
        world
    }

    #[test]
    fn second_lookup_is_served_from_cache() {
        let world = world_with_prototype();
        let mut cache = PrototypeCache::new();

        let first = cache.attribute(&world, "entity", "rock-huge", "mining_time");
        assert_eq!(first, Some(AttributeValue::Number(2.0)));
        assert_eq!(world.prototype_lookups(), 1);

        let second = cache.attribute(&world, "entity", "rock-huge", "mining_time");
        assert_eq!(second, Some(AttributeValue::Number(2.0)));
        assert_eq!(world.prototype_lookups(), 1);
    }

    #[test]
    fn misses_are_cached() {
        let world = world_with_prototype();
        let mut cache = PrototypeCache::new();

        assert_eq!(cache.attribute(&world, "entity", "rock-huge", "absent"), None);
        assert_eq!(cache.attribute(&world, "entity", "rock-huge", "absent"), None);
        assert_eq!(world.prototype_lookups(), 1);
    }

    #[test]
    fn clear_forgets_values() {
        let world = world_with_prototype();
        let mut cache = PrototypeCache::new();

        let _ = cache.attribute(&world, "entity", "rock-huge", "mining_time");
        cache.clear();
        let _ = cache.attribute(&world, "entity", "rock-huge", "mining_time");
        assert_eq!(world.prototype_lookups(), 2);
    }

    #[test]
    fn area_attributes_round_trip() {
        let mut world = SimWorld::new(SurfaceId::new(1));
        let collision = BoundingBox::new(Position::new(-0.2, -0.2), Position::new(0.2, 0.2));
        world.set_prototype_attribute(
            "entity",
            "robot",
            "collision_box",
            AttributeValue::Area(collision),
        );
        let mut cache = PrototypeCache::new();
        assert_eq!(
            cache.attribute(&world, "entity", "robot", "collision_box"),
            Some(AttributeValue::Area(collision))
        );
    }
}
