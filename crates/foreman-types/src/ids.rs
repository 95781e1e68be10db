//! Type-safe identifier wrappers.
//!
//! Engine-issued identifiers ([`AgentId`], [`JobId`], [`TaskId`]) wrap a
//! `u64` drawn from a per-manager counter that persists with the engine
//! snapshot, so ids remain stable across save/load. Host-issued identifiers
//! ([`EntityHandle`], [`PathRequestId`], [`RenderId`], [`SurfaceId`],
//! [`PlayerId`], [`ForceId`]) are opaque values the world hands out; the
//! engine never invents them.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around a primitive id with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
            Deserialize,
        )]
        pub struct $name(pub $inner);

        impl $name {
            /// Wrap a raw identifier value.
            #[must_use]
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Return the inner identifier value.
            #[must_use]
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an agent (robot), issued by the agent manager.
    AgentId(u64)
}

define_id! {
    /// Unique identifier for a job, issued by the job manager.
    JobId(u64)
}

define_id! {
    /// Unique identifier for a task instance, issued by the task manager.
    TaskId(u64)
}

define_id! {
    /// Identifier of the player that created a job or owns an agent.
    PlayerId(u32)
}

define_id! {
    /// A force (allegiance) token assigned by the host world.
    ForceId(u32)
}

define_id! {
    /// A surface of the host world.
    SurfaceId(u32)
}

define_id! {
    /// Opaque handle to a live world entity.
    EntityHandle(u64)
}

define_id! {
    /// Correlation id for an outstanding pathfinder request.
    PathRequestId(u64)
}

define_id! {
    /// Handle to a rendering created through the world adapter.
    RenderId(u64)
}

/// The identifier used to key an entity across time.
///
/// The world assigns a unit number to registered entities; entities without
/// one (trees, rocks) get a fallback id issued by `register_on_destroyed` at
/// first observation. The two namespaces never mix: a unit number 7 and a
/// destroyed-id 7 refer to different entities.
///
/// Serialized as its display string (`"7"` or `"destroyedId_7"`) because it
/// keys the action-plan maps and map keys must be strings in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StableEntityId {
    /// The world's unit number for the entity.
    Unit(u64),
    /// Fallback id from on-destroy registration, for entities without a
    /// unit number.
    Destroyed(u64),
}

impl core::fmt::Display for StableEntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unit(n) => write!(f, "{n}"),
            Self::Destroyed(n) => write!(f, "destroyedId_{n}"),
        }
    }
}

impl core::str::FromStr for StableEntityId {
    type Err = core::num::ParseIntError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.strip_prefix("destroyedId_") {
            Some(rest) => Ok(Self::Destroyed(rest.parse()?)),
            None => Ok(Self::Unit(text.parse()?)),
        }
    }
}

impl Serialize for StableEntityId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StableEntityId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let agent = AgentId::new(1);
        let job = JobId::new(1);
        // Different types -- the compiler enforces no mixing; the raw
        // values may still collide.
        assert_eq!(agent.into_inner(), job.into_inner());
    }

    #[test]
    fn id_display_matches_inner() {
        let id = TaskId::new(42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn id_roundtrip_serde() {
        let original = AgentId::new(9);
        let json = serde_json::to_string(&original).ok();
        assert!(json.is_some());
        let restored: Result<AgentId, _> = serde_json::from_str(json.as_deref().unwrap_or(""));
        assert_eq!(restored.ok(), Some(original));
    }

    #[test]
    fn stable_id_namespaces_do_not_collide() {
        let unit = StableEntityId::Unit(7);
        let destroyed = StableEntityId::Destroyed(7);
        assert_ne!(unit, destroyed);
        assert_eq!(unit.to_string(), "7");
        assert_eq!(destroyed.to_string(), "destroyedId_7");
    }

    #[test]
    fn stable_id_round_trips_as_map_key() {
        let mut map = std::collections::BTreeMap::new();
        let _ = map.insert(StableEntityId::Unit(3), 1_u32);
        let _ = map.insert(StableEntityId::Destroyed(3), 2_u32);
        let json = serde_json::to_string(&map).ok();
        assert!(json.is_some());
        let restored: Result<std::collections::BTreeMap<StableEntityId, u32>, _> =
            serde_json::from_str(json.as_deref().unwrap_or(""));
        assert_eq!(restored.ok(), Some(map));
    }
}
