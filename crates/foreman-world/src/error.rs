//! Error types for world-adapter operations.

use foreman_types::EntityHandle;

/// Errors that can occur when the engine calls into the world.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The entity handle does not refer to a live entity.
    #[error("entity not valid: {0}")]
    EntityNotValid(EntityHandle),

    /// The prototype is unknown to the world.
    #[error("unknown prototype: {category}/{name}")]
    UnknownPrototype {
        /// Prototype category (e.g. `entity`, `item`).
        category: String,
        /// Prototype name.
        name: String,
    },

    /// The destination inventory does not exist.
    #[error("no inventory on entity {0}")]
    NoInventory(EntityHandle),
}
