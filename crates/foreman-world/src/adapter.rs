//! The [`WorldAdapter`] trait: the narrow interface the engine requires
//! from the host simulation.
//!
//! The host world is the only source of external asynchrony -- pathfinder
//! completions arrive as [`PathRequestFinished`] events the host delivers on
//! the engine thread. Everything else is synchronous and single-threaded.
//!
//! [`PathRequestFinished`]: foreman_types::PathRequestFinished

use foreman_types::{
    AttributeValue, BoundingBox, Color, EntityFilter, EntityHandle, ForceId, MineResult,
    PathRequest, PathRequestId, Position, RenderId, SurfaceId, WalkingCommand, Waypoint,
};

use crate::error::WorldError;

/// Parameters for rendering a short text above an entity or position.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRenderParams {
    /// Surface to render on.
    pub surface: SurfaceId,
    /// The text content.
    pub text: String,
    /// Render color.
    pub color: Color,
    /// Entity the text follows, if any.
    pub target_entity: Option<EntityHandle>,
    /// Fixed position the text sits at, if not following an entity.
    pub target_position: Option<Position>,
}

/// Capabilities the engine requires from the host world.
///
/// Every method is synchronous; `request_path` merely enqueues a search
/// whose completion the host later delivers to the engine as a
/// `PathRequestFinished` event. Methods taking an invalid entity handle
/// either report it (`Result`) or no-op (walking commands, renders), so
/// teardown paths never fail.
pub trait WorldAdapter {
    /// The current tick. Monotonically non-decreasing.
    fn current_tick(&self) -> u64;

    // -- entity queries ----------------------------------------------------

    /// All entities intersecting `area` on `surface` that match `filter`.
    fn find_entities(
        &self,
        surface: SurfaceId,
        area: BoundingBox,
        filter: &EntityFilter,
    ) -> Vec<EntityHandle>;

    /// Whether the entity is registered for deconstruction by `force`.
    fn is_registered_for_deconstruction(&self, entity: EntityHandle, force: ForceId) -> bool;

    /// Register interest in the entity's destruction, returning a stable
    /// numeric id. Repeated calls for the same entity return the same id.
    fn register_on_destroyed(&mut self, entity: EntityHandle) -> u64;

    /// Whether the handle refers to a live entity.
    fn entity_is_valid(&self, entity: EntityHandle) -> bool;

    /// The entity's current position.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotValid`] for a dead handle.
    fn entity_position(&self, entity: EntityHandle) -> Result<Position, WorldError>;

    /// The entity's prototype name.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotValid`] for a dead handle.
    fn entity_name(&self, entity: EntityHandle) -> Result<String, WorldError>;

    /// The entity's prototype type.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotValid`] for a dead handle.
    fn entity_type(&self, entity: EntityHandle) -> Result<String, WorldError>;

    /// The surface the entity lives on.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotValid`] for a dead handle.
    fn entity_surface(&self, entity: EntityHandle) -> Result<SurfaceId, WorldError>;

    /// The entity's unit number, when the world assigned one.
    fn entity_unit_number(&self, entity: EntityHandle) -> Option<u64>;

    /// The prototype name this entity is marked to upgrade to, if any.
    fn entity_upgrade_target(&self, entity: EntityHandle) -> Option<String>;

    /// For an entity ghost, the prototype name the ghost will build.
    fn entity_ghost_name(&self, entity: EntityHandle) -> Option<String>;

    // -- pathfinding -------------------------------------------------------

    /// Submit an asynchronous pathfinder request. The completion arrives
    /// later as a `PathRequestFinished` event.
    fn request_path(&mut self, request: PathRequest) -> PathRequestId;

    // -- effects -----------------------------------------------------------

    /// Mine the entity, depositing its products into `into`'s main
    /// inventory, with raise-destroyed semantics on success.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotValid`] when either handle is dead.
    fn mine_entity(
        &mut self,
        entity: EntityHandle,
        into: EntityHandle,
    ) -> Result<MineResult, WorldError>;

    /// Set or clear the entity's persistent walking command. No-op for a
    /// dead handle.
    fn set_walking_command(&mut self, entity: EntityHandle, command: Option<WalkingCommand>);

    // -- prototypes --------------------------------------------------------

    /// Look up one attribute of a prototype. `None` when the prototype or
    /// attribute does not exist.
    fn prototype_attribute(
        &self,
        category: &str,
        name: &str,
        attribute: &str,
    ) -> Option<AttributeValue>;

    // -- rendering ---------------------------------------------------------

    /// Render a short text; returns a handle for later destruction.
    fn render_text(&mut self, params: TextRenderParams) -> RenderId;

    /// Render a rectangle outline on the surface.
    fn render_rectangle(&mut self, surface: SurfaceId, area: BoundingBox, color: Color)
        -> RenderId;

    /// Render a polyline through the waypoints.
    fn render_path(&mut self, surface: SurfaceId, waypoints: &[Waypoint], color: Color)
        -> RenderId;

    /// Destroy a rendering. No-op for an unknown handle.
    fn destroy_render(&mut self, id: RenderId);
}
