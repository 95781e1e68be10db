//! [`SimWorld`]: a deterministic in-memory host world.
//!
//! The engine's test suite runs entirely against this implementation. It
//! mirrors the host contract the adapter describes: entity stores with
//! deconstruction/upgrade/ghost marks, a scripted pathfinder whose
//! completions are collected per tick, persistent walking commands
//! integrated at a configurable speed, mining into capacity-limited
//! inventories, and render bookkeeping.
//!
//! The pathfinder is scripted: tests enqueue [`SimPathResponse`] values and
//! each pending request consumes the next one when the tick advances. With
//! no script queued, a request resolves to a three-waypoint straight line
//! from start to goal.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use foreman_types::{
    AttributeValue, BoundingBox, Color, EntityFilter, EntityHandle, ForceId, MineResult,
    PathRequest, PathRequestFinished, PathRequestId, Position, RenderId, SurfaceId,
    WalkingCommand, Waypoint,
};

use crate::adapter::{TextRenderParams, WorldAdapter};
use crate::error::WorldError;

/// Definition of an entity to insert into the simulated world.
#[derive(Debug, Clone)]
pub struct SimEntitySpec {
    /// Prototype name.
    pub name: String,
    /// Prototype type.
    pub entity_type: String,
    /// World position.
    pub position: Position,
    /// Owning force.
    pub force: ForceId,
    /// Unit number, when the world assigns one.
    pub unit_number: Option<u64>,
}

impl SimEntitySpec {
    /// A named entity of the given type at a position.
    pub fn new(
        name: impl Into<String>,
        entity_type: impl Into<String>,
        position: Position,
        force: ForceId,
    ) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            position,
            force,
            unit_number: None,
        }
    }

    /// Attach a unit number.
    #[must_use]
    pub const fn with_unit_number(mut self, unit_number: u64) -> Self {
        self.unit_number = Some(unit_number);
        self
    }
}

/// A scripted answer for the next resolved pathfinder request.
#[derive(Debug, Clone)]
pub enum SimPathResponse {
    /// Deliver exactly these waypoints.
    Found(Vec<Waypoint>),
    /// Deliver a straight three-waypoint line from start to goal.
    Direct,
    /// Report pathfinder overload.
    TryAgainLater,
    /// Report that no path exists.
    NoPath,
}

#[derive(Debug)]
struct SimEntity {
    name: String,
    entity_type: String,
    position: Position,
    force: ForceId,
    unit_number: Option<u64>,
    valid: bool,
    marked_for_deconstruction: BTreeSet<ForceId>,
    upgrade_target: Option<String>,
    ghost_name: Option<String>,
    walking: Option<WalkingCommand>,
}

/// Deterministic in-memory implementation of [`WorldAdapter`].
#[derive(Debug, Default)]
pub struct SimWorld {
    surface: SurfaceId,
    tick: u64,
    entities: BTreeMap<EntityHandle, SimEntity>,
    next_entity: u64,
    destroyed_ids: BTreeMap<EntityHandle, u64>,
    next_destroyed_id: u64,
    prototypes: BTreeMap<(String, String), BTreeMap<String, AttributeValue>>,
    prototype_lookups: Cell<u64>,
    pending_paths: Vec<(PathRequestId, PathRequest)>,
    next_path_request: u64,
    path_script: VecDeque<SimPathResponse>,
    path_requests_submitted: u64,
    renders: BTreeMap<RenderId, Option<TextRenderParams>>,
    next_render: u64,
    text_renders_created: u64,
    walking_speed: f64,
    inventories: BTreeMap<EntityHandle, BTreeMap<String, u32>>,
    inventory_capacity: Option<u32>,
    mined_entities: Vec<EntityHandle>,
}

impl SimWorld {
    /// Create an empty world with one surface and a default walking speed
    /// of 0.15 tiles per tick.
    #[must_use]
    pub fn new(surface: SurfaceId) -> Self {
        Self {
            surface,
            walking_speed: 0.15,
            ..Self::default()
        }
    }

    /// The world's single surface.
    #[must_use]
    pub const fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Insert an entity, returning its handle.
    pub fn add_entity(&mut self, spec: SimEntitySpec) -> EntityHandle {
        self.next_entity += 1;
        let handle = EntityHandle::new(self.next_entity);
        self.entities.insert(
            handle,
            SimEntity {
                name: spec.name,
                entity_type: spec.entity_type,
                position: spec.position,
                force: spec.force,
                unit_number: spec.unit_number,
                valid: true,
                marked_for_deconstruction: BTreeSet::new(),
                upgrade_target: None,
                ghost_name: None,
                walking: None,
            },
        );
        handle
    }

    /// Mark an entity for deconstruction by the given force.
    pub fn mark_for_deconstruction(&mut self, entity: EntityHandle, force: ForceId) {
        if let Some(e) = self.entities.get_mut(&entity) {
            let _ = e.marked_for_deconstruction.insert(force);
        }
    }

    /// Mark an entity for upgrade to the given prototype name.
    pub fn mark_for_upgrade(&mut self, entity: EntityHandle, target: impl Into<String>) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.upgrade_target = Some(target.into());
        }
    }

    /// Turn an entity into a ghost of the given prototype name.
    pub fn set_ghost_name(&mut self, entity: EntityHandle, ghost: impl Into<String>) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.ghost_name = Some(ghost.into());
        }
    }

    /// Invalidate an entity, as an external destruction would.
    pub fn destroy_entity(&mut self, entity: EntityHandle) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.valid = false;
            e.walking = None;
        }
    }

    /// Move an entity to an exact position.
    pub fn teleport(&mut self, entity: EntityHandle, position: Position) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.position = position;
        }
    }

    /// Define one prototype attribute.
    pub fn set_prototype_attribute(
        &mut self,
        category: impl Into<String>,
        name: impl Into<String>,
        attribute: impl Into<String>,
        value: AttributeValue,
    ) {
        let _ = self
            .prototypes
            .entry((category.into(), name.into()))
            .or_default()
            .insert(attribute.into(), value);
    }

    /// Enqueue the answer for the next resolved pathfinder request.
    pub fn script_path_response(&mut self, response: SimPathResponse) {
        self.path_script.push_back(response);
    }

    /// Tiles per tick a walking entity covers.
    pub fn set_walking_speed(&mut self, speed: f64) {
        self.walking_speed = speed;
    }

    /// Cap every inventory at this many total items. `None` is unlimited.
    pub fn set_inventory_capacity(&mut self, capacity: Option<u32>) {
        self.inventory_capacity = capacity;
    }

    /// Advance the world one tick: integrate walking commands and resolve
    /// every pending pathfinder request against the script. Returns the
    /// completion events for the engine to ingest.
    pub fn advance_tick(&mut self) -> Vec<PathRequestFinished> {
        self.tick += 1;
        self.integrate_walking();

        let pending = std::mem::take(&mut self.pending_paths);
        pending
            .into_iter()
            .map(|(id, request)| {
                let response = self.path_script.pop_front().unwrap_or(SimPathResponse::Direct);
                Self::resolve_path(id, &request, response)
            })
            .collect()
    }

    /// Handles of all currently valid entities.
    #[must_use]
    pub fn valid_entities(&self) -> Vec<EntityHandle> {
        self.entities
            .iter()
            .filter(|(_, e)| e.valid)
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// The inventory of an entity.
    #[must_use]
    pub fn inventory(&self, entity: EntityHandle) -> BTreeMap<String, u32> {
        self.inventories.get(&entity).cloned().unwrap_or_default()
    }

    /// Entities mined so far, in order.
    #[must_use]
    pub fn mined_entities(&self) -> &[EntityHandle] {
        &self.mined_entities
    }

    /// The walking command currently applied to an entity.
    #[must_use]
    pub fn walking_command(&self, entity: EntityHandle) -> Option<WalkingCommand> {
        self.entities.get(&entity).and_then(|e| e.walking)
    }

    /// How many pathfinder requests were ever submitted.
    #[must_use]
    pub const fn path_requests_submitted(&self) -> u64 {
        self.path_requests_submitted
    }

    /// How many prototype attribute lookups hit the world.
    #[must_use]
    pub fn prototype_lookups(&self) -> u64 {
        self.prototype_lookups.get()
    }

    /// How many text renders were ever created.
    #[must_use]
    pub const fn text_renders_created(&self) -> u64 {
        self.text_renders_created
    }

    /// How many renders are currently alive.
    #[must_use]
    pub fn live_renders(&self) -> usize {
        self.renders.len()
    }

    /// The text of every live text render, in creation order.
    #[must_use]
    pub fn live_text_contents(&self) -> Vec<String> {
        self.renders
            .values()
            .filter_map(|params| params.as_ref().map(|p| p.text.clone()))
            .collect()
    }

    fn integrate_walking(&mut self) {
        let speed = self.walking_speed;
        for entity in self.entities.values_mut() {
            if !entity.valid {
                continue;
            }
            if let Some(command) = entity.walking {
                let (dx, dy) = command.direction.offset();
                let length = dx.hypot(dy);
                if length > 0.0 {
                    entity.position.x += dx / length * speed;
                    entity.position.y += dy / length * speed;
                }
            }
        }
    }

    fn resolve_path(
        id: PathRequestId,
        request: &PathRequest,
        response: SimPathResponse,
    ) -> PathRequestFinished {
        match response {
            SimPathResponse::Found(waypoints) => PathRequestFinished {
                request: id,
                path: Some(waypoints),
                try_again_later: false,
            },
            SimPathResponse::Direct => {
                let midpoint = Position::new(
                    (request.start.x + request.goal.x) / 2.0,
                    (request.start.y + request.goal.y) / 2.0,
                );
                PathRequestFinished {
                    request: id,
                    path: Some(vec![
                        Waypoint::at(request.start),
                        Waypoint::at(midpoint),
                        Waypoint::at(request.goal),
                    ]),
                    try_again_later: false,
                }
            }
            SimPathResponse::TryAgainLater => PathRequestFinished {
                request: id,
                path: None,
                try_again_later: true,
            },
            SimPathResponse::NoPath => PathRequestFinished {
                request: id,
                path: None,
                try_again_later: false,
            },
        }
    }

    fn live(&self, entity: EntityHandle) -> Result<&SimEntity, WorldError> {
        self.entities
            .get(&entity)
            .filter(|e| e.valid)
            .ok_or(WorldError::EntityNotValid(entity))
    }

    fn matches(&self, entity: &SimEntity, area: &BoundingBox, filter: &EntityFilter) -> bool {
        if !entity.valid || !area.contains(&entity.position) {
            return false;
        }
        if let Some(force) = filter.force {
            if entity.force != force {
                return false;
            }
        }
        if let Some(wanted) = filter.to_be_deconstructed {
            // Marks are force-scoped: with a force filter the mark must come
            // from that force, otherwise a mark by any force matches.
            let marked = match filter.force {
                Some(force) => entity.marked_for_deconstruction.contains(&force),
                None => !entity.marked_for_deconstruction.is_empty(),
            };
            if marked != wanted {
                return false;
            }
        }
        if let Some(wanted) = filter.to_be_upgraded {
            if entity.upgrade_target.is_some() != wanted {
                return false;
            }
        }
        if !filter.types.is_empty() && !filter.types.contains(&entity.entity_type) {
            return false;
        }
        if !filter.names.is_empty() && !filter.names.contains(&entity.name) {
            return false;
        }
        true
    }
}

impl WorldAdapter for SimWorld {
    fn current_tick(&self) -> u64 {
        self.tick
    }

    fn find_entities(
        &self,
        surface: SurfaceId,
        area: BoundingBox,
        filter: &EntityFilter,
    ) -> Vec<EntityHandle> {
        if surface != self.surface {
            return Vec::new();
        }
        self.entities
            .iter()
            .filter(|(_, e)| self.matches(e, &area, filter))
            .map(|(handle, _)| *handle)
            .collect()
    }

    fn is_registered_for_deconstruction(&self, entity: EntityHandle, force: ForceId) -> bool {
        self.entities
            .get(&entity)
            .is_some_and(|e| e.valid && e.marked_for_deconstruction.contains(&force))
    }

    fn register_on_destroyed(&mut self, entity: EntityHandle) -> u64 {
        if let Some(existing) = self.destroyed_ids.get(&entity) {
            return *existing;
        }
        self.next_destroyed_id += 1;
        let id = self.next_destroyed_id;
        let _ = self.destroyed_ids.insert(entity, id);
        id
    }

    fn entity_is_valid(&self, entity: EntityHandle) -> bool {
        self.entities.get(&entity).is_some_and(|e| e.valid)
    }

    fn entity_position(&self, entity: EntityHandle) -> Result<Position, WorldError> {
        Ok(self.live(entity)?.position)
    }

    fn entity_name(&self, entity: EntityHandle) -> Result<String, WorldError> {
        Ok(self.live(entity)?.name.clone())
    }

    fn entity_type(&self, entity: EntityHandle) -> Result<String, WorldError> {
        Ok(self.live(entity)?.entity_type.clone())
    }

    fn entity_surface(&self, entity: EntityHandle) -> Result<SurfaceId, WorldError> {
        let _ = self.live(entity)?;
        Ok(self.surface)
    }

    fn entity_unit_number(&self, entity: EntityHandle) -> Option<u64> {
        self.entities
            .get(&entity)
            .filter(|e| e.valid)
            .and_then(|e| e.unit_number)
    }

    fn entity_upgrade_target(&self, entity: EntityHandle) -> Option<String> {
        self.entities
            .get(&entity)
            .filter(|e| e.valid)
            .and_then(|e| e.upgrade_target.clone())
    }

    fn entity_ghost_name(&self, entity: EntityHandle) -> Option<String> {
        self.entities
            .get(&entity)
            .filter(|e| e.valid)
            .and_then(|e| e.ghost_name.clone())
    }

    fn request_path(&mut self, request: PathRequest) -> PathRequestId {
        self.next_path_request += 1;
        self.path_requests_submitted += 1;
        let id = PathRequestId::new(self.next_path_request);
        debug!(request = %id, goal_x = request.goal.x, goal_y = request.goal.y, "Path request queued");
        self.pending_paths.push((id, request));
        id
    }

    fn mine_entity(
        &mut self,
        entity: EntityHandle,
        into: EntityHandle,
    ) -> Result<MineResult, WorldError> {
        let name = self.live(entity)?.name.clone();
        let _ = self.live(into)?;

        let products = match self
            .prototypes
            .get(&("entity".to_owned(), name))
            .and_then(|attrs| attrs.get("mineable_products"))
        {
            Some(AttributeValue::Products(products)) => products.clone(),
            _ => Vec::new(),
        };

        let incoming: u32 = products.iter().map(|p| p.amount).sum();
        let inventory = self.inventories.entry(into).or_default();
        let held: u32 = inventory.values().sum();
        if let Some(capacity) = self.inventory_capacity {
            if held + incoming > capacity {
                return Ok(MineResult {
                    mined: false,
                    all_items_fit: false,
                });
            }
        }

        for product in products {
            *inventory.entry(product.name).or_insert(0) += product.amount;
        }
        if let Some(e) = self.entities.get_mut(&entity) {
            e.valid = false;
            e.walking = None;
        }
        self.mined_entities.push(entity);
        Ok(MineResult {
            mined: true,
            all_items_fit: true,
        })
    }

    fn set_walking_command(&mut self, entity: EntityHandle, command: Option<WalkingCommand>) {
        if let Some(e) = self.entities.get_mut(&entity) {
            if e.valid {
                e.walking = command;
            }
        }
    }

    fn prototype_attribute(
        &self,
        category: &str,
        name: &str,
        attribute: &str,
    ) -> Option<AttributeValue> {
        self.prototype_lookups.set(self.prototype_lookups.get() + 1);
        self.prototypes
            .get(&(category.to_owned(), name.to_owned()))
            .and_then(|attrs| attrs.get(attribute))
            .cloned()
    }

    fn render_text(&mut self, params: TextRenderParams) -> RenderId {
        self.next_render += 1;
        self.text_renders_created += 1;
        let id = RenderId::new(self.next_render);
        let _ = self.renders.insert(id, Some(params));
        id
    }

    fn render_rectangle(
        &mut self,
        _surface: SurfaceId,
        _area: BoundingBox,
        _color: Color,
    ) -> RenderId {
        self.next_render += 1;
        let id = RenderId::new(self.next_render);
        let _ = self.renders.insert(id, None);
        id
    }

    fn render_path(
        &mut self,
        _surface: SurfaceId,
        _waypoints: &[Waypoint],
        _color: Color,
    ) -> RenderId {
        self.next_render += 1;
        let id = RenderId::new(self.next_render);
        let _ = self.renders.insert(id, None);
        id
    }

    fn destroy_render(&mut self, id: RenderId) {
        let _ = self.renders.remove(&id);
    }
}
