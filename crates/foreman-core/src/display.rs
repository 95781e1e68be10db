//! Above-head agent state text with idempotent updates.
//!
//! Re-rendering the same text every tick would flood the host's render
//! surface, so the display keeps the last-rendered record per agent and
//! only destroys and recreates the rendering when something it is keyed on
//! changes: text, severity, target entity, target position, or surface.

use std::collections::BTreeMap;

use foreman_types::{
    AgentId, EntityHandle, Position, RenderId, StateDetails, StateSeverity, SurfaceId,
};
use foreman_world::{TextRenderParams, WorldAdapter};

/// What was last rendered for an agent.
#[derive(Debug, Clone)]
struct RenderedState {
    render: RenderId,
    text: String,
    severity: StateSeverity,
    surface: SurfaceId,
    entity: Option<EntityHandle>,
    position: Option<Position>,
}

/// Per-agent state text renderer. Not persisted: render handles do not
/// survive a snapshot, so a restored engine re-renders from scratch.
#[derive(Debug, Default)]
pub struct StateDisplay {
    rendered: BTreeMap<AgentId, RenderedState>,
}

impl StateDisplay {
    /// Create an empty display.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rendered: BTreeMap::new(),
        }
    }

    /// Show `details` above the agent's entity. A call with identical
    /// inputs keeps the previous rendering handle.
    pub fn apply(
        &mut self,
        world: &mut dyn WorldAdapter,
        agent: AgentId,
        entity: EntityHandle,
        surface: SurfaceId,
        details: &StateDetails,
    ) {
        let unchanged = self.rendered.get(&agent).is_some_and(|current| {
            current.text == details.text
                && current.severity == details.severity
                && current.surface == surface
                && current.entity == Some(entity)
                && current.position.is_none()
        });
        if unchanged {
            return;
        }

        if let Some(previous) = self.rendered.remove(&agent) {
            world.destroy_render(previous.render);
        }
        let render = world.render_text(TextRenderParams {
            surface,
            text: details.text.clone(),
            color: details.severity.color(),
            target_entity: Some(entity),
            target_position: None,
        });
        let _ = self.rendered.insert(
            agent,
            RenderedState {
                render,
                text: details.text.clone(),
                severity: details.severity,
                surface,
                entity: Some(entity),
                position: None,
            },
        );
    }

    /// Drop an agent's rendering, if any.
    pub fn clear(&mut self, world: &mut dyn WorldAdapter, agent: AgentId) {
        if let Some(previous) = self.rendered.remove(&agent) {
            world.destroy_render(previous.render);
        }
    }

    /// Drop every rendering.
    pub fn clear_all(&mut self, world: &mut dyn WorldAdapter) {
        for (_, previous) in std::mem::take(&mut self.rendered) {
            world.destroy_render(previous.render);
        }
    }
}
