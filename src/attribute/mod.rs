pub mod calculator;
pub(crate) mod invalidate;

use crate::AttributeError;
use crate::catalog::{AttributeId, attrs};
use bevy::ecs::system::SystemParam;
use bevy::platform::collections::HashMap;
use bevy::prelude::{Component, Entity, Query};

/// Per-holder store of computed attribute values. Entries appear lazily on
/// read; eviction means stale, and the next read recomputes.
#[derive(Component, Debug, Default)]
pub struct AttributeMap {
    computed: HashMap<AttributeId, f64>,
    overrides: HashMap<AttributeId, f64>,
    // capping attribute -> attributes clamped by it.
    cap_links: HashMap<AttributeId, Vec<AttributeId>>,
}

impl AttributeMap {
    pub fn cached(&self, attribute: AttributeId) -> Option<f64> {
        self.computed.get(&attribute).copied()
    }

    /// Only the skill level accepts outside writes.
    pub fn write(&mut self, attribute: AttributeId, value: f64) -> Result<(), AttributeError> {
        if attribute != attrs::SKILL_LEVEL {
            return Err(AttributeError::WriteProtected(attribute));
        }
        self.overrides.insert(attribute, value);
        Ok(())
    }

    pub(crate) fn base_override(&self, attribute: AttributeId) -> Option<f64> {
        self.overrides.get(&attribute).copied()
    }

    pub(crate) fn memoize(&mut self, attribute: AttributeId, value: f64) {
        self.computed.insert(attribute, value);
    }

    pub(crate) fn evict(&mut self, attribute: AttributeId) -> bool {
        self.computed.remove(&attribute).is_some()
    }

    pub(crate) fn capped_by(&self, attribute: AttributeId) -> Vec<AttributeId> {
        self.cap_links.get(&attribute).cloned().unwrap_or_default()
    }

    pub(crate) fn record_cap(&mut self, cap: AttributeId, target: AttributeId) {
        let targets = self.cap_links.entry(cap).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    /// Drops computed values and cap links. Written skill levels survive.
    pub(crate) fn clear_computed(&mut self) {
        self.computed.clear();
        self.cap_links.clear();
    }
}

/// Read-only view over memoized values for ordinary systems; never computes.
#[derive(SystemParam)]
pub struct CachedAttributes<'w, 's> {
    maps: Query<'w, 's, &'static AttributeMap>,
}

impl CachedAttributes<'_, '_> {
    pub fn cached(&self, holder: Entity, attribute: AttributeId) -> Option<f64> {
        self.maps.get(holder).ok().and_then(|map| map.cached(attribute))
    }
}
