use crate::catalog::{ItemType, attrs};
use crate::fit::Fit;
use crate::holder::{DomainRoot, Holder, HolderKind};
use crate::restriction::{FailureData, RestrictionFailure, RestrictionKind};
use bevy::platform::collections::HashMap;
use bevy::prelude::{Entity, World};

/// Largest unmodified volume a hull without the capital flag can carry.
pub const CAPITAL_VOLUME: f64 = 4000.0;

/// Flags capital-sized ship equipment fitted to a subcapital hull.
#[derive(Default)]
pub struct CapitalModuleRegister {
    tracked: HashMap<Entity, f64>,
}

impl CapitalModuleRegister {
    pub(crate) fn register_holder(&mut self, holder: Entity, item: &ItemType, kind: HolderKind) {
        if kind.domain_root() != Some(DomainRoot::Ship) {
            return;
        }
        let Some(volume) = item.base_attribute(attrs::VOLUME) else {
            return;
        };
        if volume >= CAPITAL_VOLUME {
            self.tracked.insert(holder, volume);
        }
    }

    pub(crate) fn unregister_holder(&mut self, holder: Entity) {
        self.tracked.remove(&holder);
    }

    pub(crate) fn validate(&self, world: &World, fit: &Fit) -> Vec<RestrictionFailure> {
        if self.tracked.is_empty() {
            return Vec::new();
        }
        let capital_hull = fit
            .ship
            .and_then(|ship| world.get::<Holder>(ship))
            .and_then(|holder| holder.item.base_attribute(attrs::IS_CAPITAL_SIZE))
            .is_some_and(|flag| flag != 0.0);
        if capital_hull {
            return Vec::new();
        }
        self.tracked
            .iter()
            .map(|(holder, volume)| RestrictionFailure {
                kind: RestrictionKind::CapitalModule,
                holder: *holder,
                data: FailureData::CapitalModule {
                    holder_volume: *volume,
                    max_subcapital_volume: CAPITAL_VOLUME,
                },
            })
            .collect()
    }
}
