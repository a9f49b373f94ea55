use crate::attribute::AttributeMap;
use crate::catalog::AttributeId;
use crate::holder::HolderOf;
use crate::link::LinkRegister;
use bevy::prelude::{Entity, World};

/// Evicts `(holder, attribute)` and transitively every cached value that
/// read it, located through the link register and the recorded cap links.
/// An already-clean entry cascades nothing, which also breaks cycles.
pub(crate) fn invalidate(world: &mut World, holder: Entity, attribute: AttributeId) {
    let Some(mut map) = world.get_mut::<AttributeMap>(holder) else {
        return;
    };
    if !map.evict(attribute) {
        return;
    }
    let capped = map.capped_by(attribute);

    for target in capped {
        invalidate(world, holder, target);
    }

    let dependents = world
        .get::<HolderOf>(holder)
        .map(|fit| fit.0)
        .and_then(|fit| world.get::<LinkRegister>(fit))
        .map(|register| register.dependents_of(holder, attribute))
        .unwrap_or_default();
    for (dependent, dependent_attr) in dependents {
        invalidate(world, dependent, dependent_attr);
    }
}
