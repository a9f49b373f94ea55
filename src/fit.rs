use crate::attribute::AttributeMap;
use crate::attribute::invalidate::invalidate;
use crate::catalog::{Catalog, ItemTypeId, attrs};
use crate::holder::{
    ChargeOf, Charges, DisabledEffects, Holder, HolderKind, HolderOf, HolderState, Holders,
};
use crate::link::{
    LinkRegister, RoleSlot, affectee_keys, disable_affector, enable_affector,
};
use crate::modifier::{Affector, ModScope};
use crate::restriction::Restrictions;
use crate::{AttributeError, FitError, ValidationError};
use bevy::log::debug;
use bevy::prelude::{Component, Entity, World};

/// The singletons modifiers resolve `ship` and `character` domains against.
#[derive(Component, Debug, Default)]
pub struct Fit {
    pub ship: Option<Entity>,
    pub character: Option<Entity>,
}

pub fn spawn_fit(world: &mut World) -> Entity {
    world
        .spawn((Fit::default(), LinkRegister::default(), Restrictions::default()))
        .id()
}

/// Creates a detached holder; it emits and receives nothing until attached.
pub fn spawn_holder(
    world: &mut World,
    item_type: ItemTypeId,
    kind: HolderKind,
) -> Result<Entity, FitError> {
    let item = world
        .get_resource::<Catalog>()
        .and_then(|catalog| catalog.item_type(item_type))
        .ok_or(FitError::UnknownType(item_type))?;
    let holder = world
        .spawn((
            Holder { item, kind },
            HolderState::default(),
            DisabledEffects::default(),
            AttributeMap::default(),
        ))
        .id();
    Ok(holder)
}

/// Registers a holder with a fit as one composite step. All checks precede
/// the first mutation, so a failure leaves both sides untouched.
pub fn attach_holder(world: &mut World, fit: Entity, holder: Entity) -> Result<(), FitError> {
    let Some(h) = world.get::<Holder>(holder) else {
        return Err(FitError::NoSuchHolder(holder));
    };
    let kind = h.kind;
    if kind == HolderKind::Charge {
        return Err(FitError::KindMismatch(kind));
    }
    if world.get::<HolderOf>(holder).is_some() {
        return Err(FitError::AlreadyFitted(holder));
    }
    let Some(f) = world.get::<Fit>(fit) else {
        return Err(FitError::NoSuchFit(fit));
    };
    match kind {
        HolderKind::Ship if f.ship.is_some() => return Err(FitError::SlotTaken(kind)),
        HolderKind::Character if f.character.is_some() => {
            return Err(FitError::SlotTaken(kind));
        }
        _ => {}
    }

    register_in_fit(world, fit, holder);
    Ok(())
}

pub fn add_holder(
    world: &mut World,
    fit: Entity,
    item_type: ItemTypeId,
    kind: HolderKind,
) -> Result<Entity, FitError> {
    if kind == HolderKind::Charge {
        return Err(FitError::KindMismatch(kind));
    }
    let holder = spawn_holder(world, item_type, kind)?;
    match attach_holder(world, fit, holder) {
        Ok(()) => Ok(holder),
        Err(err) => {
            // Roll the spawn back so the failed add leaves nothing behind.
            if let Ok(entity) = world.get_entity_mut(holder) {
                entity.despawn();
            }
            Err(err)
        }
    }
}

/// Loads a charge and resolves the `other` pairing on both sides.
pub fn load_charge(
    world: &mut World,
    module: Entity,
    item_type: ItemTypeId,
) -> Result<Entity, FitError> {
    let Some(h) = world.get::<Holder>(module) else {
        return Err(FitError::NoSuchHolder(module));
    };
    if h.kind != HolderKind::Module {
        return Err(FitError::KindMismatch(h.kind));
    }
    let Some(fit) = world.get::<HolderOf>(module).map(|f| f.0) else {
        return Err(FitError::NotInFit(module));
    };
    if world
        .get::<Charges>(module)
        .is_some_and(|charges| !charges.entities().is_empty())
    {
        return Err(FitError::SlotTaken(HolderKind::Charge));
    }

    let charge = spawn_holder(world, item_type, HolderKind::Charge)?;
    world.entity_mut(charge).insert(ChargeOf(module));
    register_in_fit(world, fit, charge);

    // Re-place whatever the module had waiting on the pairing.
    let activated = match world.get_mut::<LinkRegister>(fit) {
        Some(mut register) => register.set_other(module, charge),
        None => Vec::new(),
    };
    for (affector, target) in activated {
        invalidate(world, target, affector.modifier.tgt_attr);
    }
    Ok(charge)
}

/// Unloads a module's charge. Unloading an empty module is a no-op.
pub fn unload_charge(world: &mut World, module: Entity) -> Result<(), FitError> {
    let Some(charge) = world
        .get::<Charges>(module)
        .and_then(|charges| charges.entities().first().copied())
    else {
        return Ok(());
    };
    remove_holder(world, charge)
}

/// Detaches a holder, reversing every registration; the holder survives.
pub fn detach_holder(world: &mut World, holder: Entity) -> Result<(), FitError> {
    let Some(fit) = world.get::<HolderOf>(holder).map(|f| f.0) else {
        return Err(FitError::NotInFit(holder));
    };
    let kind = world
        .get::<Holder>(holder)
        .map(|h| h.kind)
        .ok_or(FitError::NoSuchHolder(holder))?;

    // A module takes its loaded charge along.
    let charges: Vec<Entity> = world
        .get::<Charges>(holder)
        .map(|charges| charges.entities().to_vec())
        .unwrap_or_default();
    for charge in charges {
        detach_holder(world, charge)?;
    }

    let emitted = world
        .get::<LinkRegister>(fit)
        .map(|register| register.emitted_affectors(holder))
        .unwrap_or_default();
    for affector in emitted {
        disable_affector(world, fit, affector);
    }

    if let Some(mut restrictions) = world.get_mut::<Restrictions>(fit) {
        restrictions.unregister_holder(holder);
    }
    if let Some(mut register) = world.get_mut::<LinkRegister>(fit) {
        register.unregister_affectee(holder);
    }

    match kind {
        HolderKind::Ship => {
            if let Some(mut f) = world.get_mut::<Fit>(fit) {
                f.ship = None;
            }
            if let Some(mut register) = world.get_mut::<LinkRegister>(fit) {
                register.set_role(RoleSlot::Ship, None);
            }
        }
        HolderKind::Character => {
            if let Some(mut f) = world.get_mut::<Fit>(fit) {
                f.character = None;
            }
            if let Some(mut register) = world.get_mut::<LinkRegister>(fit) {
                register.set_role(RoleSlot::Character, None);
            }
        }
        _ => {}
    }

    let mut entity = world.entity_mut(holder);
    entity.remove::<HolderOf>();
    if kind == HolderKind::Charge {
        entity.remove::<ChargeOf>();
    }
    // Computed values are stale once the links are gone.
    if let Some(mut map) = world.get_mut::<AttributeMap>(holder) {
        map.clear_computed();
    }
    debug!("holder {holder:?} detached");
    Ok(())
}

/// Detach and despawn.
pub fn remove_holder(world: &mut World, holder: Entity) -> Result<(), FitError> {
    detach_holder(world, holder)?;
    if let Ok(entity) = world.get_entity_mut(holder) {
        entity.despawn();
    }
    Ok(())
}

/// Writes a skill's trained level and flushes everything that read it.
pub fn set_skill_level(
    world: &mut World,
    holder: Entity,
    level: i32,
) -> Result<(), AttributeError> {
    let Some(mut map) = world.get_mut::<AttributeMap>(holder) else {
        return Err(AttributeError::NoSuchHolder(holder));
    };
    map.write(attrs::SKILL_LEVEL, f64::from(level))?;
    invalidate(world, holder, attrs::SKILL_LEVEL);
    Ok(())
}

/// Runs every restriction register; failures accumulate.
pub fn validate(world: &World, fit: Entity) -> Result<(), ValidationError> {
    let (Some(restrictions), Some(f)) = (
        world.get::<Restrictions>(fit),
        world.get::<Fit>(fit),
    ) else {
        return Ok(());
    };
    let failures = restrictions.validate(world, fit, f);
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { failures })
    }
}

fn register_in_fit(world: &mut World, fit: Entity, holder: Entity) {
    let Some(h) = world.get::<Holder>(holder) else {
        return;
    };
    let item = h.item.clone();
    let kind = h.kind;

    world.entity_mut(holder).insert(HolderOf(fit));

    if let Some(mut register) = world.get_mut::<LinkRegister>(fit) {
        register.register_affectee(holder, affectee_keys(&item, kind));
    }

    let role = match kind {
        HolderKind::Ship => Some(RoleSlot::Ship),
        HolderKind::Character => Some(RoleSlot::Character),
        _ => None,
    };
    if let Some(role) = role {
        if let Some(mut f) = world.get_mut::<Fit>(fit) {
            match role {
                RoleSlot::Ship => f.ship = Some(holder),
                RoleSlot::Character => f.character = Some(holder),
            }
        }
        let activated = match world.get_mut::<LinkRegister>(fit) {
            Some(mut register) => register.set_role(role, Some(holder)),
            None => Vec::new(),
        };
        for (affector, target) in activated {
            invalidate(world, target, affector.modifier.tgt_attr);
        }
    }

    if let Some(mut restrictions) = world.get_mut::<Restrictions>(fit) {
        restrictions.register_holder(holder, &item, kind);
    }

    // Bring up whatever the holder's current state already allows.
    let state = world
        .get::<HolderState>(holder)
        .map(|s| s.0)
        .unwrap_or_default();
    let disabled = world
        .get::<DisabledEffects>(holder)
        .map(|d| d.0.clone())
        .unwrap_or_default();
    for effect in &item.effects {
        if disabled.contains(&effect.id) {
            continue;
        }
        for modifier in &effect.modifiers {
            if modifier.scope != ModScope::Local || modifier.state > state {
                continue;
            }
            enable_affector(world, fit, Affector::new(holder, modifier.clone()));
        }
    }
}

pub fn fit_holders(world: &World, fit: Entity) -> Vec<Entity> {
    world
        .get::<Holders>(fit)
        .map(|holders| holders.entities().to_vec())
        .unwrap_or_default()
}
