use crate::catalog::{EffectId, ItemType};
use crate::state::State;
use bevy::platform::collections::HashSet;
use bevy::prelude::{Component, Entity, World};
use std::sync::Arc;

/// A placed instance of an [`ItemType`].
#[derive(Component, Clone, Debug)]
pub struct Holder {
    pub item: Arc<ItemType>,
    pub kind: HolderKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HolderKind {
    Ship,
    Character,
    Module,
    Rig,
    Subsystem,
    Charge,
    Skill,
    Implant,
    Booster,
    Drone,
}

impl HolderKind {
    /// The container a holder of this kind lives in; role holders are the
    /// containers themselves.
    pub fn domain_root(self) -> Option<DomainRoot> {
        match self {
            HolderKind::Module
            | HolderKind::Rig
            | HolderKind::Subsystem
            | HolderKind::Charge => Some(DomainRoot::Ship),
            HolderKind::Skill | HolderKind::Implant | HolderKind::Booster => {
                Some(DomainRoot::Character)
            }
            HolderKind::Drone => Some(DomainRoot::Space),
            HolderKind::Ship | HolderKind::Character => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DomainRoot {
    Ship,
    Character,
    Space,
}

#[derive(Component, Clone, Copy, Debug, Default)]
pub struct HolderState(pub State);

/// Effect ids the holder has switched off.
#[derive(Component, Clone, Debug, Default)]
pub struct DisabledEffects(pub HashSet<EffectId>);

/// The fit this holder belongs to.
#[derive(Component, Debug)]
#[relationship(relationship_target = Holders)]
pub struct HolderOf(pub Entity);

/// All holders currently owned by this fit.
#[derive(Component, Debug)]
#[relationship_target(relationship = HolderOf, linked_spawn)]
pub struct Holders(Vec<Entity>);

impl Holders {
    pub fn entities(&self) -> &[Entity] {
        &self.0
    }
}

/// The module this charge is loaded into.
#[derive(Component, Debug)]
#[relationship(relationship_target = Charges)]
pub struct ChargeOf(pub Entity);

#[derive(Component, Debug)]
#[relationship_target(relationship = ChargeOf, linked_spawn)]
pub struct Charges(Vec<Entity>);

impl Charges {
    pub fn entities(&self) -> &[Entity] {
        &self.0
    }
}

/// Resolves a holder's `other` pairing by lookup; the relation owns nothing.
pub fn paired_with(world: &World, holder: Entity) -> Option<Entity> {
    if let Some(module) = world.get::<ChargeOf>(holder) {
        return Some(module.0);
    }
    world
        .get::<Charges>(holder)
        .and_then(|charges| charges.entities().first().copied())
}
