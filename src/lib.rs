pub mod attribute;
pub mod catalog;
pub mod fit;
pub mod holder;
pub mod inspector;
pub mod link;
pub mod modifier;
pub mod restriction;
pub mod state;

use crate::catalog::{AttributeId, Catalog, EffectId, ItemTypeId};
use crate::holder::HolderKind;
use crate::restriction::RestrictionFailure;
use crate::state::State;
use bevy::app::{App, Plugin};
use bevy::prelude::Entity;
use std::error::Error;
use std::fmt;

pub mod prelude {
    pub use crate::LoadoutPlugin;
    pub use crate::attribute::calculator::attribute_value;
    pub use crate::attribute::{AttributeMap, CachedAttributes};
    pub use crate::catalog::{
        AttributeDef, AttributeId, Catalog, EffectCategory, EffectId, GroupId, ItemEffect,
        ItemType, ItemTypeBuilder, ItemTypeId,
    };
    pub use crate::fit::{
        Fit, add_holder, attach_holder, detach_holder, load_charge, remove_holder,
        set_skill_level, spawn_fit, spawn_holder, unload_charge, validate,
    };
    pub use crate::holder::{Holder, HolderKind, HolderState};
    pub use crate::modifier::{
        AttributeModifier, Domain, EffectBuilder, ModFilter, ModOp, ModScope, ModSrc,
    };
    pub use crate::state::{State, disable_effect, enable_effect, set_state};
    pub use crate::{AttributeError, FitError, ValidationError};
}

pub struct LoadoutPlugin;

impl Plugin for LoadoutPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Catalog>();
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AttributeError {
    NotFound {
        holder: Entity,
        attribute: AttributeId,
    },
    WriteProtected(AttributeId),
    NoSuchHolder(Entity),
}

impl fmt::Display for AttributeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeError::NotFound { holder, attribute } => {
                write!(f, "attribute {attribute} not present on holder {holder:?}")
            }
            AttributeError::WriteProtected(attribute) => {
                write!(f, "attribute {attribute} does not accept direct writes")
            }
            AttributeError::NoSuchHolder(entity) => {
                write!(f, "entity {entity:?} is not a holder")
            }
        }
    }
}

impl Error for AttributeError {}

#[derive(Clone, Debug, PartialEq)]
pub enum FitError {
    UnknownType(ItemTypeId),
    NoSuchFit(Entity),
    NoSuchHolder(Entity),
    NotInFit(Entity),
    AlreadyFitted(Entity),
    SlotTaken(HolderKind),
    KindMismatch(HolderKind),
    InvalidState {
        requested: State,
        max: State,
    },
    UnknownEffect(EffectId),
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitError::UnknownType(id) => write!(f, "item type {id} is not in the catalog"),
            FitError::NoSuchFit(entity) => write!(f, "entity {entity:?} is not a fit"),
            FitError::NoSuchHolder(entity) => write!(f, "entity {entity:?} is not a holder"),
            FitError::NotInFit(entity) => write!(f, "holder {entity:?} is not in a fit"),
            FitError::AlreadyFitted(entity) => {
                write!(f, "holder {entity:?} already belongs to a fit")
            }
            FitError::SlotTaken(kind) => write!(f, "the {kind:?} slot is already filled"),
            FitError::KindMismatch(kind) => {
                write!(f, "a {kind:?} holder cannot be added this way")
            }
            FitError::InvalidState { requested, max } => {
                write!(f, "state {requested} exceeds the type's maximum {max}")
            }
            FitError::UnknownEffect(id) => write!(f, "effect {id} is not on this holder's type"),
        }
    }
}

impl Error for FitError {}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidationError {
    pub failures: Vec<RestrictionFailure>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fit validation failed with {} restriction failure(s)",
            self.failures.len()
        )
    }
}

impl Error for ValidationError {}
