mod capital;
mod skill;

use crate::catalog::{ItemType, ItemTypeId};
use crate::fit::Fit;
use crate::holder::HolderKind;
use bevy::prelude::{Component, Entity, World};
use std::fmt;

pub use capital::{CAPITAL_VOLUME, CapitalModuleRegister};
pub use skill::SkillRequirementRegister;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RestrictionKind {
    CapitalModule,
    SkillRequirement,
}

impl fmt::Display for RestrictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestrictionKind::CapitalModule => write!(f, "capital module"),
            RestrictionKind::SkillRequirement => write!(f, "skill requirement"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RestrictionFailure {
    pub kind: RestrictionKind,
    pub holder: Entity,
    pub data: FailureData,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FailureData {
    CapitalModule {
        holder_volume: f64,
        max_subcapital_volume: f64,
    },
    SkillRequirement {
        skill: ItemTypeId,
        required_level: i32,
        trained_level: Option<i32>,
    },
}

/// The restriction registers tracking one fit. Registers read static
/// attributes only, never the calculator.
#[derive(Component)]
pub struct Restrictions {
    registers: Vec<RestrictionRegister>,
}

impl Default for Restrictions {
    fn default() -> Self {
        Self {
            registers: vec![
                RestrictionRegister::Capital(CapitalModuleRegister::default()),
                RestrictionRegister::SkillRequirement(SkillRequirementRegister::default()),
            ],
        }
    }
}

impl Restrictions {
    pub(crate) fn register_holder(&mut self, holder: Entity, item: &ItemType, kind: HolderKind) {
        for register in &mut self.registers {
            register.register_holder(holder, item, kind);
        }
    }

    pub(crate) fn unregister_holder(&mut self, holder: Entity) {
        for register in &mut self.registers {
            register.unregister_holder(holder);
        }
    }

    pub(crate) fn validate(
        &self,
        world: &World,
        fit_entity: Entity,
        fit: &Fit,
    ) -> Vec<RestrictionFailure> {
        let mut failures = Vec::new();
        for register in &self.registers {
            failures.extend(register.validate(world, fit_entity, fit));
        }
        failures
    }
}

pub(crate) enum RestrictionRegister {
    Capital(CapitalModuleRegister),
    SkillRequirement(SkillRequirementRegister),
}

impl RestrictionRegister {
    fn register_holder(&mut self, holder: Entity, item: &ItemType, kind: HolderKind) {
        match self {
            RestrictionRegister::Capital(register) => register.register_holder(holder, item, kind),
            RestrictionRegister::SkillRequirement(register) => {
                register.register_holder(holder, item, kind)
            }
        }
    }

    fn unregister_holder(&mut self, holder: Entity) {
        match self {
            RestrictionRegister::Capital(register) => register.unregister_holder(holder),
            RestrictionRegister::SkillRequirement(register) => register.unregister_holder(holder),
        }
    }

    fn validate(&self, world: &World, fit_entity: Entity, fit: &Fit) -> Vec<RestrictionFailure> {
        match self {
            RestrictionRegister::Capital(register) => register.validate(world, fit),
            RestrictionRegister::SkillRequirement(register) => {
                register.validate(world, fit_entity)
            }
        }
    }
}
