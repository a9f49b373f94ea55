use crate::attribute::AttributeMap;
use crate::catalog::{ItemType, ItemTypeId, attrs};
use crate::fit::fit_holders;
use crate::holder::{Holder, HolderKind};
use crate::restriction::{FailureData, RestrictionFailure, RestrictionKind};
use bevy::platform::collections::HashMap;
use bevy::prelude::{Entity, World};

/// Flags holders whose required skills are not trained far enough.
#[derive(Default)]
pub struct SkillRequirementRegister {
    tracked: HashMap<Entity, Vec<(ItemTypeId, i32)>>,
}

impl SkillRequirementRegister {
    pub(crate) fn register_holder(&mut self, holder: Entity, item: &ItemType, _kind: HolderKind) {
        let required = item.required_skills();
        if !required.is_empty() {
            self.tracked.insert(holder, required);
        }
    }

    pub(crate) fn unregister_holder(&mut self, holder: Entity) {
        self.tracked.remove(&holder);
    }

    pub(crate) fn validate(&self, world: &World, fit_entity: Entity) -> Vec<RestrictionFailure> {
        if self.tracked.is_empty() {
            return Vec::new();
        }

        let mut trained: HashMap<ItemTypeId, i32> = HashMap::default();
        for entity in fit_holders(world, fit_entity) {
            let Some(holder) = world.get::<Holder>(entity) else {
                continue;
            };
            if holder.kind != HolderKind::Skill {
                continue;
            }
            let level = world
                .get::<AttributeMap>(entity)
                .and_then(|map| map.base_override(attrs::SKILL_LEVEL))
                .or_else(|| holder.item.base_attribute(attrs::SKILL_LEVEL))
                .unwrap_or(0.0);
            trained.insert(holder.item.id, level as i32);
        }

        let mut failures = Vec::new();
        for (holder, required) in &self.tracked {
            for (skill, required_level) in required {
                let trained_level = trained.get(skill).copied();
                if trained_level.unwrap_or(0) < *required_level {
                    failures.push(RestrictionFailure {
                        kind: RestrictionKind::SkillRequirement,
                        holder: *holder,
                        data: FailureData::SkillRequirement {
                            skill: *skill,
                            required_level: *required_level,
                            trained_level,
                        },
                    });
                }
            }
        }
        failures
    }
}
