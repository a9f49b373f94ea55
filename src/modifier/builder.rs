use crate::catalog::{
    AttributeId, BuildStatus, EffectCategory, EffectId, GroupId, ItemEffect, ItemTypeId,
};
use crate::modifier::expression::{ExprNode, compile_expressions};
use crate::modifier::{AttributeModifier, Domain, ModFilter, ModOp, ModScope, ModSrc};
use bevy::log::warn;
use serde::Deserialize;
use std::sync::Arc;

/// One declarative modifier record, field names per the upstream dump
/// format.
#[derive(Clone, Debug, Deserialize)]
pub struct ModifierInfo {
    pub func: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(rename = "modifiedAttributeID")]
    pub modified_attribute_id: i32,
    #[serde(rename = "modifyingAttributeID")]
    pub modifying_attribute_id: i32,
    // Operator encoding: pre-assignment = -1 through post-assignment = 7.
    pub operator: i32,
    #[serde(rename = "groupID", default)]
    pub group_id: Option<i32>,
    #[serde(rename = "skillTypeID", default)]
    pub skill_type_id: Option<i32>,
}

pub fn parse_modifier_infos(payload: &str) -> serde_json::Result<Vec<ModifierInfo>> {
    serde_json::from_str(payload)
}

/// Assembles one effect from declarative records, a legacy expression-tree
/// pair, or pre-compiled modifiers. Malformed entries are logged and
/// dropped.
pub struct EffectBuilder {
    id: EffectId,
    category: EffectCategory,
    infos: Vec<ModifierInfo>,
    expressions: Option<(ExprNode, ExprNode)>,
    prebuilt: Vec<AttributeModifier>,
}

impl EffectBuilder {
    pub fn new(id: EffectId, category: EffectCategory) -> Self {
        Self {
            id,
            category,
            infos: Vec::new(),
            expressions: None,
            prebuilt: Vec::new(),
        }
    }

    pub fn modifier_info(mut self, info: ModifierInfo) -> Self {
        self.infos.push(info);
        self
    }

    pub fn modifier_infos(mut self, infos: impl IntoIterator<Item = ModifierInfo>) -> Self {
        self.infos.extend(infos);
        self
    }

    /// Legacy form: an installing pre-expression and an undoing
    /// post-expression.
    pub fn expressions(mut self, pre: ExprNode, post: ExprNode) -> Self {
        self.expressions = Some((pre, post));
        self
    }

    pub fn modifier(mut self, modifier: AttributeModifier) -> Self {
        self.prebuilt.push(modifier);
        self
    }

    pub fn build(self) -> ItemEffect {
        let has_sources =
            !self.infos.is_empty() || self.expressions.is_some() || !self.prebuilt.is_empty();
        let Some(floor) = self.category.state_floor() else {
            if has_sources {
                warn!(
                    "effect {}: category {:?} is not modelled, modifiers dropped",
                    self.id, self.category
                );
            }
            return ItemEffect {
                id: self.id,
                category: self.category,
                modifiers: Vec::new(),
                build_status: if has_sources {
                    BuildStatus::Error
                } else {
                    BuildStatus::OkFull
                },
            };
        };

        let mut built = Vec::new();
        let mut dropped = 0usize;
        for info in &self.infos {
            match convert_info(info) {
                Ok(modifier) => built.push(modifier),
                Err(reason) => {
                    warn!("malformed modifier on effect {}: {reason}", self.id);
                    dropped += 1;
                }
            }
        }
        if let Some((pre, post)) = &self.expressions {
            let (modifiers, bad) = compile_expressions(pre, post);
            built.extend(modifiers);
            dropped += bad;
        }
        built.extend(self.prebuilt);

        // The effect category supplies the state floor; hand-built modifiers
        // may already sit higher.
        for modifier in &mut built {
            modifier.state = modifier.state.max(floor);
        }

        let build_status = if dropped == 0 {
            BuildStatus::OkFull
        } else if built.is_empty() {
            BuildStatus::Error
        } else {
            BuildStatus::OkPartial
        };
        ItemEffect {
            id: self.id,
            category: self.category,
            modifiers: built.into_iter().map(Arc::new).collect(),
            build_status,
        }
    }
}

fn convert_info(info: &ModifierInfo) -> Result<AttributeModifier, String> {
    let op = ModOp::from_code(info.operator)
        .ok_or_else(|| format!("unknown operator {}", info.operator))?;

    let (domain, scope) = match info.func.as_str() {
        // Owner-bound funcs always root at the character.
        "OwnerRequiredSkillModifier" => (Domain::Character, ModScope::Local),
        _ => parse_domain(info.domain.as_deref())?,
    };

    let filter = match info.func.as_str() {
        "ItemModifier" => ModFilter::Item,
        "LocationModifier" => ModFilter::All,
        "LocationGroupModifier" => {
            let group = info
                .group_id
                .ok_or_else(|| "groupID missing on group filter".to_string())?;
            ModFilter::Group(GroupId(group))
        }
        "LocationRequiredSkillModifier" | "OwnerRequiredSkillModifier" => {
            skill_filter(info.skill_type_id)?
        }
        other => return Err(format!("unknown func {other}")),
    };

    Ok(AttributeModifier {
        state: crate::state::State::Offline,
        scope,
        src: ModSrc::Attribute(AttributeId(info.modifying_attribute_id)),
        op,
        tgt_attr: AttributeId(info.modified_attribute_id),
        domain,
        filter,
    })
}

fn parse_domain(domain: Option<&str>) -> Result<(Domain, ModScope), String> {
    match domain {
        Some("itemID") => Ok((Domain::SelfItem, ModScope::Local)),
        Some("shipID") => Ok((Domain::Ship, ModScope::Local)),
        Some("charID") => Ok((Domain::Character, ModScope::Local)),
        Some("otherID") => Ok((Domain::Other, ModScope::Local)),
        Some("targetID") => Ok((Domain::Ship, ModScope::Projected)),
        Some(other) => Err(format!("unknown domain {other}")),
        None => Err("domain missing".to_string()),
    }
}

fn skill_filter(skill_type_id: Option<i32>) -> Result<ModFilter, String> {
    let skill = skill_type_id.ok_or_else(|| "skillTypeID missing on skill filter".to_string())?;
    if ItemTypeId(skill) == ItemTypeId::OWNER_SELF {
        Ok(ModFilter::SkillSelf)
    } else {
        Ok(ModFilter::Skill(ItemTypeId(skill)))
    }
}
