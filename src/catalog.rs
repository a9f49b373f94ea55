use crate::state::State;
use bevy::platform::collections::HashMap;
use bevy::prelude::Resource;
use smol_str::SmolStr;
use std::fmt;
use std::sync::Arc;

use crate::modifier::AttributeModifier;

macro_rules! catalog_id {
    ($Name:ident) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $Name(pub i32);

        impl fmt::Display for $Name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

catalog_id!(AttributeId);
catalog_id!(ItemTypeId);
catalog_id!(EffectId);
catalog_id!(GroupId);
catalog_id!(CategoryId);

impl ItemTypeId {
    // Sentinel used by skill filters meaning "the emitting item's own type".
    pub const OWNER_SELF: ItemTypeId = ItemTypeId(-1);
}

/// Attribute ids with fixed meaning across the whole catalog.
pub mod attrs {
    use super::AttributeId;

    pub const VOLUME: AttributeId = AttributeId(161);
    pub const SKILL_LEVEL: AttributeId = AttributeId(280);
    pub const IS_CAPITAL_SIZE: AttributeId = AttributeId(1785);

    // (required skill type, required skill level) attribute slots.
    pub const REQUIRED_SKILLS: [(AttributeId, AttributeId); 6] = [
        (AttributeId(182), AttributeId(277)),
        (AttributeId(183), AttributeId(278)),
        (AttributeId(184), AttributeId(279)),
        (AttributeId(1285), AttributeId(1286)),
        (AttributeId(1289), AttributeId(1287)),
        (AttributeId(1290), AttributeId(1288)),
    ];
}

pub mod categories {
    use super::CategoryId;

    pub const SHIP: CategoryId = CategoryId(6);
    pub const MODULE: CategoryId = CategoryId(7);
    pub const CHARGE: CategoryId = CategoryId(8);
    pub const SKILL: CategoryId = CategoryId(16);
    pub const DRONE: CategoryId = CategoryId(18);
    pub const IMPLANT: CategoryId = CategoryId(20);
    pub const SUBSYSTEM: CategoryId = CategoryId(32);
}

/// Marker effects from which slot layout is derived.
pub mod marker_effects {
    use super::EffectId;

    pub const LOW_POWER: EffectId = EffectId(11);
    pub const HIGH_POWER: EffectId = EffectId(12);
    pub const MEDIUM_POWER: EffectId = EffectId(13);
    pub const TURRET_FITTED: EffectId = EffectId(42);
    pub const LAUNCHER_FITTED: EffectId = EffectId(40);
    pub const RIG_SLOT: EffectId = EffectId(2663);
    pub const SUBSYSTEM_SLOT: EffectId = EffectId(3772);
}

/// Per-attribute metadata consulted by the calculator.
#[derive(Clone, Debug)]
pub struct AttributeDef {
    pub id: AttributeId,
    pub name: SmolStr,
    pub stackable: bool,
    pub high_is_good: bool,
    pub default_value: f64,
    pub max_attribute: Option<AttributeId>,
}

impl AttributeDef {
    pub fn new(id: AttributeId, name: &str) -> Self {
        Self {
            id,
            name: SmolStr::new(name),
            stackable: true,
            high_is_good: true,
            default_value: 0.0,
            max_attribute: None,
        }
    }

    pub fn unstackable(mut self) -> Self {
        self.stackable = false;
        self
    }

    pub fn low_is_good(mut self) -> Self {
        self.high_is_good = false;
        self
    }

    pub fn default_value(mut self, value: f64) -> Self {
        self.default_value = value;
        self
    }

    pub fn capped_by(mut self, attribute: AttributeId) -> Self {
        self.max_attribute = Some(attribute);
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EffectCategory {
    Passive,
    Active,
    Target,
    Area,
    Online,
    Overload,
    Dungeon,
    System,
}

impl EffectCategory {
    /// Minimum holder state at which this effect's modifiers run. `None`
    /// marks categories the engine does not model.
    pub fn state_floor(self) -> Option<State> {
        match self {
            EffectCategory::Passive | EffectCategory::System => Some(State::Offline),
            EffectCategory::Online => Some(State::Online),
            EffectCategory::Active | EffectCategory::Target => Some(State::Active),
            EffectCategory::Overload => Some(State::Overload),
            EffectCategory::Area | EffectCategory::Dungeon => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuildStatus {
    OkFull,
    OkPartial,
    Error,
}

#[derive(Clone, Debug)]
pub struct ItemEffect {
    pub id: EffectId,
    pub category: EffectCategory,
    pub modifiers: Vec<Arc<AttributeModifier>>,
    pub build_status: BuildStatus,
}

impl ItemEffect {
    pub fn marker(id: EffectId, category: EffectCategory) -> Self {
        Self {
            id,
            category,
            modifiers: Vec::new(),
            build_status: BuildStatus::OkFull,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    High,
    Medium,
    Low,
    Rig,
    Subsystem,
    Turret,
    Launcher,
}

/// Immutable descriptor of an item kind.
#[derive(Clone, Debug)]
pub struct ItemType {
    pub id: ItemTypeId,
    pub name: SmolStr,
    pub group: GroupId,
    pub category: CategoryId,
    pub attributes: HashMap<AttributeId, f64>,
    pub effects: Vec<Arc<ItemEffect>>,
}

impl ItemType {
    pub fn base_attribute(&self, attribute: AttributeId) -> Option<f64> {
        self.attributes.get(&attribute).copied()
    }

    pub fn max_state(&self) -> State {
        self.effects
            .iter()
            .filter_map(|effect| effect.category.state_floor())
            .max()
            .unwrap_or(State::Offline)
    }

    /// Slots implied by the marker effects carried by this type.
    pub fn slots(&self) -> Vec<Slot> {
        self.effects
            .iter()
            .filter_map(|effect| match effect.id {
                marker_effects::HIGH_POWER => Some(Slot::High),
                marker_effects::MEDIUM_POWER => Some(Slot::Medium),
                marker_effects::LOW_POWER => Some(Slot::Low),
                marker_effects::RIG_SLOT => Some(Slot::Rig),
                marker_effects::SUBSYSTEM_SLOT => Some(Slot::Subsystem),
                marker_effects::TURRET_FITTED => Some(Slot::Turret),
                marker_effects::LAUNCHER_FITTED => Some(Slot::Launcher),
                _ => None,
            })
            .collect()
    }

    pub fn required_skills(&self) -> Vec<(ItemTypeId, i32)> {
        attrs::REQUIRED_SKILLS
            .iter()
            .filter_map(|(skill_attr, level_attr)| {
                let skill = self.base_attribute(*skill_attr)?;
                let level = self.base_attribute(*level_attr).unwrap_or(0.0);
                Some((ItemTypeId(skill as i32), level as i32))
            })
            .collect()
    }
}

pub struct ItemTypeBuilder {
    item: ItemType,
}

impl ItemTypeBuilder {
    pub fn new(id: ItemTypeId, name: &str) -> Self {
        Self {
            item: ItemType {
                id,
                name: SmolStr::new(name),
                group: GroupId(0),
                category: CategoryId(0),
                attributes: HashMap::default(),
                effects: Vec::new(),
            },
        }
    }

    pub fn group(mut self, group: GroupId) -> Self {
        self.item.group = group;
        self
    }

    pub fn category(mut self, category: CategoryId) -> Self {
        self.item.category = category;
        self
    }

    pub fn attribute(mut self, attribute: AttributeId, value: f64) -> Self {
        self.item.attributes.insert(attribute, value);
        self
    }

    pub fn effect(mut self, effect: Arc<ItemEffect>) -> Self {
        self.item.effects.push(effect);
        self
    }

    pub fn build(self) -> ItemType {
        self.item
    }
}

/// The static data the whole engine reads from. Initialized once; lookups
/// hand out shared `Arc`s.
#[derive(Resource, Default)]
pub struct Catalog {
    attributes: HashMap<AttributeId, Arc<AttributeDef>>,
    types: HashMap<ItemTypeId, Arc<ItemType>>,
    effects: HashMap<EffectId, Arc<ItemEffect>>,
}

impl Catalog {
    pub fn add_attribute(&mut self, def: AttributeDef) -> Arc<AttributeDef> {
        let def = Arc::new(def);
        self.attributes.insert(def.id, def.clone());
        def
    }

    pub fn add_effect(&mut self, effect: ItemEffect) -> Arc<ItemEffect> {
        let effect = Arc::new(effect);
        self.effects.insert(effect.id, effect.clone());
        effect
    }

    pub fn add_type(&mut self, item: ItemType) -> Arc<ItemType> {
        let item = Arc::new(item);
        self.types.insert(item.id, item.clone());
        item
    }

    pub fn attribute(&self, id: AttributeId) -> Option<Arc<AttributeDef>> {
        self.attributes.get(&id).cloned()
    }

    pub fn item_type(&self, id: ItemTypeId) -> Option<Arc<ItemType>> {
        self.types.get(&id).cloned()
    }

    pub fn effect(&self, id: EffectId) -> Option<Arc<ItemEffect>> {
        self.effects.get(&id).cloned()
    }
}
