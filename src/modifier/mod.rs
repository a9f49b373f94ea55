mod builder;
mod expression;

use crate::catalog::{AttributeId, GroupId, ItemTypeId};
use crate::state::State;
use bevy::prelude::Entity;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub use builder::{EffectBuilder, ModifierInfo, parse_modifier_infos};
pub use expression::{ExprNode, compile_expressions, operands};

/// Declaration order is the arithmetic order of application.
#[repr(i8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModOp {
    PreAssign = -1,
    PreMul = 0,
    PreDiv = 1,
    Add = 2,
    Sub = 3,
    PostMul = 4,
    PostDiv = 5,
    PostPercent = 6,
    PostAssign = 7,
}

impl ModOp {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(ModOp::PreAssign),
            0 => Some(ModOp::PreMul),
            1 => Some(ModOp::PreDiv),
            2 => Some(ModOp::Add),
            3 => Some(ModOp::Sub),
            4 => Some(ModOp::PostMul),
            5 => Some(ModOp::PostDiv),
            6 => Some(ModOp::PostPercent),
            7 => Some(ModOp::PostAssign),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ModOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModOp::PreAssign => write!(f, ":="),
            ModOp::PreMul => write!(f, "*"),
            ModOp::PreDiv => write!(f, "/"),
            ModOp::Add => write!(f, "+"),
            ModOp::Sub => write!(f, "-"),
            ModOp::PostMul => write!(f, "* (post)"),
            ModOp::PostDiv => write!(f, "/ (post)"),
            ModOp::PostPercent => write!(f, "%"),
            ModOp::PostAssign => write!(f, "=:"),
        }
    }
}

/// Which holder roots the modifier's targeting, relative to the emitter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    SelfItem,
    Character,
    Ship,
    Space,
    Other,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::SelfItem => write!(f, "self"),
            Domain::Character => write!(f, "character"),
            Domain::Ship => write!(f, "ship"),
            Domain::Space => write!(f, "space"),
            Domain::Other => write!(f, "other"),
        }
    }
}

/// Narrows the resolved domain root to a subset of holders.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModFilter {
    Item,
    All,
    Group(GroupId),
    Skill(ItemTypeId),
    // Skill filter resolved against the emitting holder's own type.
    SkillSelf,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModScope {
    Local,
    Gang,
    Projected,
}

/// Where the modification magnitude comes from.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ModSrc {
    Attribute(AttributeId),
    Value(f64),
}

/// One declarative modification rule. Immutable once built; holders share
/// them through `Arc`.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeModifier {
    // State floor at which the modifier becomes active.
    pub state: State,
    pub scope: ModScope,
    pub src: ModSrc,
    pub op: ModOp,
    pub tgt_attr: AttributeId,
    pub domain: Domain,
    pub filter: ModFilter,
}

impl AttributeModifier {
    pub fn local(
        domain: Domain,
        filter: ModFilter,
        src: ModSrc,
        op: ModOp,
        tgt_attr: AttributeId,
    ) -> Self {
        Self {
            state: State::Offline,
            scope: ModScope::Local,
            src,
            op,
            tgt_attr,
            domain,
            filter,
        }
    }

    pub fn at_state(mut self, state: State) -> Self {
        self.state = state;
        self
    }
}

impl fmt::Display for AttributeModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.src {
            ModSrc::Attribute(attr) => {
                write!(f, "{} {} -> {}", self.op, attr, self.tgt_attr)?;
            }
            ModSrc::Value(value) => {
                write!(f, "{} {} -> {}", self.op, value, self.tgt_attr)?;
            }
        }
        write!(f, " @{}", self.domain)?;
        match self.filter {
            ModFilter::Item => Ok(()),
            ModFilter::All => write!(f, "/all"),
            ModFilter::Group(group) => write!(f, "/group {group}"),
            ModFilter::Skill(skill) => write!(f, "/skill {skill}"),
            ModFilter::SkillSelf => write!(f, "/own skill"),
        }
    }
}

/// The pair of emitting holder and modifier. Equality is by identity of
/// both halves.
#[derive(Clone, Debug)]
pub struct Affector {
    pub source: Entity,
    pub modifier: Arc<AttributeModifier>,
}

impl Affector {
    pub fn new(source: Entity, modifier: Arc<AttributeModifier>) -> Self {
        Self { source, modifier }
    }
}

impl PartialEq for Affector {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && Arc::ptr_eq(&self.modifier, &other.modifier)
    }
}

impl Eq for Affector {}

impl Hash for Affector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        (Arc::as_ptr(&self.modifier) as usize).hash(state);
    }
}
